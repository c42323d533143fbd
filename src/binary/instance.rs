//! Decoded struct values.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use super::{StructDescriptor, Value};
use crate::error::{Result, WirechainError};

/// Field values of one struct, keyed by name.
///
/// Virtual fields are never stored; [`get`](Self::get) computes them on
/// every access from the current values.
#[derive(Clone)]
pub struct StructInstance {
    descriptor: Arc<StructDescriptor>,
    values: HashMap<String, Value>,
}

impl StructInstance {
    pub(crate) fn empty(descriptor: Arc<StructDescriptor>) -> Self {
        Self {
            descriptor,
            values: HashMap::new(),
        }
    }

    pub fn descriptor(&self) -> &Arc<StructDescriptor> {
        &self.descriptor
    }

    /// Value of a field or virtual.
    ///
    /// A declared field that holds no value is `Corrupt`; an undeclared name
    /// is `UnknownField`.
    pub fn get(&self, name: &str) -> Result<Value> {
        if let Some(value) = self.values.get(name) {
            return Ok(value.clone());
        }
        if let Some(virt) = self.descriptor.virtual_field(name) {
            return virt.compute(self);
        }
        if self.descriptor.field(name).is_some() {
            return Err(WirechainError::corrupt(format!(
                "{}.{name} has no value",
                self.descriptor.name()
            )));
        }
        Err(self.unknown(name))
    }

    /// Stored value of a field, without computing virtuals.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Assign a field. Virtuals are read-only.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        if self.descriptor.virtual_field(name).is_some() {
            return Err(WirechainError::ReadOnlyField(format!(
                "{}.{name}",
                self.descriptor.name()
            )));
        }
        if self.descriptor.field(name).is_none() {
            return Err(self.unknown(name));
        }
        self.values.insert(name.to_string(), value.into());
        Ok(())
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
        self.set(name, value)?;
        Ok(self)
    }

    /// Remove a stored value, leaving the field absent.
    pub fn unset(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    /// Stored values in declaration order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.descriptor
            .fields()
            .iter()
            .filter_map(|f| self.values.get(f.name()).map(|v| (f.name(), v)))
    }

    /// Encode with this instance's descriptor.
    pub fn encode(&self) -> Result<Bytes> {
        self.descriptor.encode(self)
    }

    pub(crate) fn insert(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    fn unknown(&self, name: &str) -> WirechainError {
        WirechainError::UnknownField(format!("{}.{name}", self.descriptor.name()))
    }
}

impl PartialEq for StructInstance {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.descriptor, &other.descriptor) && self.values == other.values
    }
}

impl fmt::Debug for StructInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.descriptor.name());
        for (name, value) in self.values() {
            s.field(name, value);
        }
        s.finish()
    }
}
