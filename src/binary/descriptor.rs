//! Struct descriptors and their builder.
//!
//! A descriptor is an ordered list of fields compiled once from a
//! [`FieldTypeRegistry`] and shared as `Arc<StructDescriptor>`. Every
//! declaration error surfaces from [`StructBuilder::build`], before any byte
//! is decoded.
//!
//! # Example
//!
//! ```
//! use wirechain::binary::{FieldOptions, FieldTypeRegistry, StructDescriptor};
//!
//! let registry = FieldTypeRegistry::standard();
//! let packet = StructDescriptor::builder(&registry, "Packet")
//!     .static_bytes(b"PK")
//!     .field("data_length", "uint8", FieldOptions::new())
//!     .field("data", "bytes", FieldOptions::new().length_of("data_length"))
//!     .build()
//!     .unwrap();
//!
//! let (decoded, used) = packet.decode(b"PK\x03abc").unwrap();
//! assert_eq!(used, 6);
//! assert_eq!(decoded.get("data").unwrap().as_bytes().unwrap().as_ref(), b"abc");
//! ```

use std::fmt::{self, Write as _};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use super::codec::Context;
use super::options::{FieldOptions, FieldType, TypeSpec};
use super::registry::FieldTypeRegistry;
use super::{StructInstance, Value};
use crate::error::{Result, WirechainError};

/// Computes a virtual field from the rest of the instance.
pub type ComputeFn = Arc<dyn Fn(&StructInstance) -> Result<Value> + Send + Sync>;

type PreDecodeHook = Arc<dyn Fn(Bytes) -> Result<Bytes> + Send + Sync>;
type PostDecodeHook = Arc<dyn Fn(&mut StructInstance, &mut usize) -> Result<()> + Send + Sync>;
type PreEncodeHook = Arc<dyn Fn(StructInstance) -> Result<StructInstance> + Send + Sync>;
type PostEncodeHook = Arc<dyn Fn(&StructInstance, BytesMut) -> Result<BytesMut> + Send + Sync>;

/// A stored field.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    ty: FieldType,
    inline: Option<Arc<StructDescriptor>>,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &FieldType {
        &self.ty
    }

    /// Struct that re-decodes this field's raw value, if any.
    pub fn inline(&self) -> Option<&Arc<StructDescriptor>> {
        self.inline.as_ref()
    }
}

/// A computed field: never stored, never on the wire.
#[derive(Clone)]
pub struct VirtualField {
    name: String,
    ty: FieldType,
    compute: ComputeFn,
}

impl VirtualField {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &FieldType {
        &self.ty
    }

    pub fn compute(&self, instance: &StructInstance) -> Result<Value> {
        (self.compute)(instance)
    }
}

impl fmt::Debug for VirtualField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualField")
            .field("name", &self.name)
            .field("ty", &self.ty.name)
            .finish()
    }
}

#[derive(Clone, Default)]
struct Hooks {
    pre_decode: Vec<PreDecodeHook>,
    post_decode: Vec<PostDecodeHook>,
    pre_encode: Vec<PreEncodeHook>,
    post_encode: Vec<PostEncodeHook>,
}

/// Compiled layout of a binary struct.
pub struct StructDescriptor {
    name: String,
    description: Option<String>,
    fields: Vec<Field>,
    virtuals: Vec<VirtualField>,
    hooks: Hooks,
}

impl StructDescriptor {
    /// Start declaring a struct against `registry`.
    pub fn builder<'r>(registry: &'r FieldTypeRegistry, name: &str) -> StructBuilder<'r> {
        StructBuilder::new(registry, name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn virtuals(&self) -> &[VirtualField] {
        &self.virtuals
    }

    pub fn virtual_field(&self, name: &str) -> Option<&VirtualField> {
        self.virtuals.iter().find(|v| v.name == name)
    }

    /// Encoded width when every field has a static width.
    pub fn binary_size(&self) -> Option<usize> {
        self.fields.iter().map(|f| f.ty.binary_size()).sum()
    }

    /// A fresh instance holding defaults, fixed literals and nested instances.
    pub fn instantiate(self: &Arc<Self>) -> StructInstance {
        let mut instance = StructInstance::empty(self.clone());
        for field in &self.fields {
            if let Some(value) = field.ty.codec.initial_value(&field.ty.options) {
                instance.insert(&field.name, value);
            }
        }
        instance
    }

    /// Decode one struct from the front of `input`.
    ///
    /// Returns the instance and the number of bytes it occupied. A short
    /// optional field takes its default and consumes nothing.
    pub fn decode(self: &Arc<Self>, input: &[u8]) -> Result<(StructInstance, usize)> {
        let transformed;
        let input = if self.hooks.pre_decode.is_empty() {
            input
        } else {
            let mut bytes = Bytes::copy_from_slice(input);
            for hook in &self.hooks.pre_decode {
                bytes = hook(bytes)?;
            }
            transformed = bytes;
            &transformed[..]
        };

        let mut instance = StructInstance::empty(self.clone());
        let mut pos = 0;
        for field in &self.fields {
            let decoded = field.ty.decode(&input[pos..], &Context::new(&instance));
            match decoded {
                Ok((value, used)) => {
                    let value = match &field.inline {
                        Some(inner) => decode_inline(inner, value),
                        None => Ok(value),
                    }
                    .map_err(|e| e.at(&self.path(field)))?;
                    instance.insert(&field.name, value);
                    pos += used;
                }
                Err(e) if e.is_incomplete() && field.ty.options.optional => {
                    if let Some(default) = &field.ty.options.default {
                        instance.insert(&field.name, default.clone());
                    }
                }
                Err(e) => return Err(e.at(&self.path(field))),
            }
        }

        let mut consumed = pos;
        for hook in &self.hooks.post_decode {
            hook(&mut instance, &mut consumed)?;
        }
        Ok((instance, consumed))
    }

    /// Encode an instance of this descriptor.
    pub fn encode(&self, instance: &StructInstance) -> Result<Bytes> {
        if !std::ptr::eq(instance.descriptor().as_ref(), self) {
            return Err(WirechainError::corrupt(format!(
                "cannot encode a {} instance as {}",
                instance.descriptor().name(),
                self.name
            )));
        }

        let transformed;
        let instance = if self.hooks.pre_encode.is_empty() {
            instance
        } else {
            let mut owned = instance.clone();
            for hook in &self.hooks.pre_encode {
                owned = hook(owned)?;
            }
            transformed = owned;
            &transformed
        };

        let ctx = Context::new(instance);
        let mut out = BytesMut::new();
        for field in &self.fields {
            let value = match instance.field(&field.name) {
                Some(value) => value,
                None if field.ty.options.optional => continue,
                None => {
                    return Err(WirechainError::corrupt(format!(
                        "{} is required",
                        self.path(field)
                    )))
                }
            };
            let flattened;
            let value = match &field.inline {
                Some(inner) => {
                    flattened = encode_inline(inner, value).map_err(|e| e.at(&self.path(field)))?;
                    &flattened
                }
                None => value,
            };
            field
                .ty
                .encode(value, &ctx, &mut out)
                .map_err(|e| e.at(&self.path(field)))?;
        }

        for hook in &self.hooks.post_encode {
            out = hook(instance, out)?;
        }
        Ok(out.freeze())
    }

    /// Human-readable table of virtuals and fields.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Binary Struct {}", self.name);
        if let Some(description) = &self.description {
            let _ = writeln!(out, "  {description}");
        }

        if !self.virtuals.is_empty() {
            let _ = writeln!(out, "\n  Virtuals:");
            let _ = writeln!(out, "  {:<20} {:<16} {}", "Name", "Type", "Description");
            for v in &self.virtuals {
                let _ = writeln!(
                    out,
                    "  {:<20} {:<16} {}",
                    v.name,
                    v.ty.name,
                    v.ty.options.description.as_deref().unwrap_or("")
                );
            }
        }

        let _ = writeln!(out, "\n  Fields:");
        let _ = writeln!(
            out,
            "  {:<20} {:<16} {:<8} {}",
            "Name", "Type", "Size", "Description"
        );
        for field in &self.fields {
            let mut ty = field.ty.name.clone();
            if let Some(of) = &field.ty.options.of {
                let _ = write!(ty, "[{}]", of.name);
            }
            if let Some(inner) = &field.inline {
                let _ = write!(ty, " as {}", inner.name);
            }
            let size = field
                .ty
                .binary_size()
                .map_or_else(|| "dynamic".to_string(), |n| n.to_string());
            let _ = writeln!(
                out,
                "  {:<20} {:<16} {:<8} {}",
                field.name,
                ty,
                size,
                field.ty.options.description.as_deref().unwrap_or("")
            );
        }
        out
    }

    fn path(&self, field: &Field) -> String {
        format!("{}.{}", self.name, field.name)
    }
}

impl fmt::Debug for StructDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructDescriptor")
            .field("name", &self.name)
            .field("fields", &self.fields.iter().map(|f| &f.name).collect::<Vec<_>>())
            .field(
                "virtuals",
                &self.virtuals.iter().map(|v| &v.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

fn decode_inline(inner: &Arc<StructDescriptor>, raw: Value) -> Result<Value> {
    let bytes = raw.as_bytes().ok_or_else(|| {
        WirechainError::corrupt(format!(
            "inline {} needs bytes, got {}",
            inner.name,
            raw.type_name()
        ))
    })?;
    match inner.decode(bytes) {
        Ok((instance, _)) => Ok(Value::Struct(instance)),
        // Bounded by the outer field.
        Err(WirechainError::Incomplete(msg)) => Err(WirechainError::Corrupt(msg)),
        Err(e) => Err(e),
    }
}

fn encode_inline(inner: &Arc<StructDescriptor>, value: &Value) -> Result<Value> {
    match value {
        Value::Struct(instance) => inner.encode(instance).map(Value::Bytes),
        other => Ok(other.clone()),
    }
}

/// Declares the fields of a [`StructDescriptor`].
///
/// Methods chain by value; the first declaration error is kept and returned
/// from [`build`](Self::build).
pub struct StructBuilder<'r> {
    registry: &'r FieldTypeRegistry,
    name: String,
    description: Option<String>,
    fields: Vec<Field>,
    virtuals: Vec<VirtualField>,
    hooks: Hooks,
    statics: usize,
    error: Option<WirechainError>,
}

impl<'r> StructBuilder<'r> {
    fn new(registry: &'r FieldTypeRegistry, name: &str) -> Self {
        Self {
            registry,
            name: name.to_string(),
            description: None,
            fields: Vec::new(),
            virtuals: Vec::new(),
            hooks: Hooks::default(),
            statics: 0,
            error: None,
        }
    }

    pub fn describe(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    /// Declare a stored field.
    pub fn field(self, name: &str, ty: impl Into<TypeSpec>, options: FieldOptions) -> Self {
        let ty = ty.into();
        self.attempt(|b| b.push_field(name, ty, options, None))
    }

    /// Declare a field whose raw value is re-decoded by `inner`.
    pub fn inline(
        self,
        name: &str,
        ty: impl Into<TypeSpec>,
        options: FieldOptions,
        inner: Arc<StructDescriptor>,
    ) -> Self {
        let ty = ty.into();
        self.attempt(|b| b.push_field(name, ty, options, Some(inner)))
    }

    /// Declare a named literal.
    pub fn fixed(self, name: &str, value: impl AsRef<[u8]>) -> Self {
        self.field(name, "fixed", FieldOptions::new().value(value))
    }

    /// Declare an unnamed literal, such as a magic number.
    pub fn static_bytes(mut self, value: impl AsRef<[u8]>) -> Self {
        let name = format!("__static_{}", self.statics);
        self.statics += 1;
        self.fixed(&name, value)
    }

    /// Declare a computed field.
    pub fn virtual_field<F>(
        self,
        name: &str,
        ty: impl Into<TypeSpec>,
        options: FieldOptions,
        compute: F,
    ) -> Self
    where
        F: Fn(&StructInstance) -> Result<Value> + Send + Sync + 'static,
    {
        let spec = ty.into();
        self.attempt(|b| {
            b.check_unique(name)?;
            let ty = b.resolve(name, &spec, &options)?;
            b.virtuals.push(VirtualField {
                name: name.to_string(),
                ty,
                compute: Arc::new(compute),
            });
            Ok(())
        })
    }

    /// Transform the input bytes before any field is read.
    pub fn pre_decode<F>(mut self, hook: F) -> Self
    where
        F: Fn(Bytes) -> Result<Bytes> + Send + Sync + 'static,
    {
        self.hooks.pre_decode.push(Arc::new(hook));
        self
    }

    /// Adjust the decoded instance and the reported consumed count.
    pub fn post_decode<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut StructInstance, &mut usize) -> Result<()> + Send + Sync + 'static,
    {
        self.hooks.post_decode.push(Arc::new(hook));
        self
    }

    /// Transform the instance before any field is written.
    pub fn pre_encode<F>(mut self, hook: F) -> Self
    where
        F: Fn(StructInstance) -> Result<StructInstance> + Send + Sync + 'static,
    {
        self.hooks.pre_encode.push(Arc::new(hook));
        self
    }

    /// Transform the encoded bytes.
    pub fn post_encode<F>(mut self, hook: F) -> Self
    where
        F: Fn(&StructInstance, BytesMut) -> Result<BytesMut> + Send + Sync + 'static,
    {
        self.hooks.post_encode.push(Arc::new(hook));
        self
    }

    /// Finish the declaration.
    pub fn build(self) -> Result<Arc<StructDescriptor>> {
        if let Some(err) = self.error {
            return Err(err);
        }

        for (i, field) in self.fields.iter().enumerate() {
            for sibling in field.ty.options.sibling_refs() {
                let target = self.fields[..i]
                    .iter()
                    .find(|f| f.name == sibling)
                    .map(|f| &f.ty)
                    .or_else(|| {
                        self.virtuals
                            .iter()
                            .find(|v| v.name == sibling)
                            .map(|v| &v.ty)
                    });
                let Some(target) = target else {
                    return Err(WirechainError::setup(format!(
                        "{}.{}: length refers to `{sibling}`, which is not an earlier field or a virtual",
                        self.name, field.name
                    )));
                };
                if !target.codec.is_integer(&target.options) {
                    return Err(WirechainError::setup(format!(
                        "{}.{}: length refers to `{sibling}` of type {}, which is not an integer",
                        self.name, field.name, target.name
                    )));
                }
            }
        }

        Ok(Arc::new(StructDescriptor {
            name: self.name,
            description: self.description,
            fields: self.fields,
            virtuals: self.virtuals,
            hooks: self.hooks,
        }))
    }

    fn attempt(mut self, f: impl FnOnce(&mut Self) -> Result<()>) -> Self {
        if self.error.is_none() {
            if let Err(e) = f(&mut self) {
                self.error = Some(e);
            }
        }
        self
    }

    fn push_field(
        &mut self,
        name: &str,
        spec: TypeSpec,
        options: FieldOptions,
        inline: Option<Arc<StructDescriptor>>,
    ) -> Result<()> {
        self.check_unique(name)?;
        let ty = self.resolve(name, &spec, &options)?;
        if let Some(last) = self.fields.last() {
            if last.ty.options.optional && !ty.options.optional {
                return Err(WirechainError::setup(format!(
                    "{}.{name}: required field follows optional field `{}`",
                    self.name, last.name
                )));
            }
        }
        self.fields.push(Field {
            name: name.to_string(),
            ty,
            inline,
        });
        Ok(())
    }

    fn resolve(&self, name: &str, spec: &TypeSpec, options: &FieldOptions) -> Result<FieldType> {
        self.registry
            .resolve(spec, options)
            .map_err(|e| e.at(&format!("{}.{name}", self.name)))
    }

    fn check_unique(&self, name: &str) -> Result<()> {
        let taken = self.fields.iter().any(|f| f.name == name)
            || self.virtuals.iter().any(|v| v.name == name);
        if taken {
            Err(WirechainError::setup(format!(
                "{}.{name} is declared twice",
                self.name
            )))
        } else {
            Ok(())
        }
    }
}
