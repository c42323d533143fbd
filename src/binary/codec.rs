//! The per-field codec contract.

use std::fmt;

use bytes::BytesMut;

use super::options::{Length, Options};
use super::{StructInstance, Value};
use crate::error::{Result, WirechainError};

/// Converts one field between bytes and a [`Value`].
///
/// Implementations are registered in a
/// [`FieldTypeRegistry`](super::FieldTypeRegistry) under one or more tags and
/// shared read-only by every descriptor that uses them.
pub trait FieldCodec: Send + Sync + fmt::Debug {
    /// Statically known encoded width, or `None` when it depends on the data.
    fn binary_size(&self, options: &Options) -> Option<usize>;

    /// Registration-time option check. Errors here are setup errors.
    fn validate(&self, _options: &Options) -> Result<()> {
        Ok(())
    }

    /// Type-specific options this codec reads. `default`, `optional` and
    /// `description` apply to every codec and are not listed.
    fn accepted_options(&self) -> &'static [&'static str] {
        &[]
    }

    /// Whether a field of this codec decodes to one integer.
    fn is_integer(&self, _options: &Options) -> bool {
        false
    }

    /// Value a fresh instance starts with; the declared default unless overridden.
    fn initial_value(&self, options: &Options) -> Option<Value> {
        options.default.clone()
    }

    /// Decode a prefix of `input`, returning the value and the bytes consumed.
    ///
    /// Short input is [`WirechainError::Incomplete`]; input that can never be
    /// valid is [`WirechainError::Corrupt`].
    fn decode(&self, input: &[u8], options: &Options, ctx: &Context<'_>) -> Result<(Value, usize)>;

    /// Append the encoding of `value` to `out`.
    fn encode(
        &self,
        value: &Value,
        options: &Options,
        ctx: &Context<'_>,
        out: &mut BytesMut,
    ) -> Result<()>;
}

/// What a codec can see of the struct being decoded or encoded.
#[derive(Clone, Copy, Default)]
pub struct Context<'a> {
    instance: Option<&'a StructInstance>,
}

impl<'a> Context<'a> {
    /// Context for a struct instance; sibling lengths resolve against it.
    pub fn new(instance: &'a StructInstance) -> Self {
        Self {
            instance: Some(instance),
        }
    }

    /// Context outside any struct (length prefixes, standalone codec use).
    pub fn detached() -> Self {
        Self { instance: None }
    }

    pub fn instance(&self) -> Option<&'a StructInstance> {
        self.instance
    }

    /// Read a sibling field or virtual as a length.
    pub fn sibling_length(&self, name: &str) -> Result<usize> {
        let instance = self.instance.ok_or_else(|| {
            WirechainError::setup(format!("length refers to `{name}` outside of a struct"))
        })?;
        let value = instance.get(name)?;
        value
            .as_i128()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| {
                WirechainError::corrupt(format!("`{name}` = {value:?} is not a valid length"))
            })
    }

    /// Resolve a non-prefix length against the input. `None` means `All`.
    pub(crate) fn resolve_length(&self, length: &Length) -> Result<Option<usize>> {
        match length {
            Length::Count(n) => Ok(Some(*n)),
            Length::Field(name) => self.sibling_length(name).map(Some),
            Length::All => Ok(None),
        }
    }
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("in_struct", &self.instance.is_some())
            .finish()
    }
}

/// `Incomplete` unless `input` holds at least `needed` bytes.
#[inline]
pub(crate) fn require(input: &[u8], needed: usize) -> Result<()> {
    if input.len() < needed {
        Err(WirechainError::incomplete(format!(
            "have {} bytes, need {}",
            input.len(),
            needed
        )))
    } else {
        Ok(())
    }
}
