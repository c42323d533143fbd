//! Field options: the user-facing builder form and the resolved form codecs see.
//!
//! [`FieldOptions`] names nested types by tag (`"uint8"`) or by descriptor.
//! When a field is registered the registry resolves every nested type into a
//! [`FieldType`], so a misspelled tag is a setup error and never reaches decode.

use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use super::codec::{Context, FieldCodec};
use super::{StructDescriptor, Value};
use crate::error::{Result, WirechainError};

/// How a variable-length codec learns its length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Length {
    /// A literal count (bytes, bits or list elements depending on the codec).
    Count(usize),
    /// Read an already-decoded sibling field or virtual of the same struct.
    Field(String),
    /// Everything that is left in the input.
    All,
}

impl From<usize> for Length {
    fn from(n: usize) -> Self {
        Length::Count(n)
    }
}

/// Accepted values for a numeric field.
#[derive(Debug, Clone, PartialEq)]
pub enum Limit {
    Range(RangeInclusive<i64>),
    OneOf(Vec<i64>),
}

impl Limit {
    /// Check a numeric value against this limit.
    pub fn check(&self, value: &Value) -> Result<()> {
        let ok = match (self, value) {
            (Limit::Range(r), Value::Float(f)) => *f >= *r.start() as f64 && *f <= *r.end() as f64,
            (Limit::OneOf(set), Value::Float(f)) => set.iter().any(|v| *v as f64 == *f),
            (Limit::Range(r), v) => v
                .as_i128()
                .is_some_and(|n| n >= *r.start() as i128 && n <= *r.end() as i128),
            (Limit::OneOf(set), v) => v
                .as_i128()
                .is_some_and(|n| set.iter().any(|s| *s as i128 == n)),
        };
        if ok {
            Ok(())
        } else {
            Err(WirechainError::corrupt(format!("{value:?} not in limit {self:?}")))
        }
    }
}

impl From<RangeInclusive<i64>> for Limit {
    fn from(r: RangeInclusive<i64>) -> Self {
        Limit::Range(r)
    }
}

impl From<Vec<i64>> for Limit {
    fn from(v: Vec<i64>) -> Self {
        Limit::OneOf(v)
    }
}

/// A reference to a field type: a registry tag or a nested struct.
#[derive(Clone)]
pub enum TypeSpec {
    Tag(String),
    Struct(Arc<StructDescriptor>),
}

impl fmt::Debug for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSpec::Tag(t) => write!(f, "{t}"),
            TypeSpec::Struct(d) => write!(f, "{}", d.name()),
        }
    }
}

impl From<&str> for TypeSpec {
    fn from(tag: &str) -> Self {
        TypeSpec::Tag(tag.to_string())
    }
}

impl From<String> for TypeSpec {
    fn from(tag: String) -> Self {
        TypeSpec::Tag(tag)
    }
}

impl From<Arc<StructDescriptor>> for TypeSpec {
    fn from(d: Arc<StructDescriptor>) -> Self {
        TypeSpec::Struct(d)
    }
}

impl From<&Arc<StructDescriptor>> for TypeSpec {
    fn from(d: &Arc<StructDescriptor>) -> Self {
        TypeSpec::Struct(d.clone())
    }
}

/// Options as written in a schema declaration.
///
/// # Example
///
/// ```
/// use wirechain::binary::FieldOptions;
///
/// let prefixed = FieldOptions::new().sizeof("nint16");
/// let sibling = FieldOptions::new().length_of("data_length");
/// let greedy = FieldOptions::new().of("uint8").length_all();
/// # let _ = (prefixed, sibling, greedy);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FieldOptions {
    pub(crate) length: Option<Length>,
    pub(crate) sizeof: Option<(TypeSpec, Box<FieldOptions>)>,
    pub(crate) of: Option<(TypeSpec, Box<FieldOptions>)>,
    pub(crate) value: Option<Bytes>,
    pub(crate) modifier: Option<i64>,
    pub(crate) limit: Option<Limit>,
    pub(crate) default: Option<Value>,
    pub(crate) optional: bool,
    pub(crate) description: Option<String>,
}

impl FieldOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Literal length.
    pub fn length(mut self, n: usize) -> Self {
        self.length = Some(Length::Count(n));
        self
    }

    /// Length read from a sibling field or virtual at decode time.
    pub fn length_of(mut self, field: &str) -> Self {
        self.length = Some(Length::Field(field.to_string()));
        self
    }

    /// Consume all remaining input.
    pub fn length_all(mut self) -> Self {
        self.length = Some(Length::All);
        self
    }

    /// Length prefix of the given numeric type, read right before the data.
    pub fn sizeof(self, ty: impl Into<TypeSpec>) -> Self {
        self.sizeof_with(ty, FieldOptions::new())
    }

    pub fn sizeof_with(mut self, ty: impl Into<TypeSpec>, options: FieldOptions) -> Self {
        self.sizeof = Some((ty.into(), Box::new(options)));
        self
    }

    /// Element type of a list.
    pub fn of(self, ty: impl Into<TypeSpec>) -> Self {
        self.of_with(ty, FieldOptions::new())
    }

    pub fn of_with(mut self, ty: impl Into<TypeSpec>, options: FieldOptions) -> Self {
        self.of = Some((ty.into(), Box::new(options)));
        self
    }

    /// Expected literal for `fixed` fields.
    pub fn value(mut self, value: impl AsRef<[u8]>) -> Self {
        self.value = Some(Bytes::copy_from_slice(value.as_ref()));
        self
    }

    /// Added after decode, subtracted before encode.
    pub fn modifier(mut self, m: i64) -> Self {
        self.modifier = Some(m);
        self
    }

    pub fn limit(mut self, limit: impl Into<Limit>) -> Self {
        self.limit = Some(limit.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Missing trailing bytes yield the default instead of `Incomplete`.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn describe(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }
}

/// Options after registry resolution; this is what codecs receive.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub length: Option<Length>,
    pub sizeof: Option<Box<FieldType>>,
    pub of: Option<Box<FieldType>>,
    pub value: Option<Bytes>,
    pub modifier: Option<i64>,
    pub limit: Option<Limit>,
    pub default: Option<Value>,
    pub optional: bool,
    pub description: Option<String>,
}

impl Options {
    /// Names of the type-specific options that are set.
    pub(crate) fn specified(&self) -> Vec<&'static str> {
        [
            ("length", self.length.is_some()),
            ("sizeof", self.sizeof.is_some()),
            ("of", self.of.is_some()),
            ("value", self.value.is_some()),
            ("modifier", self.modifier.is_some()),
            ("limit", self.limit.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }

    /// Every sibling name this option set (and nested element options) refers to.
    pub(crate) fn sibling_refs(&self) -> Vec<&str> {
        let mut refs = Vec::new();
        if let Some(Length::Field(name)) = &self.length {
            refs.push(name.as_str());
        }
        if let Some(of) = &self.of {
            refs.extend(of.options.sibling_refs());
        }
        refs
    }
}

/// A codec bound to its resolved options.
#[derive(Clone)]
pub struct FieldType {
    /// Tag or struct name, for diagnostics and `describe`.
    pub name: String,
    pub codec: Arc<dyn FieldCodec>,
    pub options: Options,
}

impl FieldType {
    pub fn binary_size(&self) -> Option<usize> {
        self.codec.binary_size(&self.options)
    }

    pub fn decode(&self, input: &[u8], ctx: &Context<'_>) -> Result<(Value, usize)> {
        self.codec.decode(input, &self.options, ctx)
    }

    pub fn encode(&self, value: &Value, ctx: &Context<'_>, out: &mut BytesMut) -> Result<()> {
        self.codec.encode(value, &self.options, ctx, out)
    }

    /// Decode a length prefix: must be a non-negative integer.
    pub(crate) fn decode_length(&self, input: &[u8]) -> Result<(usize, usize)> {
        let (value, used) = self.decode(input, &Context::detached())?;
        let len = value
            .as_i128()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| WirechainError::corrupt(format!("invalid length prefix {value:?}")))?;
        Ok((len, used))
    }
}

impl fmt::Debug for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldType")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish()
    }
}
