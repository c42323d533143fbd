//! Registry of field codecs by type tag.
//!
//! The registry is built once at startup and passed by reference to every
//! [`StructBuilder`](super::StructBuilder). Applications add their own codecs
//! with [`FieldTypeRegistry::register`].
//!
//! # Example
//!
//! ```
//! use wirechain::binary::{FieldTypeRegistry, FieldOptions, TypeSpec};
//!
//! let registry = FieldTypeRegistry::standard();
//! let ty = registry
//!     .resolve(&TypeSpec::from("bytes"), &FieldOptions::new().sizeof("uint8"))
//!     .unwrap();
//! assert_eq!(ty.binary_size(), None);
//! ```

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use super::codec::FieldCodec;
use super::options::{FieldOptions, FieldType, Options, TypeSpec};
use super::types::{
    BitCodec, BitfieldCodec, ByteOrder, BytesCodec, BytesKind, FixedCodec, ListCodec, PackCodec,
    Scalar, StructCodec,
};
use crate::error::{Result, WirechainError};

/// Maps type tags to codecs.
#[derive(Debug, Clone, Default)]
pub struct FieldTypeRegistry {
    types: BTreeMap<String, Arc<dyn FieldCodec>>,
}

impl FieldTypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with every built-in type.
    pub fn standard() -> Self {
        let mut registry = Self::new();

        let packed: &[(&str, Scalar, ByteOrder)] = &[
            ("int8", Scalar::I8, ByteOrder::Native),
            ("uint8", Scalar::U8, ByteOrder::Native),
            ("int16", Scalar::I16, ByteOrder::Native),
            ("uint16", Scalar::U16, ByteOrder::Native),
            ("int32", Scalar::I32, ByteOrder::Native),
            ("uint32", Scalar::U32, ByteOrder::Native),
            ("int64", Scalar::I64, ByteOrder::Native),
            ("uint64", Scalar::U64, ByteOrder::Native),
            ("long32", Scalar::I32, ByteOrder::Native),
            ("ulong32", Scalar::U32, ByteOrder::Native),
            ("nint16", Scalar::U16, ByteOrder::Big),
            ("nint32", Scalar::U32, ByteOrder::Big),
            ("lint16", Scalar::U16, ByteOrder::Little),
            ("lint32", Scalar::U32, ByteOrder::Little),
            ("float", Scalar::F32, ByteOrder::Native),
            ("double", Scalar::F64, ByteOrder::Native),
            ("nfloat", Scalar::F32, ByteOrder::Big),
            ("ndouble", Scalar::F64, ByteOrder::Big),
            ("lfloat", Scalar::F32, ByteOrder::Little),
            ("ldouble", Scalar::F64, ByteOrder::Little),
        ];
        for (tag, scalar, order) in packed {
            registry.register(PackCodec::new(*scalar, *order), &[*tag]);
        }

        registry.register(BitfieldCodec::msb_first(), &["msb_bitfield"]);
        registry.register(BitfieldCodec::lsb_first(), &["lsb_bitfield"]);
        registry.register(BitCodec, &["bit"]);

        registry.register(BytesCodec::char(), &["char"]);
        registry.register(BytesCodec::new(BytesKind::Raw), &["bytes"]);
        registry.register(BytesCodec::new(BytesKind::Padded), &["string"]);
        registry.register(BytesCodec::nstring(), &["nstring"]);
        registry.register(BytesCodec::new(BytesKind::Base64), &["base64"]);
        registry.register(
            BytesCodec::new(BytesKind::QuotedPrintable),
            &["quoted_printable"],
        );
        registry.register(BytesCodec::new(BytesKind::Uuencoded), &["uuencoded"]);

        registry.register(FixedCodec, &["fixed"]);
        registry.register(ListCodec, &["list"]);
        registry
    }

    /// Register a codec under one or more tags. Re-registering a tag replaces it.
    pub fn register<C: FieldCodec + 'static>(&mut self, codec: C, tags: &[&str]) -> &mut Self {
        let codec: Arc<dyn FieldCodec> = Arc::new(codec);
        for tag in tags {
            if self.types.insert(tag.to_string(), codec.clone()).is_some() {
                tracing::debug!("Replaced field type registered as `{}`", tag);
            }
        }
        self
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.types.contains_key(tag)
    }

    /// Look up a codec by tag.
    pub fn get(&self, tag: &str) -> Result<&Arc<dyn FieldCodec>> {
        self.types
            .get(tag)
            .ok_or_else(|| WirechainError::setup(format!("unknown field type `{tag}`")))
    }

    /// Registered tags in sorted order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Resolve a type reference and its options into a validated [`FieldType`].
    ///
    /// Nested `sizeof` and `of` types are resolved recursively.
    pub fn resolve(&self, spec: &TypeSpec, options: &FieldOptions) -> Result<FieldType> {
        let resolved = Options {
            length: options.length.clone(),
            sizeof: options
                .sizeof
                .as_ref()
                .map(|(ty, opts)| self.resolve(ty, opts).map(Box::new))
                .transpose()?,
            of: options
                .of
                .as_ref()
                .map(|(ty, opts)| self.resolve(ty, opts).map(Box::new))
                .transpose()?,
            value: options.value.clone(),
            modifier: options.modifier,
            limit: options.limit.clone(),
            default: options.default.clone(),
            optional: options.optional,
            description: options.description.clone(),
        };

        let (name, codec) = match spec {
            TypeSpec::Tag(tag) => (tag.clone(), self.get(tag)?.clone()),
            TypeSpec::Struct(descriptor) => (
                descriptor.name().to_string(),
                Arc::new(StructCodec(descriptor.clone())) as Arc<dyn FieldCodec>,
            ),
        };
        check_options(codec.as_ref(), &resolved)
            .and_then(|()| codec.validate(&resolved))
            .map_err(|e| e.at(&name))?;

        Ok(FieldType {
            name,
            codec,
            options: resolved,
        })
    }

    /// Table of registered tags and their default static widths.
    pub fn describe_types(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{:<16} {}", "Type", "Width");
        for (tag, codec) in &self.types {
            let width = codec
                .binary_size(&Options::default())
                .map_or_else(|| "dynamic".to_string(), |n| n.to_string());
            let _ = writeln!(out, "{tag:<16} {width}");
        }
        out
    }
}

/// Reject options the codec never reads and length prefixes that are not integers.
fn check_options(codec: &dyn FieldCodec, options: &Options) -> Result<()> {
    let accepted = codec.accepted_options();
    if let Some(unused) = options
        .specified()
        .into_iter()
        .find(|name| !accepted.contains(name))
    {
        return Err(WirechainError::setup(format!("does not take a `{unused}` option")));
    }
    if let Some(prefix) = &options.sizeof {
        if !prefix.codec.is_integer(&prefix.options) {
            return Err(WirechainError::setup(format!(
                "`sizeof` type {} is not an integer",
                prefix.name
            )));
        }
    }
    Ok(())
}
