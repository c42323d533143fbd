//! Literal byte sequences such as magic numbers and version tags.

use bytes::{BufMut, BytesMut};

use crate::binary::codec::{Context, FieldCodec};
use crate::binary::options::Options;
use crate::binary::Value;
use crate::error::{Result, WirechainError};

/// Matches the `value` option exactly; decodes to that literal.
#[derive(Debug, Clone, Copy)]
pub struct FixedCodec;

fn expected(options: &Options) -> Result<&[u8]> {
    options
        .value
        .as_deref()
        .ok_or_else(|| WirechainError::setup("fixed fields require a `value`"))
}

impl FieldCodec for FixedCodec {
    fn binary_size(&self, options: &Options) -> Option<usize> {
        options.value.as_ref().map(|v| v.len())
    }

    fn accepted_options(&self) -> &'static [&'static str] {
        &["value"]
    }

    fn validate(&self, options: &Options) -> Result<()> {
        expected(options).map(|_| ())
    }

    fn initial_value(&self, options: &Options) -> Option<Value> {
        options.value.as_deref().map(Value::from)
    }

    fn decode(&self, input: &[u8], options: &Options, _ctx: &Context<'_>) -> Result<(Value, usize)> {
        let value = expected(options)?;
        if input.len() < value.len() {
            return if value.starts_with(input) {
                Err(WirechainError::incomplete(format!(
                    "have {} of {} fixed bytes",
                    input.len(),
                    value.len()
                )))
            } else {
                Err(WirechainError::corrupt(format!(
                    "expected {value:?}, got {input:?}"
                )))
            };
        }
        if &input[..value.len()] != value {
            return Err(WirechainError::corrupt(format!(
                "expected {:?}, got {:?}",
                value,
                &input[..value.len()]
            )));
        }
        Ok((Value::from(value), value.len()))
    }

    fn encode(
        &self,
        value: &Value,
        options: &Options,
        _ctx: &Context<'_>,
        out: &mut BytesMut,
    ) -> Result<()> {
        let expected = expected(options)?;
        match value.as_bytes() {
            Some(v) if v.as_ref() == expected => {
                out.put_slice(expected);
                Ok(())
            }
            _ => Err(WirechainError::corrupt(format!(
                "fixed field must hold {expected:?}, got {value:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn magic() -> Options {
        Options {
            value: Some(Bytes::from_static(b"MAGC")),
            ..Options::default()
        }
    }

    #[test]
    fn test_fixed_matches() {
        let (value, used) = FixedCodec
            .decode(b"MAGCrest", &magic(), &Context::detached())
            .unwrap();
        assert_eq!(used, 4);
        assert_eq!(value, Value::from("MAGC"));
        assert_eq!(FixedCodec.binary_size(&magic()), Some(4));
    }

    #[test]
    fn test_fixed_short_prefix_is_incomplete() {
        let err = FixedCodec
            .decode(b"MA", &magic(), &Context::detached())
            .unwrap_err();
        assert!(err.is_incomplete());

        let err = FixedCodec
            .decode(b"MX", &magic(), &Context::detached())
            .unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn test_fixed_mismatch_is_corrupt() {
        let err = FixedCodec
            .decode(b"NOPE", &magic(), &Context::detached())
            .unwrap_err();
        assert!(err.is_corrupt());

        let mut out = BytesMut::new();
        assert!(FixedCodec
            .encode(&Value::from("NOPE"), &magic(), &Context::detached(), &mut out)
            .is_err());
        FixedCodec
            .encode(&Value::from("MAGC"), &magic(), &Context::detached(), &mut out)
            .unwrap();
        assert_eq!(&out[..], b"MAGC");
    }

    #[test]
    fn test_fixed_requires_value() {
        assert!(matches!(
            FixedCodec.validate(&Options::default()),
            Err(WirechainError::Setup(_))
        ));
    }
}
