//! Bit-level types.
//!
//! A bitfield unpacks whole bytes into an ASCII string of `'0'`/`'1'`
//! characters. The `bit` type then reads from such a string, usually through
//! an inline struct declared on the bitfield:
//!
//! ```
//! use wirechain::binary::{FieldOptions, FieldTypeRegistry, StructDescriptor};
//!
//! let registry = FieldTypeRegistry::standard();
//! let flags = StructDescriptor::builder(&registry, "Flags")
//!     .field("urgent", "bit", FieldOptions::new())
//!     .field("rest", "bit", FieldOptions::new().length(7))
//!     .build()
//!     .unwrap();
//! let packet = StructDescriptor::builder(&registry, "Packet")
//!     .inline("flags", "msb_bitfield", FieldOptions::new().length(8), flags)
//!     .build()
//!     .unwrap();
//!
//! let (decoded, used) = packet.decode(&[0b1000_0001]).unwrap();
//! assert_eq!(used, 1);
//! let flags = decoded.get("flags").unwrap();
//! let flags = flags.as_struct().unwrap();
//! assert_eq!(flags.get("urgent").unwrap().as_bool(), Some(true));
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::binary::codec::{require, Context, FieldCodec};
use crate::binary::options::{Length, Options};
use crate::binary::Value;
use crate::error::{Result, WirechainError};

fn bit_count(options: &Options) -> usize {
    match options.length {
        Some(Length::Count(n)) => n,
        _ => 1,
    }
}

/// Collect `'0'`/`'1'` characters from a bit string, a bool or a list of bools.
fn bit_chars(value: &Value) -> Result<Vec<bool>> {
    match value {
        Value::Bool(b) => Ok(vec![*b]),
        Value::Bytes(b) => b
            .iter()
            .map(|c| match c {
                b'0' => Ok(false),
                b'1' => Ok(true),
                other => Err(WirechainError::corrupt(format!(
                    "bit strings hold '0' and '1', found {:?}",
                    *other as char
                ))),
            })
            .collect(),
        Value::List(items) => items
            .iter()
            .map(|v| {
                v.as_bool().ok_or_else(|| {
                    WirechainError::corrupt(format!("expected bool, got {}", v.type_name()))
                })
            })
            .collect(),
        other => Err(WirechainError::corrupt(format!(
            "expected bits, got {}",
            other.type_name()
        ))),
    }
}

/// Packs `length` bits into whole bytes; MSB-first or LSB-first within each byte.
#[derive(Debug, Clone, Copy)]
pub struct BitfieldCodec {
    msb_first: bool,
}

impl BitfieldCodec {
    pub const fn msb_first() -> Self {
        Self { msb_first: true }
    }

    pub const fn lsb_first() -> Self {
        Self { msb_first: false }
    }

    fn shift(&self, i: usize) -> usize {
        if self.msb_first {
            7 - (i % 8)
        } else {
            i % 8
        }
    }
}

impl FieldCodec for BitfieldCodec {
    fn binary_size(&self, options: &Options) -> Option<usize> {
        Some(bit_count(options).div_ceil(8))
    }

    fn accepted_options(&self) -> &'static [&'static str] {
        &["length"]
    }

    fn validate(&self, options: &Options) -> Result<()> {
        match &options.length {
            None | Some(Length::Count(_)) => Ok(()),
            Some(other) => Err(WirechainError::setup(format!(
                "bitfields take a literal bit count, not {other:?}"
            ))),
        }
    }

    fn decode(&self, input: &[u8], options: &Options, _ctx: &Context<'_>) -> Result<(Value, usize)> {
        let bits = bit_count(options);
        let width = bits.div_ceil(8);
        require(input, width)?;

        let chars: Vec<u8> = (0..bits)
            .map(|i| {
                if input[i / 8] >> self.shift(i) & 1 == 1 {
                    b'1'
                } else {
                    b'0'
                }
            })
            .collect();
        Ok((Value::Bytes(Bytes::from(chars)), width))
    }

    fn encode(
        &self,
        value: &Value,
        options: &Options,
        _ctx: &Context<'_>,
        out: &mut BytesMut,
    ) -> Result<()> {
        let bits = bit_count(options);
        let set = bit_chars(value)?;
        if set.len() > bits {
            return Err(WirechainError::corrupt(format!(
                "{} bits do not fit in a {bits}-bit field",
                set.len()
            )));
        }
        let mut packed = vec![0u8; bits.div_ceil(8)];
        for (i, bit) in set.iter().enumerate() {
            if *bit {
                packed[i / 8] |= 1 << self.shift(i);
            }
        }
        out.put_slice(&packed);
        Ok(())
    }
}

/// Reads bits from a `'0'`/`'1'` string: one bit is a `Bool`, more are a list.
#[derive(Debug, Clone, Copy)]
pub struct BitCodec;

impl FieldCodec for BitCodec {
    fn binary_size(&self, options: &Options) -> Option<usize> {
        match options.length {
            Some(Length::All) | Some(Length::Field(_)) => None,
            _ => Some(bit_count(options)),
        }
    }

    fn accepted_options(&self) -> &'static [&'static str] {
        &["length"]
    }

    fn decode(&self, input: &[u8], options: &Options, ctx: &Context<'_>) -> Result<(Value, usize)> {
        let count = match &options.length {
            None => 1,
            Some(length) => ctx.resolve_length(length)?.unwrap_or(input.len()),
        };
        require(input, count)?;

        let mut bits = bit_chars(&Value::Bytes(Bytes::copy_from_slice(&input[..count])))?;
        let value = if bits.len() == 1 {
            Value::Bool(bits.remove(0))
        } else {
            Value::List(bits.into_iter().map(Value::Bool).collect())
        };
        Ok((value, count))
    }

    fn encode(
        &self,
        value: &Value,
        _options: &Options,
        _ctx: &Context<'_>,
        out: &mut BytesMut,
    ) -> Result<()> {
        for bit in bit_chars(value)? {
            out.put_u8(if bit { b'1' } else { b'0' });
        }
        Ok(())
    }
}
