//! Fixed-width integers and floats.
//!
//! `length` turns a scalar into a fixed-size array, `modifier` is added after
//! decode and subtracted before encode, and `limit` is checked on both paths
//! against the user-facing (modified) value.

use bytes::{Buf, BufMut, BytesMut};

use crate::binary::codec::{require, Context, FieldCodec};
use crate::binary::options::{Length, Options};
use crate::binary::Value;
use crate::error::{Result, WirechainError};

/// Scalar machine type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl Scalar {
    pub const fn width(self) -> usize {
        match self {
            Scalar::I8 | Scalar::U8 => 1,
            Scalar::I16 | Scalar::U16 => 2,
            Scalar::I32 | Scalar::U32 | Scalar::F32 => 4,
            Scalar::I64 | Scalar::U64 | Scalar::F64 => 8,
        }
    }

    const fn is_unsigned(self) -> bool {
        matches!(self, Scalar::U8 | Scalar::U16 | Scalar::U32 | Scalar::U64)
    }

    const fn is_float(self) -> bool {
        matches!(self, Scalar::F32 | Scalar::F64)
    }

    fn bounds(self) -> (i128, i128) {
        match self {
            Scalar::I8 => (i8::MIN as i128, i8::MAX as i128),
            Scalar::U8 => (0, u8::MAX as i128),
            Scalar::I16 => (i16::MIN as i128, i16::MAX as i128),
            Scalar::U16 => (0, u16::MAX as i128),
            Scalar::I32 => (i32::MIN as i128, i32::MAX as i128),
            Scalar::U32 => (0, u32::MAX as i128),
            Scalar::I64 => (i64::MIN as i128, i64::MAX as i128),
            Scalar::U64 => (0, u64::MAX as i128),
            Scalar::F32 | Scalar::F64 => (i128::MIN, i128::MAX),
        }
    }
}

/// Byte order of a packed scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Native,
    Little,
    Big,
}

macro_rules! get {
    ($buf:expr, $order:expr, $be:ident, $le:ident, $ne:ident) => {
        match $order {
            ByteOrder::Big => $buf.$be(),
            ByteOrder::Little => $buf.$le(),
            ByteOrder::Native => $buf.$ne(),
        }
    };
}

macro_rules! put {
    ($out:expr, $order:expr, $v:expr, $be:ident, $le:ident, $ne:ident) => {
        match $order {
            ByteOrder::Big => $out.$be($v),
            ByteOrder::Little => $out.$le($v),
            ByteOrder::Native => $out.$ne($v),
        }
    };
}

/// Codec for one scalar type in one byte order.
#[derive(Debug, Clone, Copy)]
pub struct PackCodec {
    scalar: Scalar,
    order: ByteOrder,
}

impl PackCodec {
    pub const fn new(scalar: Scalar, order: ByteOrder) -> Self {
        Self { scalar, order }
    }

    fn count(options: &Options) -> usize {
        match options.length {
            Some(Length::Count(n)) => n,
            _ => 1,
        }
    }

    fn read(&self, mut buf: &[u8]) -> Value {
        let o = self.order;
        match self.scalar {
            Scalar::I8 => Value::Int(buf.get_i8() as i64),
            Scalar::U8 => Value::UInt(buf.get_u8() as u64),
            Scalar::I16 => Value::Int(get!(buf, o, get_i16, get_i16_le, get_i16_ne) as i64),
            Scalar::U16 => Value::UInt(get!(buf, o, get_u16, get_u16_le, get_u16_ne) as u64),
            Scalar::I32 => Value::Int(get!(buf, o, get_i32, get_i32_le, get_i32_ne) as i64),
            Scalar::U32 => Value::UInt(get!(buf, o, get_u32, get_u32_le, get_u32_ne) as u64),
            Scalar::I64 => Value::Int(get!(buf, o, get_i64, get_i64_le, get_i64_ne)),
            Scalar::U64 => Value::UInt(get!(buf, o, get_u64, get_u64_le, get_u64_ne)),
            Scalar::F32 => Value::Float(get!(buf, o, get_f32, get_f32_le, get_f32_ne) as f64),
            Scalar::F64 => Value::Float(get!(buf, o, get_f64, get_f64_le, get_f64_ne)),
        }
    }

    fn write(&self, value: &Value, out: &mut BytesMut) -> Result<()> {
        let o = self.order;
        if self.scalar.is_float() {
            let v = value
                .as_f64()
                .ok_or_else(|| WirechainError::corrupt(format!("expected a number, got {}", value.type_name())))?;
            match self.scalar {
                Scalar::F32 => put!(out, o, v as f32, put_f32, put_f32_le, put_f32_ne),
                _ => put!(out, o, v, put_f64, put_f64_le, put_f64_ne),
            }
            return Ok(());
        }

        let v = value
            .as_i128()
            .ok_or_else(|| WirechainError::corrupt(format!("expected an integer, got {}", value.type_name())))?;
        let (min, max) = self.scalar.bounds();
        if v < min || v > max {
            return Err(WirechainError::corrupt(format!(
                "{v} does not fit in {:?}",
                self.scalar
            )));
        }
        match self.scalar {
            Scalar::I8 => out.put_i8(v as i8),
            Scalar::U8 => out.put_u8(v as u8),
            Scalar::I16 => put!(out, o, v as i16, put_i16, put_i16_le, put_i16_ne),
            Scalar::U16 => put!(out, o, v as u16, put_u16, put_u16_le, put_u16_ne),
            Scalar::I32 => put!(out, o, v as i32, put_i32, put_i32_le, put_i32_ne),
            Scalar::U32 => put!(out, o, v as u32, put_u32, put_u32_le, put_u32_ne),
            Scalar::I64 => put!(out, o, v as i64, put_i64, put_i64_le, put_i64_ne),
            Scalar::U64 => put!(out, o, v as u64, put_u64, put_u64_le, put_u64_ne),
            // floats were written above
            Scalar::F32 | Scalar::F64 => {}
        }
        Ok(())
    }

    fn apply_modifier(&self, value: Value, modifier: i64) -> Result<Value> {
        match value {
            Value::Float(f) => Ok(Value::Float(f + modifier as f64)),
            other => {
                let n = other.as_i128().unwrap_or_default() + modifier as i128;
                Value::from_i128(n, self.scalar.is_unsigned())
                    .ok_or_else(|| WirechainError::corrupt(format!("{n} out of range after modifier")))
            }
        }
    }

    fn remove_modifier(&self, value: &Value, modifier: i64) -> Result<Value> {
        match value {
            Value::Float(f) => Ok(Value::Float(f - modifier as f64)),
            other => {
                let n = other.as_i128().ok_or_else(|| {
                    WirechainError::corrupt(format!("expected an integer, got {}", other.type_name()))
                })? - modifier as i128;
                Value::from_i128(n, false)
                    .or_else(|| Value::from_i128(n, true))
                    .ok_or_else(|| WirechainError::corrupt(format!("{n} out of range after modifier")))
            }
        }
    }

    fn decode_one(&self, input: &[u8], options: &Options) -> Result<Value> {
        let mut value = self.read(input);
        if let Some(m) = options.modifier {
            value = self.apply_modifier(value, m)?;
        }
        if let Some(limit) = &options.limit {
            limit.check(&value)?;
        }
        Ok(value)
    }

    fn encode_one(&self, value: &Value, options: &Options, out: &mut BytesMut) -> Result<()> {
        if let Some(limit) = &options.limit {
            limit.check(value)?;
        }
        match options.modifier {
            Some(m) => self.write(&self.remove_modifier(value, m)?, out),
            None => self.write(value, out),
        }
    }
}

impl FieldCodec for PackCodec {
    fn binary_size(&self, options: &Options) -> Option<usize> {
        Some(self.scalar.width() * Self::count(options))
    }

    fn accepted_options(&self) -> &'static [&'static str] {
        &["length", "modifier", "limit"]
    }

    fn is_integer(&self, options: &Options) -> bool {
        !self.scalar.is_float() && options.length.is_none()
    }

    fn validate(&self, options: &Options) -> Result<()> {
        match &options.length {
            None | Some(Length::Count(_)) => Ok(()),
            Some(other) => Err(WirechainError::setup(format!(
                "numeric fields take a literal length, not {other:?}"
            ))),
        }
    }

    fn decode(&self, input: &[u8], options: &Options, _ctx: &Context<'_>) -> Result<(Value, usize)> {
        let width = self.scalar.width();
        let count = Self::count(options);
        require(input, width * count)?;

        let value = if options.length.is_none() {
            self.decode_one(input, options)?
        } else {
            let items = input
                .chunks_exact(width)
                .take(count)
                .map(|chunk| self.decode_one(chunk, options))
                .collect::<Result<Vec<_>>>()?;
            Value::List(items)
        };
        Ok((value, width * count))
    }

    fn encode(
        &self,
        value: &Value,
        options: &Options,
        _ctx: &Context<'_>,
        out: &mut BytesMut,
    ) -> Result<()> {
        if options.length.is_none() {
            return self.encode_one(value, options, out);
        }
        let count = Self::count(options);
        let items = value.as_list().ok_or_else(|| {
            WirechainError::corrupt(format!("expected a list of {count}, got {}", value.type_name()))
        })?;
        if items.len() != count {
            return Err(WirechainError::corrupt(format!(
                "list has {} elements, require {count}",
                items.len()
            )));
        }
        for item in items {
            self.encode_one(item, options, out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::options::Limit;

    fn enc(codec: PackCodec, value: Value, options: &Options) -> Result<Vec<u8>> {
        let mut out = BytesMut::new();
        codec.encode(&value, options, &Context::detached(), &mut out)?;
        Ok(out.to_vec())
    }

    fn dec(codec: PackCodec, input: &[u8], options: &Options) -> Result<(Value, usize)> {
        codec.decode(input, options, &Context::detached())
    }

    #[test]
    fn test_byte_orders() {
        let opts = Options::default();
        let big = PackCodec::new(Scalar::U16, ByteOrder::Big);
        let little = PackCodec::new(Scalar::U16, ByteOrder::Little);
        assert_eq!(enc(big, Value::UInt(0x0102), &opts).unwrap(), vec![1, 2]);
        assert_eq!(enc(little, Value::UInt(0x0102), &opts).unwrap(), vec![2, 1]);
        assert_eq!(dec(big, &[1, 2, 9], &opts).unwrap(), (Value::UInt(0x0102), 2));
    }

    #[test]
    fn test_signed_values() {
        let codec = PackCodec::new(Scalar::I8, ByteOrder::Native);
        let opts = Options::default();
        assert_eq!(dec(codec, &[0xff], &opts).unwrap().0, Value::Int(-1));
        assert_eq!(enc(codec, Value::Int(-2), &opts).unwrap(), vec![0xfe]);
    }

    #[test]
    fn test_incomplete_when_short() {
        let codec = PackCodec::new(Scalar::U32, ByteOrder::Little);
        let err = dec(codec, &[1, 2, 3], &Options::default()).unwrap_err();
        assert!(err.is_incomplete());
    }

    #[test]
    fn test_out_of_range_encode_is_corrupt() {
        let codec = PackCodec::new(Scalar::U8, ByteOrder::Native);
        let err = enc(codec, Value::UInt(256), &Options::default()).unwrap_err();
        assert!(err.is_corrupt());
        let err = enc(codec, Value::Bytes(Default::default()), &Options::default()).unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn test_modifier_round_trip() {
        let codec = PackCodec::new(Scalar::U8, ByteOrder::Native);
        let opts = Options {
            modifier: Some(10),
            ..Options::default()
        };
        assert_eq!(dec(codec, &[5], &opts).unwrap().0, Value::UInt(15));
        assert_eq!(enc(codec, Value::UInt(15), &opts).unwrap(), vec![5]);
    }

    #[test]
    fn test_limit_checked_after_decode() {
        let codec = PackCodec::new(Scalar::U8, ByteOrder::Native);
        let opts = Options {
            limit: Some(Limit::from(0..=9)),
            ..Options::default()
        };
        assert!(dec(codec, &[9], &opts).is_ok());
        assert!(dec(codec, &[10], &opts).unwrap_err().is_corrupt());
        assert!(enc(codec, Value::UInt(10), &opts).unwrap_err().is_corrupt());
    }

    #[test]
    fn test_repetition_count() {
        let codec = PackCodec::new(Scalar::U16, ByteOrder::Big);
        let opts = Options {
            length: Some(Length::Count(3)),
            ..Options::default()
        };
        assert_eq!(codec.binary_size(&opts), Some(6));
        let (value, used) = dec(codec, &[0, 1, 0, 2, 0, 3], &opts).unwrap();
        assert_eq!(used, 6);
        assert_eq!(
            value,
            Value::List(vec![Value::UInt(1), Value::UInt(2), Value::UInt(3)])
        );
        assert_eq!(enc(codec, value, &opts).unwrap(), vec![0, 1, 0, 2, 0, 3]);
        let short = Value::List(vec![Value::UInt(1)]);
        assert!(enc(codec, short, &opts).unwrap_err().is_corrupt());
    }

    #[test]
    fn test_floats() {
        let codec = PackCodec::new(Scalar::F64, ByteOrder::Big);
        let opts = Options::default();
        let bytes = enc(codec, Value::Float(1.5), &opts).unwrap();
        assert_eq!(bytes, 1.5f64.to_be_bytes().to_vec());
        assert_eq!(dec(codec, &bytes, &opts).unwrap(), (Value::Float(1.5), 8));
    }

    #[test]
    fn test_validate_rejects_dynamic_length() {
        let codec = PackCodec::new(Scalar::U8, ByteOrder::Native);
        let opts = Options {
            length: Some(Length::All),
            ..Options::default()
        };
        assert!(matches!(codec.validate(&opts), Err(WirechainError::Setup(_))));
    }
}
