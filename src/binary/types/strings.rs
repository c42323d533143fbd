//! Byte-string types: raw bytes, space-padded strings, NUL-terminated strings
//! and text transfer encodings (base64, quoted-printable, uuencode).

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::{BufMut, Bytes, BytesMut};

use super::transfer;
use crate::binary::codec::{require, Context, FieldCodec};
use crate::binary::options::{Length, Options};
use crate::binary::Value;
use crate::error::{Result, WirechainError};

/// How the stored bytes relate to the field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BytesKind {
    /// Stored as-is; short values are NUL-padded.
    Raw,
    /// Short values are space-padded; trailing spaces and NULs are stripped on decode.
    Padded,
    /// Value ends at the first NUL. Without a fixed length the NUL is written and consumed.
    NulTerminated,
    /// Stored as standard base64 text; lengths count encoded bytes.
    Base64,
    /// Stored as quoted-printable text; lengths count encoded bytes.
    QuotedPrintable,
    /// Stored as uuencoded lines; lengths count encoded bytes.
    Uuencoded,
}

impl BytesKind {
    fn pad_byte(&self) -> Option<u8> {
        match self {
            BytesKind::Raw | BytesKind::NulTerminated => Some(0),
            BytesKind::Padded => Some(b' '),
            BytesKind::Base64 | BytesKind::QuotedPrintable | BytesKind::Uuencoded => None,
        }
    }
}

/// Length-delimited byte strings.
///
/// The length comes from exactly one of a `sizeof` prefix or a `length`
/// option, unless the codec fixes its own length (`char`, `nstring`).
#[derive(Debug, Clone)]
pub struct BytesCodec {
    kind: BytesKind,
    forced: Option<Length>,
}

impl BytesCodec {
    pub const fn new(kind: BytesKind) -> Self {
        Self { kind, forced: None }
    }

    /// A single raw byte.
    pub const fn char() -> Self {
        Self {
            kind: BytesKind::Raw,
            forced: Some(Length::Count(1)),
        }
    }

    /// NUL-terminated string of any length.
    pub const fn nstring() -> Self {
        Self {
            kind: BytesKind::NulTerminated,
            forced: Some(Length::All),
        }
    }

    pub fn kind(&self) -> BytesKind {
        self.kind
    }

    fn length<'o>(&'o self, options: &'o Options) -> Option<&'o Length> {
        self.forced.as_ref().or(options.length.as_ref())
    }

    fn unpack(&self, raw: &[u8]) -> Result<Value> {
        let bytes = match self.kind {
            BytesKind::Raw => Bytes::copy_from_slice(raw),
            BytesKind::Padded => {
                let end = raw
                    .iter()
                    .rposition(|b| *b != b' ' && *b != 0)
                    .map_or(0, |p| p + 1);
                Bytes::copy_from_slice(&raw[..end])
            }
            BytesKind::NulTerminated => {
                let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
                Bytes::copy_from_slice(&raw[..end])
            }
            BytesKind::Base64 => STANDARD
                .decode(raw)
                .map(Bytes::from)
                .map_err(|e| WirechainError::corrupt(format!("invalid base64: {e}")))?,
            BytesKind::QuotedPrintable => Bytes::from(transfer::qp_decode(raw)?),
            BytesKind::Uuencoded => Bytes::from(transfer::uu_decode(raw)?),
        };
        Ok(Value::Bytes(bytes))
    }

    fn pack(&self, value: &Value) -> Result<Bytes> {
        let data = value.as_bytes().ok_or_else(|| {
            WirechainError::corrupt(format!("expected bytes, got {}", value.type_name()))
        })?;
        match self.kind {
            BytesKind::Base64 => Ok(Bytes::from(STANDARD.encode(data))),
            BytesKind::QuotedPrintable => Ok(Bytes::from(transfer::qp_encode(data))),
            BytesKind::Uuencoded => Ok(Bytes::from(transfer::uu_encode(data))),
            BytesKind::NulTerminated if data.contains(&0) => Err(WirechainError::corrupt(
                "NUL-terminated string contains a NUL byte",
            )),
            _ => Ok(data.clone()),
        }
    }
}

impl FieldCodec for BytesCodec {
    fn binary_size(&self, options: &Options) -> Option<usize> {
        if options.sizeof.is_some() {
            return None;
        }
        match self.length(options) {
            Some(Length::Count(n)) => Some(*n),
            _ => None,
        }
    }

    fn accepted_options(&self) -> &'static [&'static str] {
        &["length", "sizeof"]
    }

    fn validate(&self, options: &Options) -> Result<()> {
        if self.forced.is_some() {
            if options.sizeof.is_some() || options.length.is_some() {
                return Err(WirechainError::setup("this type has a fixed length"));
            }
            return Ok(());
        }
        match (&options.sizeof, &options.length) {
            (Some(_), Some(_)) => Err(WirechainError::setup(
                "give either `sizeof` or `length`, not both",
            )),
            (None, None) => Err(WirechainError::setup("requires `sizeof` or `length`")),
            (Some(prefix), None) if prefix.binary_size().is_none() => Err(WirechainError::setup(
                format!("`sizeof` type {} has no static size", prefix.name),
            )),
            _ => Ok(()),
        }
    }

    fn decode(&self, input: &[u8], options: &Options, ctx: &Context<'_>) -> Result<(Value, usize)> {
        let (length, header) = match &options.sizeof {
            Some(prefix) => {
                let (n, used) = prefix.decode_length(input)?;
                (Some(n), used)
            }
            None => match self.length(options) {
                Some(length) => (ctx.resolve_length(length)?, 0),
                None => return Err(WirechainError::setup("no length configured")),
            },
        };
        let body = &input[header..];

        let (raw, used) = match length {
            Some(n) => {
                require(body, n)?;
                (&body[..n], n)
            }
            None if self.kind == BytesKind::NulTerminated => match body.iter().position(|b| *b == 0) {
                Some(end) => (&body[..end], end + 1),
                None => return Err(WirechainError::incomplete("no NUL terminator yet")),
            },
            None => (body, body.len()),
        };

        Ok((self.unpack(raw)?, header + used))
    }

    fn encode(
        &self,
        value: &Value,
        options: &Options,
        ctx: &Context<'_>,
        out: &mut BytesMut,
    ) -> Result<()> {
        let data = self.pack(value)?;

        if let Some(prefix) = &options.sizeof {
            prefix.encode(&Value::from(data.len()), &Context::detached(), out)?;
            out.put_slice(&data);
            return Ok(());
        }

        let length = match self.length(options) {
            Some(length) => ctx.resolve_length(length)?,
            None => return Err(WirechainError::setup("no length configured")),
        };
        match length {
            Some(n) if data.len() > n => Err(WirechainError::corrupt(format!(
                "{} bytes do not fit in a {n}-byte field",
                data.len()
            ))),
            Some(n) => {
                out.put_slice(&data);
                if data.len() < n {
                    let pad = self.kind.pad_byte().ok_or_else(|| {
                        WirechainError::corrupt(format!(
                            "encoded length {} must equal {n}",
                            data.len()
                        ))
                    })?;
                    out.put_bytes(pad, n - data.len());
                }
                Ok(())
            }
            None => {
                out.put_slice(&data);
                if self.kind == BytesKind::NulTerminated {
                    out.put_u8(0);
                }
                Ok(())
            }
        }
    }
}
