//! Homogeneous lists of any registered type.

use bytes::BytesMut;

use crate::binary::codec::{Context, FieldCodec};
use crate::binary::options::{FieldType, Length, Options};
use crate::binary::Value;
use crate::error::{Result, WirechainError};

/// A list of `of` elements.
///
/// The element count comes from a `sizeof` prefix or `length`. With
/// `length_all`, fixed-size elements are counted from the remaining input and
/// variable-size ones repeat until it is exhausted.
#[derive(Debug, Clone, Copy)]
pub struct ListCodec;

fn element(options: &Options) -> Result<&FieldType> {
    options
        .of
        .as_deref()
        .ok_or_else(|| WirechainError::setup("lists require an `of` element type"))
}

impl FieldCodec for ListCodec {
    fn binary_size(&self, options: &Options) -> Option<usize> {
        match (&options.sizeof, &options.length) {
            (None, Some(Length::Count(n))) => element(options)
                .ok()?
                .binary_size()
                .map(|size| size * n),
            _ => None,
        }
    }

    fn accepted_options(&self) -> &'static [&'static str] {
        &["of", "length", "sizeof"]
    }

    fn validate(&self, options: &Options) -> Result<()> {
        let element = element(options)?;
        match (&options.sizeof, &options.length) {
            (Some(_), Some(_)) => {
                return Err(WirechainError::setup(
                    "give either `sizeof` or `length`, not both",
                ))
            }
            (None, None) => return Err(WirechainError::setup("requires `sizeof` or `length`")),
            (Some(prefix), None) if prefix.binary_size().is_none() => {
                return Err(WirechainError::setup(format!(
                    "`sizeof` type {} has no static size",
                    prefix.name
                )))
            }
            _ => {}
        }
        if options.length == Some(Length::All) && element.binary_size() == Some(0) {
            return Err(WirechainError::setup(
                "a zero-size element cannot fill the remaining input",
            ));
        }
        Ok(())
    }

    fn decode(&self, input: &[u8], options: &Options, ctx: &Context<'_>) -> Result<(Value, usize)> {
        let element = element(options)?;
        let (count, mut pos) = match (&options.sizeof, &options.length) {
            (Some(prefix), _) => {
                let (n, used) = prefix.decode_length(input)?;
                (Some(n), used)
            }
            (None, Some(length)) => (ctx.resolve_length(length)?, 0),
            (None, None) => return Err(WirechainError::setup("no length configured")),
        };

        let count = match (count, element.binary_size()) {
            (Some(n), _) => Some(n),
            (None, Some(size)) if size > 0 => Some((input.len() - pos) / size),
            (None, _) => None,
        };

        let mut items = Vec::with_capacity(count.unwrap_or(0).min(1024));
        match count {
            Some(n) => {
                for _ in 0..n {
                    let (item, used) = element.decode(&input[pos..], ctx)?;
                    items.push(item);
                    pos += used;
                }
            }
            None => {
                while pos < input.len() {
                    let (item, used) = element.decode(&input[pos..], ctx)?;
                    if used == 0 {
                        return Err(WirechainError::corrupt(format!(
                            "{} element consumed no input",
                            element.name
                        )));
                    }
                    items.push(item);
                    pos += used;
                }
            }
        }
        Ok((Value::List(items), pos))
    }

    fn encode(
        &self,
        value: &Value,
        options: &Options,
        ctx: &Context<'_>,
        out: &mut BytesMut,
    ) -> Result<()> {
        let element = element(options)?;
        let items = value.as_list().ok_or_else(|| {
            WirechainError::corrupt(format!("expected list, got {}", value.type_name()))
        })?;

        match (&options.sizeof, &options.length) {
            (Some(prefix), _) => {
                prefix.encode(&Value::from(items.len()), &Context::detached(), out)?;
            }
            (None, Some(length)) => {
                if let Some(n) = ctx.resolve_length(length)? {
                    if n != items.len() {
                        return Err(WirechainError::corrupt(format!(
                            "list holds {} elements, expected {n}",
                            items.len()
                        )));
                    }
                }
            }
            (None, None) => return Err(WirechainError::setup("no length configured")),
        }

        for item in items {
            element.encode(item, ctx, out)?;
        }
        Ok(())
    }
}
