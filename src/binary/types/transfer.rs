//! Quoted-printable and uuencoded text.
//!
//! Quoted-printable output breaks lines after 72 characters and always ends
//! in a soft break. Uuencoded output carries up to 45 bytes per line, each line
//! led by its length character and ended by a newline.

use crate::error::{Result, WirechainError};

/// Encoded characters per quoted-printable line before a soft break.
const QP_LINE: usize = 72;
/// Input bytes per uuencoded line.
const UU_LINE: usize = 45;

const HEX: &[u8; 16] = b"0123456789ABCDEF";

pub(crate) fn qp_encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 2 + 2);
    let mut line = 0;
    let mut prev = None;
    for &b in data {
        if b == b'\n' {
            // trailing whitespace is kept behind a soft break
            if matches!(prev, Some(b' ' | b'\t')) {
                out.extend_from_slice(b"=\n");
            }
            out.push(b);
            line = 0;
            prev = Some(b);
            continue;
        }

        if b > 126 || (b < 32 && b != b'\t') || b == b'=' {
            out.extend_from_slice(&[b'=', HEX[usize::from(b >> 4)], HEX[usize::from(b & 15)]]);
            line += 3;
            prev = None;
        } else {
            out.push(b);
            line += 1;
            prev = Some(b);
        }
        if line > QP_LINE {
            out.extend_from_slice(b"=\n");
            line = 0;
            prev = Some(b'\n');
        }
    }
    if line > 0 {
        out.extend_from_slice(b"=\n");
    }
    out
}

pub(crate) fn qp_decode(text: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len());
    let mut i = 0;
    while i < text.len() {
        if text[i] != b'=' {
            out.push(text[i]);
            i += 1;
            continue;
        }
        match &text[i + 1..] {
            [b'\n', ..] => i += 2,
            [b'\r', b'\n', ..] => i += 3,
            [hi, lo, ..] => {
                let (Some(hi), Some(lo)) = (hex_digit(*hi), hex_digit(*lo)) else {
                    return Err(WirechainError::corrupt(format!(
                        "invalid quoted-printable escape at offset {i}"
                    )));
                };
                out.push(hi << 4 | lo);
                i += 3;
            }
            _ => {
                return Err(WirechainError::corrupt(
                    "quoted-printable text ends inside an escape",
                ))
            }
        }
    }
    Ok(out)
}

fn hex_digit(c: u8) -> Option<u8> {
    char::from(c).to_digit(16).and_then(|d| u8::try_from(d).ok())
}

fn uu_char(v: u8) -> u8 {
    if v == 0 {
        b'`'
    } else {
        v + 32
    }
}

fn uu_value(c: u8) -> Result<u8> {
    if (32..=96).contains(&c) {
        Ok((c - 32) & 0x3f)
    } else {
        Err(WirechainError::corrupt(format!("invalid uuencode character {c:#04x}")))
    }
}

pub(crate) fn uu_encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 3 * 4 + data.len() / UU_LINE * 2 + 6);
    for line in data.chunks(UU_LINE) {
        // chunks are at most 45 bytes
        out.push(uu_char(line.len() as u8));
        for group in line.chunks(3) {
            let mut g = [0u8; 3];
            g[..group.len()].copy_from_slice(group);
            out.push(uu_char(g[0] >> 2));
            out.push(uu_char((g[0] << 4 | g[1] >> 4) & 0x3f));
            out.push(uu_char((g[1] << 2 | g[2] >> 6) & 0x3f));
            out.push(uu_char(g[2] & 0x3f));
        }
        out.push(b'\n');
    }
    out
}

pub(crate) fn uu_decode(text: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len() / 4 * 3);
    let mut rest = text;
    while let Some((&first, tail)) = rest.split_first() {
        let len = usize::from(uu_value(first)?);
        let chars = len.div_ceil(3) * 4;
        if tail.len() <= chars || tail[chars] != b'\n' {
            return Err(WirechainError::corrupt(format!(
                "uuencoded line announces {len} bytes but is truncated"
            )));
        }

        let start = out.len();
        for group in tail[..chars].chunks_exact(4) {
            let v = [
                uu_value(group[0])?,
                uu_value(group[1])?,
                uu_value(group[2])?,
                uu_value(group[3])?,
            ];
            out.push(v[0] << 2 | v[1] >> 4);
            out.push(v[1] << 4 | v[2] >> 2);
            out.push(v[2] << 6 | v[3]);
        }
        out.truncate(start + len);
        rest = &tail[chars + 1..];
    }
    Ok(out)
}
