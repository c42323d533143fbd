//! Argument lists as shell-escaped lines.
//!
//! The stage itself does not delimit lines; stack it on a
//! [`SeparatorProtocol`](super::SeparatorProtocol).

use bytes::Bytes;
use serde_json::Value;

use super::{Extract, Message, Protocol};
use crate::error::{Result, WirechainError};

/// Converts an array of arguments to one escaped line and back.
///
/// Non-string arguments are sent in their JSON text form and come back as
/// strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellwordsProtocol;

impl ShellwordsProtocol {
    pub fn new() -> Self {
        Self
    }
}

/// Escape one word so that [`split`] returns it unchanged.
pub(crate) fn escape(word: &str) -> String {
    if word.is_empty() {
        return "''".to_string();
    }
    let mut out = String::with_capacity(word.len() * 2);
    for c in word.chars() {
        match c {
            '\n' => out.push_str("'\n'"),
            c if c.is_ascii_alphanumeric() || "_-.,:+/@".contains(c) => out.push(c),
            c => {
                out.push('\\');
                out.push(c);
            }
        }
    }
    out
}

/// Split a line into words with POSIX shell quoting rules.
pub(crate) fn split(line: &str) -> Result<Vec<String>> {
    let unmatched = |q: char| WirechainError::corrupt(format!("unmatched {q} in {line:?}"));
    let mut words = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut word = String::new();
        while let Some(c) = chars.next() {
            match c {
                c if c.is_whitespace() => break,
                '\\' => {
                    if let Some(next) = chars.next() {
                        word.push(next);
                    }
                }
                '\'' => loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(x) => word.push(x),
                        None => return Err(unmatched('\'')),
                    }
                },
                '"' => loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(x @ ('$' | '`' | '"' | '\\' | '\n')) => word.push(x),
                            Some(x) => {
                                word.push('\\');
                                word.push(x);
                            }
                            None => return Err(unmatched('"')),
                        },
                        Some(x) => word.push(x),
                        None => return Err(unmatched('"')),
                    }
                },
                c => word.push(c),
            }
        }
        words.push(word);
    }
    Ok(words)
}

impl Protocol for ShellwordsProtocol {
    fn name(&self) -> &str {
        "shellwords"
    }

    fn encode(&mut self, message: Message) -> Result<Vec<Message>> {
        let args = match message.into_object(self.name())? {
            Value::Array(args) => args,
            other => {
                return Err(WirechainError::corrupt(format!(
                    "expected an argument array, got {other}"
                )))
            }
        };
        let line = args
            .iter()
            .map(|arg| match arg {
                Value::String(s) => escape(s),
                other => escape(&other.to_string()),
            })
            .collect::<Vec<_>>()
            .join(" ");
        Ok(vec![Message::Bytes(Bytes::from(line))])
    }

    fn decode_bytes(&mut self, input: &[u8]) -> Result<Extract> {
        let line = std::str::from_utf8(input)
            .map_err(|e| WirechainError::corrupt(format!("argument line is not UTF-8: {e}")))?;
        let words = split(line)?.into_iter().map(Value::String).collect();
        Ok(Extract::one(input.len(), Value::Array(words)))
    }
}
