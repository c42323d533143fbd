use bytes::{Bytes, BytesMut};

use super::{Extract, Message, Protocol};
use crate::error::{Result, WirechainError};

/// Frames end with a separator sequence, `\n` by default.
#[derive(Debug, Clone)]
pub struct SeparatorProtocol {
    separator: Bytes,
}

impl SeparatorProtocol {
    pub fn new() -> Self {
        Self {
            separator: Bytes::from_static(b"\n"),
        }
    }

    /// Use a different separator. An empty separator is a setup error.
    pub fn with_separator(separator: impl AsRef<[u8]>) -> Result<Self> {
        let separator = separator.as_ref();
        if separator.is_empty() {
            return Err(WirechainError::setup("separator must not be empty"));
        }
        Ok(Self {
            separator: Bytes::copy_from_slice(separator),
        })
    }

    pub fn separator(&self) -> &[u8] {
        &self.separator
    }

    fn find(&self, haystack: &[u8]) -> Option<usize> {
        haystack
            .windows(self.separator.len())
            .position(|w| w == self.separator.as_ref())
    }
}

impl Default for SeparatorProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl Protocol for SeparatorProtocol {
    fn name(&self) -> &str {
        "separator"
    }

    fn encode(&mut self, message: Message) -> Result<Vec<Message>> {
        let payload = message.into_bytes(self.name())?;
        if self.find(&payload).is_some() {
            return Err(WirechainError::corrupt(
                "payload contains the frame separator",
            ));
        }
        let mut frame = BytesMut::with_capacity(payload.len() + self.separator.len());
        frame.extend_from_slice(&payload);
        frame.extend_from_slice(&self.separator);
        Ok(vec![Message::Bytes(frame.freeze())])
    }

    fn decode_bytes(&mut self, input: &[u8]) -> Result<Extract> {
        Ok(match self.find(input) {
            Some(end) => Extract::one(
                end + self.separator.len(),
                Bytes::copy_from_slice(&input[..end]),
            ),
            None => Extract::Incomplete,
        })
    }
}
