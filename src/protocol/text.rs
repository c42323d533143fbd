//! Human-readable object documents.
//!
//! Each object is written as pretty-printed JSON followed by a line holding
//! exactly `...`:
//!
//! ```text
//! {
//!   "method": "ping"
//! }
//! ...
//! ```

use bytes::{BufMut, BytesMut};

use super::{Extract, Message, Protocol};
use crate::error::{Result, WirechainError};

const SENTINEL: &[u8] = b"\n...\n";

/// Sentinel-terminated JSON text documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextObjectProtocol;

impl TextObjectProtocol {
    pub fn new() -> Self {
        Self
    }
}

impl Protocol for TextObjectProtocol {
    fn name(&self) -> &str {
        "text-object"
    }

    fn encode(&mut self, message: Message) -> Result<Vec<Message>> {
        let object = message.into_object(self.name())?;
        let text = serde_json::to_vec_pretty(&object)?;
        let mut frame = BytesMut::with_capacity(text.len() + SENTINEL.len());
        frame.put_slice(&text);
        frame.put_slice(SENTINEL);
        Ok(vec![Message::Bytes(frame.freeze())])
    }

    fn decode_bytes(&mut self, input: &[u8]) -> Result<Extract> {
        let Some(end) = input
            .windows(SENTINEL.len())
            .position(|w| w == SENTINEL)
        else {
            return Ok(Extract::Incomplete);
        };

        let object: serde_json::Value = serde_json::from_slice(&input[..end])
            .map_err(|e| WirechainError::corrupt(format!("invalid object document: {e}")))?;
        Ok(Extract::one(end + SENTINEL.len(), object))
    }
}
