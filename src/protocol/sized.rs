//! Length-prefixed framing.
//!
//! Frame layout:
//!
//! ```text
//! +--------------------------+------------------+
//! | length (u64 LE, 8 bytes) | payload (length) |
//! +--------------------------+------------------+
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{Extract, Message, Protocol};
use crate::error::{Result, WirechainError};

/// Size of the length header in bytes.
pub const SIZE_HEADER_LEN: usize = 8;

/// Default maximum payload size (16 MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: u64 = 16 * 1024 * 1024;

/// Frames each message with an 8-byte little-endian length.
#[derive(Debug, Clone)]
pub struct SizedProtocol {
    max_message_size: u64,
}

impl SizedProtocol {
    pub fn new() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    /// Reject frames announcing more than `max` payload bytes.
    pub fn with_max_message_size(max: u64) -> Self {
        Self {
            max_message_size: max,
        }
    }

    /// Bytes added to every frame.
    pub const fn overhead(&self) -> usize {
        SIZE_HEADER_LEN
    }

    /// End offset of the first frame in `input`, or `None` while incomplete.
    fn frame_end(&self, input: &[u8]) -> Result<Option<usize>> {
        if input.len() < SIZE_HEADER_LEN {
            return Ok(None);
        }

        let expect = (&input[..SIZE_HEADER_LEN]).get_u64_le();
        if expect > self.max_message_size {
            return Err(WirechainError::corrupt(format!(
                "frame announces {} bytes, maximum is {}",
                expect, self.max_message_size
            )));
        }

        let end = usize::try_from(expect)
            .ok()
            .and_then(|n| n.checked_add(SIZE_HEADER_LEN))
            .ok_or_else(|| {
                WirechainError::corrupt(format!("frame length {expect} does not fit in memory"))
            })?;
        Ok((input.len() >= end).then_some(end))
    }
}

impl Default for SizedProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl Protocol for SizedProtocol {
    fn name(&self) -> &str {
        "sized"
    }

    fn encode(&mut self, message: Message) -> Result<Vec<Message>> {
        let payload = message.into_bytes(self.name())?;
        if payload.len() as u64 > self.max_message_size {
            return Err(WirechainError::corrupt(format!(
                "message of {} bytes exceeds maximum {}",
                payload.len(),
                self.max_message_size
            )));
        }
        let mut frame = BytesMut::with_capacity(SIZE_HEADER_LEN + payload.len());
        frame.put_u64_le(payload.len() as u64);
        frame.put_slice(&payload);
        Ok(vec![Message::Bytes(frame.freeze())])
    }

    fn decode(&mut self, input: Message) -> Result<Extract> {
        let input = input.into_bytes(self.name())?;
        Ok(match self.frame_end(&input)? {
            Some(end) => Extract::one(end, input.slice(SIZE_HEADER_LEN..end)),
            None => Extract::Incomplete,
        })
    }

    fn decode_bytes(&mut self, input: &[u8]) -> Result<Extract> {
        Ok(match self.frame_end(input)? {
            Some(end) => Extract::one(
                end,
                Bytes::copy_from_slice(&input[SIZE_HEADER_LEN..end]),
            ),
            None => Extract::Incomplete,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(payload: &'static [u8]) -> Bytes {
        let mut p = SizedProtocol::new();
        let mut frames = p.encode(Message::from(payload)).unwrap();
        assert_eq!(frames.len(), 1);
        frames.remove(0).into_bytes("test").unwrap()
    }

    #[test]
    fn test_frame_layout() {
        let wire = frame(b"abcd");
        assert_eq!(wire.len(), 12);
        assert_eq!(&wire[..8], &4u64.to_le_bytes());
        assert_eq!(&wire[8..], b"abcd");
        assert_eq!(SizedProtocol::new().overhead(), 8);
    }

    #[test]
    fn test_decode_exact_consumed() {
        let mut wire = BytesMut::from(&frame(b"abcd")[..]);
        wire.extend_from_slice(b"trailing");
        let mut p = SizedProtocol::new();
        assert_eq!(
            p.decode(Message::Bytes(wire.freeze())).unwrap(),
            Extract::one(12, Message::from("abcd"))
        );
    }

    #[test]
    fn test_decode_incomplete_prefixes() {
        let wire = frame(b"abcd");
        let mut p = SizedProtocol::new();
        for cut in 0..wire.len() {
            assert!(p.decode(Message::Bytes(wire.slice(..cut))).unwrap().is_incomplete());
        }
    }

    #[test]
    fn test_empty_payload() {
        let wire = frame(b"");
        assert_eq!(wire.len(), 8);
        let mut p = SizedProtocol::new();
        assert_eq!(
            p.decode(Message::Bytes(wire)).unwrap(),
            Extract::one(8, Message::from(""))
        );
    }

    #[test]
    fn test_oversized_frame_is_corrupt() {
        let mut p = SizedProtocol::with_max_message_size(2);
        let err = p.decode(Message::Bytes(frame(b"abcd"))).unwrap_err();
        assert!(err.is_corrupt());
        assert!(p.encode(Message::from("abc")).unwrap_err().is_corrupt());
    }

    #[test]
    fn test_unbounded_length_is_corrupt() {
        let mut p = SizedProtocol::with_max_message_size(u64::MAX);
        let mut wire = u64::MAX.to_le_bytes().to_vec();
        wire.extend_from_slice(b"abcd");
        assert!(p.decode_bytes(&wire).unwrap_err().is_corrupt());
        assert!(p.decode(Message::from(wire)).unwrap_err().is_corrupt());
    }

    #[test]
    fn test_decode_borrowed_buffer() {
        let mut wire = frame(b"abcd").to_vec();
        wire.extend_from_slice(&frame(b"ef"));
        let mut p = SizedProtocol::new();
        assert_eq!(
            p.decode_bytes(&wire).unwrap(),
            Extract::one(12, Message::from("abcd"))
        );
        assert_eq!(
            p.decode_bytes(&wire[12..]).unwrap(),
            Extract::one(10, Message::from("ef"))
        );
        assert!(p.decode_bytes(&wire[12..17]).unwrap().is_incomplete());
    }

    #[test]
    fn test_rejects_objects() {
        let mut p = SizedProtocol::new();
        let err = p.encode(Message::Object(serde_json::json!(1))).unwrap_err();
        assert!(matches!(err, WirechainError::Protocol(_)));
    }
}
