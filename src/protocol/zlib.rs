//! Stateful deflate compression.
//!
//! One zlib stream runs for the life of the connection in each direction.
//! Every outgoing message is sync-flushed, so the bytes of one frame always
//! inflate to the complete message. Stack this stage inside a framing stage
//! such as [`SizedProtocol`](super::SizedProtocol) so each decode sees one
//! whole frame.

use bytes::Bytes;
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use super::{Extract, Message, Protocol};
use crate::error::{Result, WirechainError};

/// Output growth step for the deflate and inflate loops.
const CHUNK: usize = 4096;

/// Compresses outgoing and inflates incoming byte messages.
pub struct ZlibProtocol {
    level: Compression,
    deflate: Compress,
    inflate: Decompress,
}

impl ZlibProtocol {
    pub fn new() -> Self {
        Self::with_level(Compression::default().level())
    }

    /// Compression level from 0 (store) to 9 (best).
    pub fn with_level(level: u32) -> Self {
        let level = Compression::new(level.min(9));
        Self {
            level,
            deflate: Compress::new(level, true),
            inflate: Decompress::new(true),
        }
    }
}

impl Default for ZlibProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ZlibProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZlibProtocol")
            .field("level", &self.level.level())
            .field("total_in", &self.deflate.total_in())
            .field("total_out", &self.inflate.total_out())
            .finish()
    }
}

impl Protocol for ZlibProtocol {
    fn name(&self) -> &str {
        "zlib"
    }

    fn encode(&mut self, message: Message) -> Result<Vec<Message>> {
        let input = message.into_bytes(self.name())?;
        let mut out = Vec::with_capacity(input.len() / 2 + CHUNK);
        let mut consumed = 0;

        loop {
            let before = self.deflate.total_in();
            self.deflate
                .compress_vec(&input[consumed..], &mut out, FlushCompress::Sync)
                .map_err(|e| WirechainError::Protocol(format!("deflate failed: {e}")))?;
            consumed += (self.deflate.total_in() - before) as usize;

            if consumed == input.len() && out.len() < out.capacity() {
                break;
            }
            out.reserve(CHUNK);
        }
        Ok(vec![Message::Bytes(Bytes::from(out))])
    }

    fn decode_bytes(&mut self, input: &[u8]) -> Result<Extract> {
        if input.is_empty() {
            return Ok(Extract::Incomplete);
        }

        let mut out = Vec::with_capacity(input.len() * 2 + CHUNK);
        let mut consumed = 0;
        loop {
            let (before_in, before_out) = (self.inflate.total_in(), self.inflate.total_out());
            let status = self
                .inflate
                .decompress_vec(&input[consumed..], &mut out, FlushDecompress::Sync)
                .map_err(|e| WirechainError::corrupt(format!("inflate failed: {e}")))?;
            let read = (self.inflate.total_in() - before_in) as usize;
            let written = self.inflate.total_out() - before_out;
            consumed += read;

            if status == Status::StreamEnd {
                if consumed < input.len() {
                    return Err(WirechainError::corrupt("data after end of zlib stream"));
                }
                break;
            }
            if consumed == input.len() && out.len() < out.capacity() {
                break;
            }
            if read == 0 && written == 0 && out.len() < out.capacity() {
                return Err(WirechainError::corrupt("zlib stream stalled"));
            }
            out.reserve(CHUNK);
        }
        Ok(Extract::one(consumed, Bytes::from(out)))
    }

    fn reset(&mut self) {
        self.deflate = Compress::new(self.level, true);
        self.inflate = Decompress::new(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deflate(p: &mut ZlibProtocol, data: &'static [u8]) -> Message {
        p.encode(Message::from(data)).unwrap().remove(0)
    }

    #[test]
    fn test_roundtrip_across_messages() {
        let mut tx = ZlibProtocol::new();
        let mut rx = ZlibProtocol::new();

        for payload in [&b"hello hello hello"[..], b"", b"hello again"] {
            let frame = deflate(&mut tx, payload);
            let len = frame.as_bytes().unwrap().len();
            assert_eq!(rx.decode(frame).unwrap(), Extract::one(len, Message::from(payload)));
        }
    }

    #[test]
    fn test_context_is_shared_between_messages() {
        let mut tx = ZlibProtocol::new();
        let text = b"the same sentence, repeated to build up a dictionary";
        let first = deflate(&mut tx, text).as_bytes().unwrap().len();
        let second = deflate(&mut tx, text).as_bytes().unwrap().len();
        assert!(second < first);
    }

    #[test]
    fn test_large_payload() {
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let mut tx = ZlibProtocol::with_level(1);
        let mut rx = ZlibProtocol::new();
        let frame = tx.encode(Message::from(data.clone())).unwrap().remove(0);
        match rx.decode(frame).unwrap() {
            Extract::Yield { messages, .. } => assert_eq!(messages, vec![Message::from(data)]),
            Extract::Incomplete => panic!("frame is complete"),
        }
    }

    #[test]
    fn test_reset_starts_a_new_stream() {
        let mut tx = ZlibProtocol::new();
        let mut rx = ZlibProtocol::new();
        rx.decode(deflate(&mut tx, b"one")).unwrap();

        tx.reset();
        rx.reset();
        let frame = deflate(&mut tx, b"two");
        assert_eq!(frame.as_bytes().unwrap()[0], 0x78);
        assert!(matches!(rx.decode(frame).unwrap(), Extract::Yield { .. }));
    }

    #[test]
    fn test_garbage_is_corrupt() {
        let mut rx = ZlibProtocol::new();
        assert!(rx.decode(Message::from("not zlib")).unwrap_err().is_corrupt());
    }
}
