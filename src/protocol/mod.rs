//! Protocol stages - one framing or encoding layer each.
//!
//! A [`Protocol`] turns one outgoing [`Message`] into one or more frames and
//! extracts units from incoming data. Stages are stacked by a
//! [`ProtocolChain`](crate::ProtocolChain):
//!
//! - [`SizedProtocol`] - 8-byte little-endian length prefix
//! - [`SeparatorProtocol`] - delimiter-terminated frames
//! - [`ShellwordsProtocol`] - shell-escaped argument lines
//! - [`TextObjectProtocol`] - JSON text terminated by a `...` line
//! - [`MsgPackProtocol`] - MessagePack objects
//! - [`ZlibProtocol`] - stateful deflate stream
//! - [`StructProtocol`] - binary structs from a [`StructDescriptor`](crate::binary::StructDescriptor)
//!
//! Protocols that merge fragments keep them in a [`Reassembler`].

mod message;
mod msgpack;
mod reassembler;
mod separator;
mod shellwords;
mod sized;
mod structure;
mod text;
mod zlib;

pub use message::Message;
pub use msgpack::MsgPackProtocol;
pub use reassembler::Reassembler;
pub use separator::SeparatorProtocol;
pub use shellwords::ShellwordsProtocol;
pub use sized::{SizedProtocol, DEFAULT_MAX_MESSAGE_SIZE, SIZE_HEADER_LEN};
pub use structure::StructProtocol;
pub use text::TextObjectProtocol;
pub use zlib::ZlibProtocol;

use bytes::Bytes;

use crate::error::Result;

/// Outcome of one decode attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Extract {
    /// One or more units, taken from the first `consumed` bytes of the input.
    Yield {
        consumed: usize,
        messages: Vec<Message>,
    },
    /// Not enough input yet.
    Incomplete,
}

impl Extract {
    /// A single unit.
    pub fn one(consumed: usize, message: impl Into<Message>) -> Self {
        Extract::Yield {
            consumed,
            messages: vec![message.into()],
        }
    }

    pub fn is_incomplete(&self) -> bool {
        matches!(self, Extract::Incomplete)
    }
}

/// One stage of a protocol chain.
///
/// The outermost stage decodes straight from the chain's buffer through
/// [`decode_bytes`](Protocol::decode_bytes); inner stages receive whole
/// messages from the stage outside them through [`decode`](Protocol::decode).
/// Each method defaults to the other, so a stage overrides at least one.
/// Returning `Err(WirechainError::Incomplete)` is treated the same as
/// [`Extract::Incomplete`].
pub trait Protocol: Send {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Frame an outgoing message. Defaults to passing it through unchanged.
    fn encode(&mut self, message: Message) -> Result<Vec<Message>> {
        Ok(vec![message])
    }

    /// Extract units from the front of `input`.
    fn decode(&mut self, input: Message) -> Result<Extract> {
        let input = input.into_bytes(self.name())?;
        self.decode_bytes(&input)
    }

    /// Extract units from the front of a borrowed buffer.
    ///
    /// Implementations copy out only the bytes they yield; the caller drops
    /// the consumed prefix afterwards.
    fn decode_bytes(&mut self, input: &[u8]) -> Result<Extract> {
        self.decode(Message::Bytes(Bytes::copy_from_slice(input)))
    }

    /// Drop per-connection state.
    fn reset(&mut self) {}
}

impl<P: Protocol + ?Sized> Protocol for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn encode(&mut self, message: Message) -> Result<Vec<Message>> {
        (**self).encode(message)
    }

    fn decode(&mut self, input: Message) -> Result<Extract> {
        (**self).decode(input)
    }

    fn decode_bytes(&mut self, input: &[u8]) -> Result<Extract> {
        (**self).decode_bytes(input)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}
