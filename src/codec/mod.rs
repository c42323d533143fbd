//! Codec module - serde serialization for object payloads.
//!
//! - [`MsgPackCodec`] - MessagePack using `rmp-serde` (`to_vec_named`)
//!
//! Codecs are marker structs with static methods rather than trait objects;
//! protocol stages call them directly.

mod msgpack;

pub use msgpack::MsgPackCodec;
