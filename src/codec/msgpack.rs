//! MsgPack codec using `rmp-serde`.
//!
//! Structs are always written with `to_vec_named`, so they travel as maps
//! keyed by field name rather than positional arrays. Peers that decode into
//! dynamic objects (including [`Message::Object`](crate::protocol::Message))
//! rely on this.
//!
//! # Example
//!
//! ```
//! use wirechain::codec::MsgPackCodec;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Call {
//!     method: String,
//!     seq: u32,
//! }
//!
//! let call = Call { method: "ping".to_string(), seq: 1 };
//! let encoded = MsgPackCodec::encode(&call).unwrap();
//! let (decoded, used): (Call, usize) = MsgPackCodec::decode_prefix(&encoded).unwrap().unwrap();
//! assert_eq!(decoded, call);
//! assert_eq!(used, encoded.len());
//! ```

use std::io::{Cursor, ErrorKind};

use serde::de::DeserializeOwned;

use crate::error::Result;

/// MessagePack codec for structured data.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes, structs as maps.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode one value from the front of `bytes`.
    ///
    /// Returns `Ok(None)` when `bytes` ends before the value does, otherwise
    /// the value and the number of bytes it occupied.
    ///
    /// # Errors
    ///
    /// Returns error if the leading bytes cannot be deserialized to type T.
    pub fn decode_prefix<T: DeserializeOwned>(bytes: &[u8]) -> Result<Option<(T, usize)>> {
        use rmp_serde::decode::Error;

        let mut cursor = Cursor::new(bytes);
        match rmp_serde::decode::from_read(&mut cursor) {
            Ok(value) => Ok(Some((value, cursor.position() as usize))),
            Err(Error::InvalidMarkerRead(e) | Error::InvalidDataRead(e))
                if e.kind() == ErrorKind::UnexpectedEof =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
