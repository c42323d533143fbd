use bytes::Bytes;

use super::{Extract, Message, Protocol};
use crate::codec::MsgPackCodec;
use crate::error::{Result, WirechainError};

/// MessagePack bin8, bin16 and bin32 markers.
const BIN_MARKERS: std::ops::RangeInclusive<u8> = 0xc4..=0xc6;

/// Serializes objects (and raw byte messages) as MessagePack.
///
/// The encoding is self-delimiting, so this stage can sit directly on the
/// stream or inside a framing stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackProtocol;

impl MsgPackProtocol {
    pub fn new() -> Self {
        Self
    }
}

impl Protocol for MsgPackProtocol {
    fn name(&self) -> &str {
        "msgpack"
    }

    fn encode(&mut self, message: Message) -> Result<Vec<Message>> {
        let encoded = match &message {
            Message::Object(value) => MsgPackCodec::encode(value)?,
            Message::Bytes(bytes) => MsgPackCodec::encode(&serde_bytes::Bytes::new(bytes))?,
            Message::Record(_) => {
                return Err(WirechainError::Protocol(format!(
                    "{} cannot serialize a record message",
                    self.name()
                )))
            }
        };
        Ok(vec![Message::Bytes(Bytes::from(encoded))])
    }

    fn decode_bytes(&mut self, input: &[u8]) -> Result<Extract> {
        let Some(marker) = input.first() else {
            return Ok(Extract::Incomplete);
        };

        let decoded = if BIN_MARKERS.contains(marker) {
            MsgPackCodec::decode_prefix::<serde_bytes::ByteBuf>(input)
                .map_err(into_corrupt)?
                .map(|(buf, used)| (Message::Bytes(Bytes::from(buf.into_vec())), used))
        } else {
            MsgPackCodec::decode_prefix::<serde_json::Value>(input)
                .map_err(into_corrupt)?
                .map(|(value, used)| (Message::Object(value), used))
        };

        Ok(match decoded {
            Some((message, used)) => Extract::one(used, message),
            None => Extract::Incomplete,
        })
    }
}

fn into_corrupt(e: WirechainError) -> WirechainError {
    match e {
        WirechainError::MsgPackDecode(e) => WirechainError::corrupt(e.to_string()),
        other => other,
    }
}
