use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::binary::StructInstance;
use crate::error::{Result, WirechainError};

/// A unit passed between protocol stages.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Raw bytes.
    Bytes(Bytes),
    /// A structured object.
    Object(serde_json::Value),
    /// A decoded binary struct.
    Record(StructInstance),
}

impl Message {
    /// Serialize any value into an object message.
    pub fn object<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Message::Object(serde_json::to_value(value)?))
    }

    /// Deserialize an object message into `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        match self {
            Message::Object(value) => Ok(T::deserialize(value)?),
            other => Err(WirechainError::corrupt(format!(
                "cannot deserialize a {} message",
                other.kind()
            ))),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Message::Bytes(_) => "bytes",
            Message::Object(_) => "object",
            Message::Record(_) => "record",
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Message::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&serde_json::Value> {
        match self {
            Message::Object(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&StructInstance> {
        match self {
            Message::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Take the bytes, or fail with a protocol error naming `stage`.
    pub fn into_bytes(self, stage: &str) -> Result<Bytes> {
        match self {
            Message::Bytes(b) => Ok(b),
            other => Err(mismatch(stage, "bytes", &other)),
        }
    }

    pub fn into_object(self, stage: &str) -> Result<serde_json::Value> {
        match self {
            Message::Object(v) => Ok(v),
            other => Err(mismatch(stage, "an object", &other)),
        }
    }

    pub fn into_record(self, stage: &str) -> Result<StructInstance> {
        match self {
            Message::Record(r) => Ok(r),
            other => Err(mismatch(stage, "a record", &other)),
        }
    }
}

fn mismatch(stage: &str, expected: &str, got: &Message) -> WirechainError {
    WirechainError::Protocol(format!(
        "{stage} expects {expected}, got a {} message",
        got.kind()
    ))
}

impl From<Bytes> for Message {
    fn from(b: Bytes) -> Self {
        Message::Bytes(b)
    }
}

impl From<Vec<u8>> for Message {
    fn from(b: Vec<u8>) -> Self {
        Message::Bytes(Bytes::from(b))
    }
}

impl From<&'static [u8]> for Message {
    fn from(b: &'static [u8]) -> Self {
        Message::Bytes(Bytes::from_static(b))
    }
}

impl From<&'static str> for Message {
    fn from(s: &'static str) -> Self {
        Message::Bytes(Bytes::from_static(s.as_bytes()))
    }
}

impl From<serde_json::Value> for Message {
    fn from(v: serde_json::Value) -> Self {
        Message::Object(v)
    }
}

impl From<StructInstance> for Message {
    fn from(r: StructInstance) -> Self {
        Message::Record(r)
    }
}
