//! RPC call and reply records.
//!
//! Calls and replies travel as object messages, so any chain whose
//! innermost stage carries objects (MessagePack, sentinel text, ...) can
//! move them.
//!
//! # Example
//!
//! ```
//! use wirechain::rpc::{RpcCall, RpcReply};
//!
//! let call = RpcCall::new("math", "add").arg(&1).unwrap().arg(&2).unwrap();
//! assert_eq!(call.arguments.len(), 2);
//!
//! let reply = RpcReply::error("no such method: math.mul");
//! assert!(reply.into_result().is_err());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, WirechainError};
use crate::protocol::Message;

/// A remote method invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcCall {
    /// Namespace the method lives in, empty for the default one.
    #[serde(default)]
    pub namespace: String,
    pub method: String,
    #[serde(default)]
    pub arguments: Vec<Value>,
    /// Caller-chosen identifier, carried through to the peer's logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl RpcCall {
    pub fn new(namespace: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            method: method.into(),
            arguments: Vec::new(),
            token: None,
        }
    }

    /// Append one serialized argument.
    pub fn arg<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        self.arguments.push(serde_json::to_value(value)?);
        Ok(self)
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// `namespace.method`, or just `method` in the default namespace.
    pub fn qualified_name(&self) -> String {
        if self.namespace.is_empty() {
            self.method.clone()
        } else {
            format!("{}.{}", self.namespace, self.method)
        }
    }

    /// Deserialize argument `index`.
    pub fn argument<T: serde::de::DeserializeOwned>(&self, index: usize) -> Result<T> {
        let value = self.arguments.get(index).cloned().ok_or_else(|| {
            WirechainError::Remote(format!(
                "{} takes at least {} arguments",
                self.qualified_name(),
                index + 1
            ))
        })?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_message(&self) -> Result<Message> {
        Message::object(self)
    }

    pub fn from_message(message: &Message) -> Result<Self> {
        message.deserialize()
    }
}

/// Answer to an [`RpcCall`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RpcReply {
    Ok(Value),
    Error(String),
}

impl RpcReply {
    pub fn ok<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(RpcReply::Ok(serde_json::to_value(value)?))
    }

    pub fn error(message: impl Into<String>) -> Self {
        RpcReply::Error(message.into())
    }

    /// The returned value, or `WirechainError::Remote` for an error reply.
    pub fn into_result(self) -> Result<Value> {
        match self {
            RpcReply::Ok(value) => Ok(value),
            RpcReply::Error(message) => Err(WirechainError::Remote(message)),
        }
    }

    pub fn to_message(&self) -> Result<Message> {
        Message::object(self)
    }

    pub fn from_message(message: &Message) -> Result<Self> {
        message.deserialize()
    }
}
