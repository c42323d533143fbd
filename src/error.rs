//! Error types for wirechain.

use thiserror::Error;

/// Main error type for all wirechain operations.
#[derive(Debug, Error)]
pub enum WirechainError {
    /// I/O error on the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Not enough bytes yet. Recoverable: supply more input and retry.
    #[error("needs more data: {0}")]
    Incomplete(String),

    /// The bytes can never form a valid unit. Fatal for the connection.
    #[error("stream corrupt: {0}")]
    Corrupt(String),

    /// Schema misdeclaration, raised while building descriptors.
    #[error("setup error: {0}")]
    Setup(String),

    /// A protocol stage broke the chain contract (bad consumed count, zero yield, ...).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No field or virtual with this name.
    #[error("no such field: {0}")]
    UnknownField(String),

    /// Virtual fields are computed and cannot be assigned.
    #[error("field is read-only: {0}")]
    ReadOnlyField(String),

    /// The peer answered an RPC call with an error.
    #[error("remote error: {0}")]
    Remote(String),

    /// Connection closed by the peer.
    #[error("Connection closed")]
    ConnectionClosed,
}

impl WirechainError {
    /// Shorthand for an [`Incomplete`](Self::Incomplete) error.
    pub fn incomplete(msg: impl Into<String>) -> Self {
        Self::Incomplete(msg.into())
    }

    /// Shorthand for a [`Corrupt`](Self::Corrupt) error.
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }

    /// Shorthand for a [`Setup`](Self::Setup) error.
    pub fn setup(msg: impl Into<String>) -> Self {
        Self::Setup(msg.into())
    }

    /// True when more input could turn this failure into a success.
    #[inline]
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Incomplete(_))
    }

    /// True when the stream cannot be recovered.
    #[inline]
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt(_))
    }

    /// Prefix the message of decode-path errors with a location, e.g. `Header.length`.
    pub fn at(self, location: &str) -> Self {
        match self {
            Self::Incomplete(msg) => Self::Incomplete(format!("{location}: {msg}")),
            Self::Corrupt(msg) => Self::Corrupt(format!("{location}: {msg}")),
            Self::Setup(msg) => Self::Setup(format!("{location}: {msg}")),
            other => other,
        }
    }
}

/// Result type alias using WirechainError.
pub type Result<T> = std::result::Result<T, WirechainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(WirechainError::incomplete("x").is_incomplete());
        assert!(!WirechainError::incomplete("x").is_corrupt());
        assert!(WirechainError::corrupt("x").is_corrupt());
        assert!(!WirechainError::ConnectionClosed.is_incomplete());
    }

    #[test]
    fn test_at_prefixes_location() {
        let err = WirechainError::corrupt("bad magic").at("Header.magic");
        assert_eq!(err.to_string(), "stream corrupt: Header.magic: bad magic");

        let err = WirechainError::ConnectionClosed.at("ignored");
        assert!(matches!(err, WirechainError::ConnectionClosed));
    }
}
