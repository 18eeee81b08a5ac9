//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while encoding or decoding protocol values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A base-58 value in a URL could not be decoded.
    #[error("invalid base-58 in `{field}`: {reason}")]
    InvalidBase58 {
        /// Name of the offending field
        field: &'static str,
        /// Decoder message
        reason: String,
    },

    /// A stored byte list was not a comma-separated list of bytes.
    #[error("invalid stored byte list: {0}")]
    InvalidByteList(String),

    /// A decoded value had the wrong length.
    #[error("`{field}` must be {expected} bytes, got {actual}")]
    InvalidLength {
        /// Name of the offending field
        field: &'static str,
        /// Required length
        expected: usize,
        /// Received length
        actual: usize,
    },

    /// A response carried some but not all of the success parameters.
    #[error("incomplete response: missing `{0}`")]
    MissingParameter(&'static str),

    /// A decrypted payload was not the JSON we expected.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A URL could not be built or parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Unknown cluster name.
    #[error("unknown cluster `{0}`")]
    UnknownCluster(String),
}

impl From<url::ParseError> for ProtocolError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedPayload(err.to_string())
    }
}
