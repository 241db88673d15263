use thiserror::Error;

/// Failures while decoding or encoding a binary envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    #[error("invalid header")]
    InvalidHeader,

    #[error("truncated or invalid utf-8 json segment: {0}")]
    TruncatedOrInvalidUtf8(String),

    #[error("json segment of {0} bytes does not fit the 32-bit length field")]
    PayloadTooLarge(usize),
}

/// Errors produced by the gapi protocol layer.
#[derive(Debug, Error)]
pub enum GapiError {
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("content error: {0}")]
    Content(String),

    #[error("not connected")]
    NotConnected,
}

impl From<serde_json::Error> for GapiError {
    fn from(e: serde_json::Error) -> Self {
        GapiError::Content(e.to_string())
    }
}

pub type GapiResult<T> = Result<T, GapiError>;
