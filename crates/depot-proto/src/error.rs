//! Error types for framing operations.

/// Errors raised while reading or writing frames.
///
/// Every variant is fatal for the connection it occurred on.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    /// Socket or file I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before a declared length was satisfied.
    #[error("truncated frame: expected {expected} bytes, received {received}")]
    Truncated {
        /// Bytes the frame declared.
        expected: u64,
        /// Bytes actually received before end-of-stream.
        received: u64,
    },

    /// The declared meta length exceeds [`MAX_META_SIZE`](crate::MAX_META_SIZE).
    #[error("meta too large: {len} bytes (max {max})")]
    MetaTooLarge {
        /// Declared length.
        len: u64,
        /// Configured maximum.
        max: u64,
    },

    /// Meta bytes are not valid UTF-8.
    #[error("meta is not valid utf-8")]
    InvalidUtf8,

    /// Meta could not be encoded or decoded as JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
