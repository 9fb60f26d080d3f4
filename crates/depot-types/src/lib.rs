//! Shared types for Depot.
//!
//! This crate defines the identifiers and small value types used across the
//! Depot workspace:
//!
//! - [`FileHash`]: MD5 content identifier of a stored blob.
//! - [`StreamHasher`]: incremental MD5 accumulator fed chunk by chunk.
//! - [`Status`]: response status codes carried in protocol meta.

use std::fmt;
use std::str::FromStr;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

/// Length of the hex form of a [`FileHash`].
pub const HASH_HEX_LEN: usize = 32;

// ---------------------------------------------------------------------------
// FileHash
// ---------------------------------------------------------------------------

/// Content-addressed identifier for a stored file: `md5(file_bytes)`.
///
/// The canonical text form is 32 lowercase hex characters. Parsing accepts
/// either case; [`fmt::Display`] always renders lowercase, so every path
/// derived from a hash uses the same spelling.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct FileHash([u8; 16]);

impl FileHash {
    /// Hash a complete byte slice.
    pub fn from_data(data: &[u8]) -> Self {
        Self::from_digest(&Md5::digest(data))
    }

    fn from_digest(digest: &[u8]) -> Self {
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(digest);
        Self(bytes)
    }

    /// Canonical lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for FileHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for FileHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileHash({self})")
    }
}

/// A string that is not exactly 32 hex characters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid file hash {0:?}: expected 32 hex characters")]
pub struct InvalidHash(pub String);

impl FromStr for FileHash {
    type Err = InvalidHash;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != HASH_HEX_LEN {
            return Err(InvalidHash(s.to_string()));
        }
        let mut bytes = [0u8; 16];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| InvalidHash(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for FileHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FileHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// StreamHasher
// ---------------------------------------------------------------------------

/// Incremental MD5 accumulator.
///
/// Upload bodies are fed through [`update`](Self::update) as they arrive off
/// the wire, so the whole body is never held in memory.
#[derive(Clone, Default)]
pub struct StreamHasher {
    inner: Md5,
    fed: u64,
}

impl StreamHasher {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk of bytes.
    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
        self.fed += chunk.len() as u64;
    }

    /// Number of bytes fed since the last reset.
    pub fn bytes_fed(&self) -> u64 {
        self.fed
    }

    /// Produce the digest and reset the accumulator for the next body.
    pub fn finalize_reset(&mut self) -> FileHash {
        self.fed = 0;
        FileHash::from_digest(&self.inner.finalize_reset())
    }
}

impl fmt::Debug for StreamHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHasher")
            .field("fed", &self.fed)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Status code carried in response meta.
///
/// Serialized as a bare integer. Unknown codes round-trip through
/// [`Status::Other`] and count as failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum Status {
    /// The request succeeded.
    Ok,
    /// The request meta could not be decoded or was invalid.
    BadRequest,
    /// The node failed while serving a well-formed request.
    InternalError,
    /// Any other code sent by a peer.
    Other(u8),
}

impl Status {
    /// Whether this status means success.
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}

impl From<u8> for Status {
    fn from(code: u8) -> Self {
        match code {
            0 => Status::Ok,
            3 => Status::BadRequest,
            4 => Status::InternalError,
            n => Status::Other(n),
        }
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> Self {
        match status {
            Status::Ok => 0,
            Status::BadRequest => 3,
            Status::InternalError => 4,
            Status::Other(n) => n,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => f.write_str("ok"),
            Status::BadRequest => f.write_str("bad request"),
            Status::InternalError => f.write_str("internal error"),
            Status::Other(n) => write!(f, "status {n}"),
        }
    }
}
