//! Error types for blob storage operations.

use depot_types::FileHash;

/// Errors that can occur during blob storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No blob is stored under the requested hash.
    #[error("blob not found: {0}")]
    NotFound(FileHash),

    /// Something other than a regular file sits at the blob's path.
    #[error("not a regular file: {0}")]
    NotAFile(FileHash),

    /// An I/O error occurred.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
