//! Content-addressed file storage for Depot.
//!
//! [`FileStore`] maps a [`FileHash`](depot_types::FileHash) to a
//! deterministic path with a 2-level fan-out directory layout and provides
//! the existence, open and streamed-write primitives used by the node.

mod error;
mod file_store;

pub use error::StoreError;
pub use file_store::{FileStore, PendingBlob};
