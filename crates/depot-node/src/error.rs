//! Error types for the node.

use depot_proto::ProtoError;
use depot_store::StoreError;
use depot_types::Status;

/// Errors that can occur while serving connections or talking to trackers.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// Framing failed; the connection is unusable.
    #[error("protocol error: {0}")]
    Proto(#[from] ProtoError),

    /// The blob store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Socket-level failure (bind, dial).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer sent meta that could not be decoded or validated.
    ///
    /// A bad-request response has already been written.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The tracker answered the registration with a failure status.
    #[error("registration rejected: {status}")]
    Rejected {
        /// Status returned by the tracker.
        status: Status,
        /// Optional detail returned by the tracker.
        message: Option<String>,
    },

    /// The tracker answered with something other than a response frame.
    #[error("unexpected response operation {0}")]
    UnexpectedResponse(u16),

    /// The tracker did not answer the registration in time.
    #[error("tracker did not answer within {0:?}")]
    TrackerTimeout(std::time::Duration),

    /// The tracker closed the connection.
    #[error("tracker closed the connection")]
    TrackerClosed,

    /// Catalog backend failure.
    #[error("catalog error: {0}")]
    Catalog(String),
}
