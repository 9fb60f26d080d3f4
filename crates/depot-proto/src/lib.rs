//! Wire protocol for Depot.
//!
//! Every message on the upload port is one frame:
//!
//! ```text
//! [operation: u16 BE][meta_len: u64 BE][meta: JSON][body_len: u64 BE][body]
//! ```
//!
//! - [`codec`]: frame header read/write and bounded-buffer body streaming.
//! - [`message`]: operation codes and the JSON meta records.
//! - [`DownloadPath`]: the `/<group>/<segment>/<hash>` download path form.

pub mod codec;
mod error;
pub mod message;
mod path;

pub use codec::{BODY_BUFFER_SIZE, FrameHeader, MAX_META_SIZE};
pub use error::ProtoError;
pub use message::{
    DownloadFileRequest, FileResponse, Operation, QueryFileRequest, RegisterStorageRequest,
    RegisterStorageResponse,
};
pub use path::DownloadPath;
