//! Operation codes and JSON meta records.
//!
//! Field names on the wire are camelCase (`instanceId`, `fileSize`, ...).

use depot_types::Status;
use serde::{Deserialize, Serialize};

/// Protocol operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Operation {
    /// Storage registers with a tracker (storage -> tracker).
    Register = 0,
    /// Client uploads a file body (client -> storage).
    Upload = 2,
    /// Response carrying [`FileResponse`] or [`RegisterStorageResponse`].
    Response = 4,
    /// Client asks whether a hash is stored (client -> storage).
    Query = 5,
    /// Client downloads a file by path (client -> storage).
    Download = 6,
}

impl Operation {
    /// Numeric wire code.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Look up a known operation by wire code.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::Register),
            2 => Some(Self::Upload),
            4 => Some(Self::Response),
            5 => Some(Self::Query),
            6 => Some(Self::Download),
            _ => None,
        }
    }
}

/// Meta of an [`Operation::Register`] frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterStorageRequest {
    /// Shared cluster secret.
    pub secret: String,
    /// Storage group this node belongs to.
    pub group: String,
    /// Unique instance id of this node.
    pub instance_id: String,
    /// Address clients should use to reach this node.
    pub bind_addr: String,
    /// Upload port of this node.
    pub port: u16,
}

/// Tracker answer to a registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterStorageResponse {
    /// Outcome of the registration.
    pub status: Status,
    /// Optional human-readable detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Meta of an [`Operation::Query`] frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFileRequest {
    /// Hex content hash to look up.
    pub md5: String,
}

/// Meta of an [`Operation::Download`] frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadFileRequest {
    /// Download path, `/<group>/<segment>/<hash>`.
    pub path: String,
}

/// Meta of an [`Operation::Response`] frame answering upload, query or download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResponse {
    /// Outcome of the request.
    pub status: Status,
    /// Download path of an uploaded file; empty otherwise.
    #[serde(default)]
    pub path: String,
    /// Whether the file exists on this node.
    pub exist: bool,
    /// Size in bytes when a file body follows or was stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

impl FileResponse {
    /// `status` with `exist = false` and no path.
    pub fn missing(status: Status) -> Self {
        Self {
            status,
            path: String::new(),
            exist: false,
            file_size: None,
        }
    }

    /// Successful existence answer.
    pub fn found(exist: bool) -> Self {
        Self {
            exist,
            ..Self::missing(Status::Ok)
        }
    }
}
