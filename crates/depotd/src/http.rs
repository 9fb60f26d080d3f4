//! HTTP download passthrough.
//!
//! `GET /download/{group}/{segment}/{hash}` streams a stored blob. The path
//! is validated exactly like a download frame's; anything invalid or missing
//! is a 404.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{Response, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use depot_node::NodeContext;
use depot_proto::DownloadPath;
use depot_store::StoreError;
use depot_types::FileHash;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

/// Errors returned by the download handler.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Path did not validate or the blob is absent.
    #[error("not found")]
    NotFound,

    /// The blob exists but could not be served.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Build the passthrough router.
pub fn router(ctx: Arc<NodeContext>) -> Router {
    Router::new()
        .route("/download/{group}/{segment}/{hash}", get(download))
        .with_state(ctx)
}

/// Serve the passthrough on `addr` until the process exits.
pub async fn serve(ctx: Arc<NodeContext>, addr: &str) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr, "http download passthrough listening");
    axum::serve(listener, router(ctx)).await
}

async fn download(
    State(ctx): State<Arc<NodeContext>>,
    Path((group, segment, hash)): Path<(String, String, String)>,
) -> Result<axum::response::Response, HttpError> {
    let hash: FileHash = hash.parse().map_err(|_| HttpError::NotFound)?;
    let path = DownloadPath::new(&group, &segment, hash).ok_or(HttpError::NotFound)?;

    let (file, size) = match ctx.store().open(&path.hash()).await {
        Ok(opened) => opened,
        Err(StoreError::NotFound(_)) => return Err(HttpError::NotFound),
        Err(e) => {
            warn!(%path, %e, "failed to open stored file");
            return Err(HttpError::Internal(e.to_string()));
        }
    };
    debug!(%path, size, "http download");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, size)
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| HttpError::Internal(e.to_string()))
}
