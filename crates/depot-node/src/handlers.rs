//! Upload, query and download handlers.
//!
//! Each handler consumes one frame whose header has already been read and
//! writes exactly one response frame (plus the file body for a successful
//! download). An `Err` return means the connection must be closed.

use depot_proto::codec::{self, FrameHeader};
use depot_proto::{
    DownloadFileRequest, DownloadPath, FileResponse, Operation, QueryFileRequest,
};
use depot_store::StoreError;
use depot_types::{FileHash, Status};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::context::NodeContext;
use crate::dispatcher::UploadSession;
use crate::error::NodeError;

/// Write a response frame with no body.
async fn respond<S>(conn: &mut S, response: &FileResponse) -> Result<(), NodeError>
where
    S: AsyncWrite + Unpin,
{
    codec::write_frame(Operation::Response.code(), conn, response, 0).await?;
    Ok(())
}

/// Answer with a bad-request response and fail, closing the connection.
async fn reject<S>(conn: &mut S, reason: String) -> Result<(), NodeError>
where
    S: AsyncWrite + Unpin,
{
    respond(conn, &FileResponse::missing(Status::BadRequest)).await?;
    Err(NodeError::BadRequest(reason))
}

/// Operation 2: stream the body to disk while hashing it, then commit it
/// under its digest.
///
/// The whole body is always read, even when the digest turns out to be
/// stored already.
pub(crate) async fn upload<S>(
    ctx: &NodeContext,
    session: &mut UploadSession,
    header: &FrameHeader,
    conn: &mut S,
) -> Result<(), NodeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    info!(size_kb = header.body_size / 1024, "receiving upload");

    let mut pending = ctx.store().begin_write().await?;
    let received = codec::read_body(
        header.body_size,
        &mut session.buf,
        conn,
        pending.file_mut(),
        Some(&mut session.hasher),
    )
    .await;
    if let Err(e) = received {
        session.hasher.finalize_reset();
        pending.discard().await;
        return Err(e.into());
    }

    let hash = session.hasher.finalize_reset();
    pending.commit(&hash).await?;

    let config = ctx.config();
    let path = DownloadPath::new(&config.group, &config.instance_id, hash)
        .map(|p| p.to_string())
        .unwrap_or_default();
    info!(%hash, size = header.body_size, "stored upload");

    respond(
        conn,
        &FileResponse {
            status: Status::Ok,
            path,
            exist: true,
            file_size: Some(header.body_size),
        },
    )
    .await
}

/// Operation 5: report whether a hash is stored.
pub(crate) async fn query<S>(
    ctx: &NodeContext,
    header: &FrameHeader,
    conn: &mut S,
) -> Result<(), NodeError>
where
    S: AsyncWrite + Unpin,
{
    let request: QueryFileRequest = match header.decode_meta() {
        Ok(r) => r,
        Err(e) => return reject(conn, format!("query meta: {e}")).await,
    };
    let hash: FileHash = match request.md5.parse() {
        Ok(h) => h,
        Err(e) => return reject(conn, e.to_string()).await,
    };

    let response = match ctx.store().exists(&hash).await {
        Ok(exist) => FileResponse::found(exist),
        Err(e) => {
            warn!(%hash, %e, "existence check failed");
            FileResponse::missing(Status::InternalError)
        }
    };
    debug!(%hash, exist = response.exist, "query");
    respond(conn, &response).await
}

/// Operation 6: stream a stored file back, preceded by a response frame
/// whose body length is the file size.
pub(crate) async fn download<S>(
    ctx: &NodeContext,
    session: &mut UploadSession,
    header: &FrameHeader,
    conn: &mut S,
) -> Result<(), NodeError>
where
    S: AsyncWrite + Unpin,
{
    let request: DownloadFileRequest = match header.decode_meta() {
        Ok(r) => r,
        Err(e) => return reject(conn, format!("download meta: {e}")).await,
    };

    let Some(path) = DownloadPath::parse(&request.path) else {
        debug!(path = %request.path, "download path does not match");
        return respond(conn, &FileResponse::found(false)).await;
    };
    let hash = path.hash();

    let (mut file, size) = match ctx.store().open(&hash).await {
        Ok(opened) => opened,
        Err(StoreError::NotFound(_)) => {
            debug!(%hash, "download of missing file");
            return respond(conn, &FileResponse::found(false)).await;
        }
        Err(e) => {
            warn!(%hash, %e, "failed to open stored file");
            return respond(conn, &FileResponse::missing(Status::InternalError)).await;
        }
    };

    let response = FileResponse {
        file_size: Some(size),
        ..FileResponse::found(true)
    };
    codec::write_frame(Operation::Response.code(), conn, &response, size).await?;
    codec::copy_body(&mut file, size, &mut session.buf, conn).await?;
    debug!(%hash, size, "download complete");
    Ok(())
}
