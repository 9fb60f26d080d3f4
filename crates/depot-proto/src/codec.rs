//! Frame encoding and decoding.
//!
//! A frame header is read in full before any of its body, so handlers
//! decide where the body goes (disk, discard) before consuming it. Bodies
//! stream through a caller-owned scratch buffer; nothing here allocates per
//! chunk.

use depot_types::StreamHasher;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::error::ProtoError;

/// Maximum accepted meta length: 1 MB. Meta is a small JSON record.
pub const MAX_META_SIZE: u64 = 1024 * 1024;

/// Size of the scratch buffer used to stream bodies.
pub const BODY_BUFFER_SIZE: usize = 32 * 1024;

/// A decoded frame header. The body, if any, is still on the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    /// Raw operation code.
    pub operation: u16,
    /// JSON meta text.
    pub meta: String,
    /// Declared length of the trailing body.
    pub body_size: u64,
}

impl FrameHeader {
    /// Decode the meta JSON into a typed record.
    pub fn decode_meta<T: DeserializeOwned>(&self) -> Result<T, ProtoError> {
        Ok(serde_json::from_str(&self.meta)?)
    }
}

/// Read the next frame header.
///
/// Returns `Ok(None)` on a clean end-of-stream: the peer closed before the
/// first byte of a frame, or sent a frame with empty meta. A stream that ends
/// partway through a header is [`ProtoError::Truncated`].
pub async fn read_frame<R>(conn: &mut R) -> Result<Option<FrameHeader>, ProtoError>
where
    R: AsyncRead + Unpin,
{
    let mut op_buf = [0u8; 2];
    let first = conn.read(&mut op_buf).await?;
    if first == 0 {
        return Ok(None);
    }
    if first < op_buf.len() {
        read_header_exact(conn, &mut op_buf[first..]).await?;
    }
    let operation = u16::from_be_bytes(op_buf);

    let meta_len = read_u64(conn).await?;
    if meta_len > MAX_META_SIZE {
        return Err(ProtoError::MetaTooLarge {
            len: meta_len,
            max: MAX_META_SIZE,
        });
    }
    let mut meta = vec![0u8; meta_len as usize];
    read_header_exact(conn, &mut meta).await?;
    let meta = String::from_utf8(meta).map_err(|_| ProtoError::InvalidUtf8)?;

    let body_size = read_u64(conn).await?;

    if meta.is_empty() {
        trace!(operation, "empty meta, treating as end of stream");
        return Ok(None);
    }

    Ok(Some(FrameHeader {
        operation,
        meta,
        body_size,
    }))
}

/// Serialize `meta` to JSON and write a frame header announcing `body_size`
/// trailing bytes. The caller streams the body afterwards.
pub async fn write_frame<W, T>(
    operation: u16,
    conn: &mut W,
    meta: &T,
    body_size: u64,
) -> Result<(), ProtoError>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let meta = serde_json::to_vec(meta)?;
    let mut header = Vec::with_capacity(2 + 8 + meta.len() + 8);
    header.extend_from_slice(&operation.to_be_bytes());
    header.extend_from_slice(&(meta.len() as u64).to_be_bytes());
    header.extend_from_slice(&meta);
    header.extend_from_slice(&body_size.to_be_bytes());
    conn.write_all(&header).await?;
    conn.flush().await?;
    Ok(())
}

/// Stream exactly `body_size` bytes from `conn` into `sink`.
///
/// Bytes move in chunks of at most `buf.len()`; every chunk is also fed to
/// `hasher` when one is given. Ending early is [`ProtoError::Truncated`].
pub async fn read_body<R, W>(
    body_size: u64,
    buf: &mut [u8],
    conn: &mut R,
    sink: &mut W,
    mut hasher: Option<&mut StreamHasher>,
) -> Result<(), ProtoError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut remaining = body_size;
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let n = conn.read(&mut buf[..want]).await?;
        if n == 0 {
            return Err(ProtoError::Truncated {
                expected: body_size,
                received: body_size - remaining,
            });
        }
        if let Some(h) = hasher.as_mut() {
            h.update(&buf[..n]);
        }
        sink.write_all(&buf[..n]).await?;
        remaining -= n as u64;
    }
    sink.flush().await?;
    Ok(())
}

/// Stream exactly `size` bytes from `source` to `conn`, e.g. a file body
/// after its response frame.
pub async fn copy_body<R, W>(
    source: &mut R,
    size: u64,
    buf: &mut [u8],
    conn: &mut W,
) -> Result<(), ProtoError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    read_body(size, buf, source, conn, None).await
}

/// Discard a body nobody wants, keeping the stream aligned on frame
/// boundaries.
pub async fn skip_body<R>(conn: &mut R, body_size: u64, buf: &mut [u8]) -> Result<(), ProtoError>
where
    R: AsyncRead + Unpin,
{
    read_body(body_size, buf, conn, &mut tokio::io::sink(), None).await
}

async fn read_u64<R>(conn: &mut R) -> Result<u64, ProtoError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 8];
    read_header_exact(conn, &mut buf).await?;
    Ok(u64::from_be_bytes(buf))
}

async fn read_header_exact<R>(conn: &mut R, buf: &mut [u8]) -> Result<(), ProtoError>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = conn.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(ProtoError::Truncated {
                expected: buf.len() as u64,
                received: filled as u64,
            });
        }
        filled += n;
    }
    Ok(())
}
