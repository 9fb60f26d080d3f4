//! Per-connection frame loop.
//!
//! A connection is owned by one task for its whole life. Frames are handled
//! strictly in arrival order: read a header, route it by operation code, run
//! the handler to completion, repeat. End-of-stream closes the connection
//! normally; any error closes it after being logged.

use std::net::SocketAddr;
use std::sync::Arc;

use depot_proto::codec;
use depot_proto::{BODY_BUFFER_SIZE, Operation};
use depot_types::StreamHasher;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::context::NodeContext;
use crate::error::NodeError;
use crate::handlers;

/// Per-connection upload state: the running digest and the scratch buffer
/// every body passes through.
pub struct UploadSession {
    pub(crate) hasher: StreamHasher,
    pub(crate) buf: Box<[u8]>,
}

impl UploadSession {
    /// Fresh session with a [`BODY_BUFFER_SIZE`] buffer.
    pub fn new() -> Self {
        Self {
            hasher: StreamHasher::new(),
            buf: vec![0u8; BODY_BUFFER_SIZE].into_boxed_slice(),
        }
    }
}

impl Default for UploadSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives one connection through its frames.
pub struct Dispatcher {
    ctx: Arc<NodeContext>,
    session: UploadSession,
}

impl Dispatcher {
    /// Create a dispatcher for one connection.
    pub fn new(ctx: Arc<NodeContext>) -> Self {
        Self {
            ctx,
            session: UploadSession::new(),
        }
    }

    /// Serve frames until end-of-stream (`Ok`) or the first error.
    pub async fn run<S>(&mut self, conn: &mut S) -> Result<(), NodeError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            let Some(header) = codec::read_frame(conn).await? else {
                return Ok(());
            };

            match Operation::from_code(header.operation) {
                Some(Operation::Upload) => {
                    handlers::upload(&self.ctx, &mut self.session, &header, conn).await?;
                }
                Some(Operation::Query) => {
                    handlers::query(&self.ctx, &header, conn).await?;
                }
                Some(Operation::Download) => {
                    handlers::download(&self.ctx, &mut self.session, &header, conn).await?;
                }
                _ => {
                    debug!(
                        operation = header.operation,
                        body_size = header.body_size,
                        "ignoring unsupported operation"
                    );
                    codec::skip_body(conn, header.body_size, &mut self.session.buf).await?;
                }
            }
        }
    }
}

/// Preamble run once before any frame is read.
///
/// Rejects sockets whose peer is already gone and disables Nagle so small
/// response frames are not delayed.
pub fn check_once_on_connect(stream: &TcpStream) -> std::io::Result<SocketAddr> {
    let peer = stream.peer_addr()?;
    stream.set_nodelay(true)?;
    Ok(peer)
}

/// Own an admitted connection until it closes.
pub async fn handle_connection(ctx: Arc<NodeContext>, mut stream: TcpStream) {
    let peer = match check_once_on_connect(&stream) {
        Ok(peer) => peer,
        Err(e) => {
            warn!(%e, "rejecting connection at preamble");
            return;
        }
    };
    debug!(%peer, "connection opened");

    let mut dispatcher = Dispatcher::new(ctx);
    match dispatcher.run(&mut stream).await {
        Ok(()) => debug!(%peer, "connection closed by peer"),
        Err(e) => warn!(%peer, %e, "closing connection"),
    }
}
