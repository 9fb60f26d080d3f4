//! Shared test harness for Depot integration tests.
//!
//! Provides [`TestNode`], a storage node serving on a loopback port with a
//! scratch store, and [`Client`], a frame-level client for it.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use depot_node::acceptor::accept_loop;
use depot_node::{NodeConfig, NodeContext};
use depot_proto::codec::{read_body, read_frame, write_frame};
use depot_proto::{FileResponse, Operation};
use depot_store::FileStore;
use serde_json::json;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// A running storage node on `127.0.0.1`.
///
/// Stops serving when dropped.
pub struct TestNode {
    ctx: Arc<NodeContext>,
    addr: SocketAddr,
    task: JoinHandle<()>,
    _dir: TempDir,
}

impl TestNode {
    /// Start a node with default settings.
    pub async fn start() -> Self {
        Self::with_config(NodeConfig {
            group: "g1".into(),
            instance_id: "node1".into(),
            ..NodeConfig::default()
        })
        .await
    }

    /// Start a node with `config`. Its bind address and port are ignored;
    /// the node listens on an ephemeral loopback port.
    pub async fn with_config(config: NodeConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let ctx = NodeContext::new(config, store);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let loop_ctx = ctx.clone();
        let task = tokio::spawn(async move {
            let _ = accept_loop(listener, loop_ctx).await;
        });

        Self {
            ctx,
            addr,
            task,
            _dir: dir,
        }
    }

    /// Upload port address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shared node context.
    pub fn ctx(&self) -> &Arc<NodeContext> {
        &self.ctx
    }

    /// Store root directory.
    pub fn base_dir(&self) -> &Path {
        self.ctx.store().base_dir()
    }

    /// Open a new client connection.
    pub async fn connect(&self) -> Client {
        Client::connect(self.addr).await
    }
}

impl Drop for TestNode {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Frame-level client for the upload port.
pub struct Client {
    conn: TcpStream,
}

impl Client {
    /// Connect to a node.
    pub async fn connect(addr: SocketAddr) -> Self {
        let conn = TcpStream::connect(addr).await.unwrap();
        conn.set_nodelay(true).unwrap();
        Self { conn }
    }

    /// Upload `data` and return the node's answer.
    pub async fn upload(&mut self, data: &[u8]) -> FileResponse {
        write_frame(Operation::Upload.code(), &mut self.conn, &json!({}), data.len() as u64)
            .await
            .unwrap();
        self.conn.write_all(data).await.unwrap();
        self.conn.flush().await.unwrap();
        self.response().await
    }

    /// Ask whether `md5` is stored.
    pub async fn query(&mut self, md5: &str) -> FileResponse {
        write_frame(Operation::Query.code(), &mut self.conn, &json!({ "md5": md5 }), 0)
            .await
            .unwrap();
        self.response().await
    }

    /// Download `path`, returning the answer and the streamed body.
    pub async fn download(&mut self, path: &str) -> (FileResponse, Vec<u8>) {
        write_frame(Operation::Download.code(), &mut self.conn, &json!({ "path": path }), 0)
            .await
            .unwrap();
        let header = read_frame(&mut self.conn).await.unwrap().expect("response frame");
        assert_eq!(header.operation, Operation::Response.code());
        let response: FileResponse = header.decode_meta().unwrap();

        let mut body = Vec::new();
        let mut buf = vec![0u8; 8192];
        read_body(header.body_size, &mut buf, &mut self.conn, &mut body, None)
            .await
            .unwrap();
        (response, body)
    }

    /// Raw connection, for tests that write malformed frames.
    pub fn stream(&mut self) -> &mut TcpStream {
        &mut self.conn
    }

    /// Read one response frame.
    pub async fn response(&mut self) -> FileResponse {
        let header = read_frame(&mut self.conn).await.unwrap().expect("response frame");
        assert_eq!(header.operation, Operation::Response.code());
        assert_eq!(header.body_size, 0);
        header.decode_meta().unwrap()
    }
}

/// Generate deterministic, non-repeating test data for a given seed.
pub fn test_data(size: usize, seed: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    let mut state: u32 = seed;
    for _ in 0..size {
        state = state.wrapping_mul(1103515245).wrapping_add(12345);
        data.push((state >> 16) as u8);
    }
    data
}

/// Count entries left under the store's temp directory.
pub fn tmp_entries(base: &Path) -> usize {
    std::fs::read_dir(base.join("tmp")).unwrap().count()
}
