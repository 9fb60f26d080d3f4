//! Integration test: connection admission limits.

use std::time::Duration;

use depot_integration_tests::TestNode;
use depot_node::{NodeConfig, NodeContext};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

const HELLO_MD5: &str = "5d41402abc4b2a76b9719d911017c592";

async fn wait_for_outstanding(ctx: &NodeContext, n: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while ctx.pool().outstanding() != n {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

/// With one worker and one queue slot, a third connection is closed
/// without a response while the first two are still served.
#[tokio::test]
async fn test_third_connection_rejected() {
    let node = TestNode::with_config(NodeConfig {
        workers: 1,
        queue: 1,
        ..NodeConfig::default()
    })
    .await;

    let mut running = node.connect().await;
    wait_for_outstanding(node.ctx(), 1).await;
    let mut waiting = node.connect().await;
    wait_for_outstanding(node.ctx(), 2).await;

    let mut rejected = TcpStream::connect(node.addr()).await.unwrap();
    let mut buf = [0u8; 16];
    let n = tokio::time::timeout(Duration::from_secs(5), rejected.read(&mut buf))
        .await
        .unwrap()
        .unwrap_or(0);
    assert_eq!(n, 0);

    // The running connection is served; once it closes the waiting one is.
    assert!(!running.query(HELLO_MD5).await.exist);
    drop(running);
    assert!(!waiting.query(HELLO_MD5).await.exist);
}

#[tokio::test]
async fn test_capacity_recovers_after_disconnects() {
    let node = TestNode::with_config(NodeConfig {
        workers: 2,
        queue: 0,
        ..NodeConfig::default()
    })
    .await;

    for _ in 0..5 {
        let mut a = node.connect().await;
        let mut b = node.connect().await;
        assert!(!a.query(HELLO_MD5).await.exist);
        assert!(!b.query(HELLO_MD5).await.exist);
        drop(a);
        drop(b);
        wait_for_outstanding(node.ctx(), 0).await;
    }
}
