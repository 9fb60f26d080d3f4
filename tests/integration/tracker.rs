//! Integration test: tracker registration alongside a serving node.

use std::time::Duration;

use depot_integration_tests::TestNode;
use depot_node::{NodeConfig, RegistrarState, start_registrars};
use depot_proto::RegisterStorageRequest;
use depot_proto::codec::{read_frame, write_frame};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};

fn config() -> NodeConfig {
    NodeConfig {
        group: "g1".into(),
        instance_id: "node9".into(),
        bind_address: "127.0.0.1".into(),
        port: 4830,
        secret: "cluster-secret".into(),
        registration_interval: Duration::from_millis(50),
        ..NodeConfig::default()
    }
}

async fn accept_registration(listener: &TcpListener, status: u8) -> (TcpStream, RegisterStorageRequest) {
    let (mut conn, _) = tokio::time::timeout(Duration::from_secs(5), listener.accept())
        .await
        .unwrap()
        .unwrap();
    let header = read_frame(&mut conn).await.unwrap().unwrap();
    assert_eq!(header.operation, 0);
    let request = header.decode_meta().unwrap();
    write_frame(4, &mut conn, &json!({ "status": status }), 0)
        .await
        .unwrap();
    (conn, request)
}

#[tokio::test]
async fn test_registers_with_every_tracker() {
    let node = TestNode::with_config(config()).await;
    let first = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let second = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let trackers = vec![
        first.local_addr().unwrap().to_string(),
        second.local_addr().unwrap().to_string(),
    ];

    let registrars = start_registrars(node.ctx(), &trackers);
    assert_eq!(registrars.len(), 2);

    for listener in [&first, &second] {
        let (_conn, request) = accept_registration(listener, 0).await;
        assert_eq!(
            request,
            RegisterStorageRequest {
                secret: "cluster-secret".into(),
                group: "g1".into(),
                instance_id: "node9".into(),
                bind_addr: "127.0.0.1".into(),
                port: 4830,
            }
        );
        // Hold the connection while checking state.
        let registrar = registrars
            .iter()
            .find(|r| r.tracker() == listener.local_addr().unwrap().to_string())
            .unwrap();
        let mut state = registrar.subscribe();
        tokio::time::timeout(
            Duration::from_secs(5),
            state.wait_for(|s| *s == RegistrarState::Holding),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(registrar.retries(), 0);
    }

    // Serving is unaffected by registration.
    let mut client = node.connect().await;
    assert!(client.upload(b"hello").await.exist);
}

#[tokio::test]
async fn test_rejection_then_recovery() {
    let node = TestNode::with_config(config()).await;
    let tracker = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let registrars = start_registrars(node.ctx(), &[tracker.local_addr().unwrap().to_string()]);

    let (_rejected, _) = accept_registration(&tracker, 5).await;
    let (held, _) = accept_registration(&tracker, 0).await;
    assert_eq!(registrars[0].retries(), 1);

    drop(held);
    let (_again, _) = accept_registration(&tracker, 0).await;
    assert_eq!(registrars[0].retries(), 2);
}
