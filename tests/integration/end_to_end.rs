//! Integration test: upload, query and download over real TCP.

use depot_integration_tests::{TestNode, test_data, tmp_entries};
use depot_proto::codec::write_frame;
use depot_types::{FileHash, Status};
use serde_json::json;

const HELLO_MD5: &str = "5d41402abc4b2a76b9719d911017c592";

#[tokio::test]
async fn test_hello_round_trip() {
    let node = TestNode::start().await;
    let mut client = node.connect().await;

    let stored = client.upload(b"hello").await;
    assert_eq!(stored.status, Status::Ok);
    assert_eq!(stored.path, format!("/g1/node1/{HELLO_MD5}"));
    assert!(
        node.base_dir()
            .join("data/5d/41")
            .join(HELLO_MD5)
            .is_file()
    );

    let found = client.query(HELLO_MD5).await;
    assert!(found.exist);

    // Group and segment are not checked against this node.
    let (response, body) = client
        .download(&format!("/anygroup/anyseg/{HELLO_MD5}"))
        .await;
    assert_eq!(response.status, Status::Ok);
    assert!(response.exist);
    assert_eq!(response.file_size, Some(5));
    assert_eq!(body, b"hello");
}

#[tokio::test]
async fn test_download_matches_upload_across_sizes() {
    let node = TestNode::start().await;
    let mut client = node.connect().await;

    for (i, size) in [1usize, 32 * 1024 - 1, 32 * 1024, 32 * 1024 + 1, 1_000_000]
        .into_iter()
        .enumerate()
    {
        let data = test_data(size, i as u32 + 1);
        let stored = client.upload(&data).await;
        assert_eq!(stored.file_size, Some(size as u64));

        let (response, body) = client.download(&stored.path).await;
        assert_eq!(response.file_size, Some(size as u64));
        assert_eq!(body.len(), size);
        assert_eq!(FileHash::from_data(&body), FileHash::from_data(&data));
    }
    assert_eq!(tmp_entries(node.base_dir()), 0);
}

#[tokio::test]
async fn test_concurrent_identical_uploads() {
    let node = TestNode::start().await;
    let data = test_data(300_000, 42);
    let hash = FileHash::from_data(&data);

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let addr = node.addr();
        let data = data.clone();
        tasks.push(tokio::spawn(async move {
            let mut client = depot_integration_tests::Client::connect(addr).await;
            client.upload(&data).await
        }));
    }
    for task in tasks {
        let stored = task.await.unwrap();
        assert_eq!(stored.status, Status::Ok);
        assert!(stored.path.ends_with(&hash.to_string()));
    }

    let on_disk = std::fs::read(node.ctx().store().path_for(&hash)).unwrap();
    assert_eq!(on_disk, data);
    assert_eq!(tmp_entries(node.base_dir()), 0);
}

#[tokio::test]
async fn test_query_accepts_either_case() {
    let node = TestNode::start().await;
    let mut client = node.connect().await;
    client.upload(b"hello").await;

    assert!(client.query(&HELLO_MD5.to_uppercase()).await.exist);
    let (response, body) = client
        .download(&format!("/g1/node1/{}", HELLO_MD5.to_uppercase()))
        .await;
    assert!(response.exist);
    assert_eq!(body, b"hello");
}

#[tokio::test]
async fn test_invalid_download_paths_answer_missing() {
    let node = TestNode::start().await;
    let mut client = node.connect().await;
    client.upload(b"hello").await;

    for path in [
        format!("/g1/seg/{}", &HELLO_MD5[..31]),
        format!("/g1/seg/{}g", &HELLO_MD5[..31]),
        format!("/g1/../../{HELLO_MD5}"),
        format!("/g.1/seg/{HELLO_MD5}"),
        format!("g1/seg/{HELLO_MD5}"),
    ] {
        let (response, body) = client.download(&path).await;
        assert_eq!(response.status, Status::Ok, "{path}");
        assert!(!response.exist, "{path}");
        assert!(body.is_empty());
    }

    // Still the same connection.
    assert!(client.query(HELLO_MD5).await.exist);
}

#[tokio::test]
async fn test_bad_query_closes_connection() {
    let node = TestNode::start().await;
    let mut client = node.connect().await;

    let response = client.query("xyz").await;
    assert_eq!(response.status, Status::BadRequest);
    assert!(!response.exist);

    let next = depot_proto::codec::read_frame(client.stream()).await;
    assert!(matches!(next, Ok(None) | Err(_)));
}

#[tokio::test]
async fn test_unknown_operation_is_skipped() {
    let node = TestNode::start().await;
    let mut client = node.connect().await;

    write_frame(11, client.stream(), &json!({ "anything": true }), 0)
        .await
        .unwrap();
    let stored = client.upload(b"after").await;
    assert!(stored.exist);
}

#[tokio::test]
async fn test_many_frames_on_one_connection() {
    let node = TestNode::start().await;
    let mut client = node.connect().await;

    let mut paths = Vec::new();
    for i in 0..50u32 {
        let data = test_data(1000 + i as usize, i + 100);
        paths.push((client.upload(&data).await.path, data));
    }
    for (path, data) in &paths {
        let (_, body) = client.download(path).await;
        assert_eq!(&body, data);
    }
}
