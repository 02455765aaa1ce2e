use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;

use super::*;
use crate::ClusterIndexState;
use crate::EtcdConfig;
use crate::StoreError;
use crate::WatchConfig;
use crate::WatchLoop;

fn client_for(server: &MockServer) -> EtcdClient {
    let config = EtcdConfig {
        host: server.host(),
        port: server.port(),
        ..Default::default()
    };
    EtcdClient::new(&config).unwrap()
}

fn dir_listing() -> serde_json::Value {
    json!({
        "action": "get",
        "node": {
            "key": "/config/unittest",
            "dir": true,
            "modifiedIndex": 3,
            "nodes": [
                {"key": "/config/unittest/foo", "dir": true, "modifiedIndex": 4, "nodes": [
                    {"key": "/config/unittest/foo/bar", "value": "1", "modifiedIndex": 7},
                    {"key": "/config/unittest/foo/baz", "value": "\"x\"", "modifiedIndex": 5}
                ]},
                {"key": "/config/unittest/empty", "dir": true, "modifiedIndex": 2}
            ]
        }
    })
}

#[tokio::test]
async fn test_read_flattens_nodes_into_leaves() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v2/keys/config/unittest")
                .query_param("recursive", "true");
            then.status(200)
                .header("X-Etcd-Index", "12")
                .json_body(dir_listing());
        })
        .await;

    let response = client_for(&server).read("/config/unittest", true).await.unwrap();

    mock.assert_async().await;
    assert_eq!(12, response.index);
    assert_eq!(
        vec![
            StoreLeaf::new("/config/unittest/foo/bar", Some("1")),
            StoreLeaf::new("/config/unittest/foo/baz", Some("\"x\"")),
            StoreLeaf::new("/config/unittest/empty", None::<String>),
        ],
        response.leaves
    );
}

#[tokio::test]
async fn test_index_falls_back_to_modified_index() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v2/keys/config/unittest");
            then.status(200).json_body(dir_listing());
        })
        .await;

    let response = client_for(&server).read("/config/unittest", true).await.unwrap();
    assert_eq!(7, response.index);
}

#[tokio::test]
async fn test_missing_key_maps_to_key_not_found() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v2/keys/config/missing");
            then.status(404).json_body(json!({
                "errorCode": 100,
                "message": "Key not found",
                "cause": "/config/missing",
                "index": 9
            }));
        })
        .await;

    let err = client_for(&server).read("/config/missing", true).await.unwrap_err();
    assert!(matches!(err, StoreError::KeyNotFound(key) if key == "/config/missing"));
}

#[tokio::test]
async fn test_watch_sends_wait_index() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v2/keys/config/unittest")
                .query_param("wait", "true")
                .query_param("waitIndex", "13")
                .query_param("recursive", "true");
            then.status(200).header("X-Etcd-Index", "12").json_body(json!({
                "action": "set",
                "node": {"key": "/config/unittest/foo", "value": "2", "modifiedIndex": 13}
            }));
        })
        .await;

    let response = client_for(&server)
        .watch("/config/unittest", 13, true, Duration::from_secs(5))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(13, response.index);
    assert_eq!(vec![StoreLeaf::new("/config/unittest/foo", Some("2"))], response.leaves);
}

fn queued_event(
    key: &str,
    modified_index: u64,
) -> serde_json::Value {
    json!({
        "action": "set",
        "node": {"key": key, "value": "1", "modifiedIndex": modified_index}
    })
}

#[tokio::test]
async fn test_watch_index_is_the_event_index() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v2/keys/config/unittest")
                .query_param("waitIndex", "11");
            // Store moved on to 14 before the queued event was replayed
            then.status(200)
                .header("X-Etcd-Index", "14")
                .json_body(queued_event("/config/unittest/a", 11));
        })
        .await;

    let response = client_for(&server)
        .watch("/config/unittest", 11, true, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(11, response.index);
}

#[tokio::test]
async fn test_watch_loop_replays_every_queued_event() {
    let server = MockServer::start_async().await;
    let first = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v2/keys/config/unittest")
                .query_param("wait", "true")
                .query_param("waitIndex", "11");
            then.status(200)
                .header("X-Etcd-Index", "14")
                .json_body(queued_event("/config/unittest/a", 11));
        })
        .await;
    let second = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v2/keys/config/unittest")
                .query_param("wait", "true")
                .query_param("waitIndex", "12");
            then.status(200)
                .header("X-Etcd-Index", "14")
                .json_body(queued_event("/config/unittest/b", 12));
        })
        .await;

    let cluster_index = Arc::new(ClusterIndexState::new());
    cluster_index.advance(10);
    let watch_loop = WatchLoop::new(
        Arc::new(client_for(&server)),
        "/config/unittest".to_string(),
        cluster_index.clone(),
        WatchConfig::default(),
    );

    let mut keys = Vec::new();
    let processed = watch_loop
        .run(Some(2), |response| {
            keys.extend(response.leaves.into_iter().map(|leaf| leaf.key));
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(2, processed);
    first.assert_async().await;
    second.assert_async().await;
    assert_eq!(vec!["/config/unittest/a", "/config/unittest/b"], keys);
    assert_eq!(12, cluster_index.current());
}

#[tokio::test]
async fn test_watch_times_out() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v2/keys/config/unittest");
            then.status(200)
                .delay(Duration::from_millis(500))
                .json_body(dir_listing());
        })
        .await;

    let err = client_for(&server)
        .watch("/config/unittest", 1, true, Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(err.is_timeout(), "{err:?}");
}

#[tokio::test]
async fn test_watch_index_cleared() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v2/keys/config/unittest");
            then.status(400).json_body(json!({
                "errorCode": 401,
                "message": "The event in requested index is outdated and cleared",
                "cause": "the requested history has been cleared [1008/2]",
                "index": 2007
            }));
        })
        .await;

    let err = client_for(&server)
        .watch("/config/unittest", 2, true, Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::IndexCleared { index: 2007 }));
}

#[tokio::test]
async fn test_write_puts_form_value() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/v2/keys/config/unittest/foo/bar")
                .body("value=%22baz%22");
            then.status(201).json_body(json!({
                "action": "set",
                "node": {"key": "/config/unittest/foo/bar", "value": "\"baz\"", "modifiedIndex": 20}
            }));
        })
        .await;

    client_for(&server)
        .write("/config/unittest/foo/bar", "\"baz\"")
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_write_surfaces_api_errors() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(PUT).path("/v2/keys/config/unittest/foo");
            then.status(403).json_body(json!({
                "errorCode": 102,
                "message": "Not a file",
                "cause": "/config/unittest/foo",
                "index": 20
            }));
        })
        .await;

    let err = client_for(&server)
        .write("/config/unittest/foo", "1")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Api { code: 102, .. }));
}

#[tokio::test]
async fn test_non_etcd_error_body() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v2/keys/config/unittest");
            then.status(502).body("bad gateway");
        })
        .await;

    let err = client_for(&server).read("/config/unittest", true).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidResponse(msg) if msg.contains("bad gateway")));
}

#[tokio::test]
async fn test_basic_auth_is_sent() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            // test:secret
            when.method(GET)
                .path("/v2/keys/config")
                .header("Authorization", "Basic dGVzdDpzZWNyZXQ=");
            then.status(200).json_body(json!({"action": "get", "node": {"key": "/config", "dir": true}}));
        })
        .await;

    let config = EtcdConfig {
        host: server.host(),
        port: server.port(),
        username: Some("test".to_string()),
        password: Some("secret".to_string()),
        ..Default::default()
    };
    EtcdClient::new(&config).unwrap().read("/config", true).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_store_is_a_connection_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = EtcdConfig {
        host: "127.0.0.1".to_string(),
        port,
        ..Default::default()
    };

    let err = EtcdClient::new(&config)
        .unwrap()
        .read("/config", true)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Connection(_)), "{err:?}");
}
