use std::sync::Arc;
use std::time::Duration;

use compat_harness::Endpoint;
use compat_harness::Error;
use compat_harness::HttpQueryClient;
use compat_harness::QueryClient;
use compat_harness::QueryError;

use crate::common::settings;
use crate::common::spawn_fake_node;
use crate::common::Behaviour;
use crate::common::Fleet;
use crate::common::SYNTAX_ERROR;

#[tokio::test]
async fn test_http_client_reports_server_error_code() {
    crate::enable_logger();

    let fleet = Arc::new(Fleet::default());
    let (addr, _shutdown) = spawn_fake_node("node1", fleet, Behaviour::default());
    let client = HttpQueryClient::new(
        "node1",
        &Endpoint::new(addr),
        &settings(&[]),
        Duration::from_secs(5),
    )
    .unwrap();

    client.ping().await.unwrap();
    let result = client.execute("selec 1").await;

    match result {
        Err(Error::Query(QueryError::Server {
            node,
            status,
            code,
            message,
            ..
        })) => {
            assert_eq!(node, "node1");
            assert_eq!(status, 400);
            assert_eq!(code, Some(SYNTAX_ERROR));
            assert!(message.contains("Syntax error"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_http_client_sends_node_settings() {
    crate::enable_logger();

    let fleet = Arc::new(Fleet::default());
    let (addr, _shutdown) = spawn_fake_node("node1", fleet.clone(), Behaviour::default());
    let client = HttpQueryClient::new(
        "node1",
        &Endpoint::new(addr),
        &settings(&[("allow_experimental_analyzer", "0"), ("max_threads", "2")]),
        Duration::from_secs(5),
    )
    .unwrap();

    let result = client.execute("select 1").await.unwrap();
    assert_eq!(result.output, "1\n");
    assert_eq!(result.status, 200);

    let seen = fleet.settings_seen_by("node1");
    assert_eq!(seen.get("allow_experimental_analyzer").map(String::as_str), Some("0"));
    assert_eq!(seen.get("max_threads").map(String::as_str), Some("2"));
}

#[tokio::test]
async fn test_http_client_times_out_slow_statement() {
    crate::enable_logger();

    let fleet = Arc::new(Fleet::default());
    let (addr, _shutdown) = spawn_fake_node(
        "node2",
        fleet,
        Behaviour {
            delay: Some(Duration::from_secs(2)),
            ..Default::default()
        },
    );
    let client = HttpQueryClient::new(
        "node2",
        &Endpoint::new(addr),
        &settings(&[]),
        Duration::from_millis(200),
    )
    .unwrap();

    let result = client.execute("select 1").await;
    assert!(matches!(
        result,
        Err(Error::Timeout { ref node, operation: "query", .. }) if node == "node2"
    ));
}

#[tokio::test]
async fn test_http_client_transport_error_after_shutdown() {
    crate::enable_logger();

    let fleet = Arc::new(Fleet::default());
    let (addr, shutdown) = spawn_fake_node("node1", fleet, Behaviour::default());
    let _ = shutdown.send(());
    tokio::time::sleep(Duration::from_millis(100)).await;

    let client = HttpQueryClient::new(
        "node1",
        &Endpoint::new(addr),
        &settings(&[]),
        Duration::from_secs(1),
    )
    .unwrap();

    let result = client.ping().await;
    assert!(matches!(
        result,
        Err(Error::Query(QueryError::Transport { .. })) | Err(Error::Timeout { .. })
    ));
}
