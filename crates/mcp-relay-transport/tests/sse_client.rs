//! SSE client tests against a throwaway local HTTP server.
//!
//! Run with: `cargo test -p mcp-relay-transport --test sse_client`

use std::time::Duration;

use futures::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use mcp_relay_transport::{logging_channel, SseClient};

/// Serve exactly one request with a fixed status line and body, then close.
async fn serve_once(status: &'static str, content_type: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 4096];
        let _ = socket.read(&mut buf).await;
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: {content_type}\r\nconnection: close\r\n\r\n{body}"
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
    });

    format!("http://{addr}/sse")
}

#[tokio::test]
async fn test_relays_notifications_then_sentinel() {
    let body = concat!(
        "event: endpoint\ndata: /messages?session_id=1\n\n",
        "data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/message\",\"params\":{\"data\":{\"type\":\"text\",\"text\":\"1\"}}}\n\n",
        ": ping\n\n",
        "data: {\"jsonrpc\":\"2.0\",\"id\":3,\"result\":{}}\n\n",
        "data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/message\",\"params\":{\"data\":{\"type\":\"text\",\"text\":\"2\"}}}\n\n",
    );
    let url = serve_once("200 OK", "text/event-stream", body).await;

    let client = SseClient::new(url, Duration::from_secs(5)).unwrap();
    let (logging, logging_rx) = logging_channel();
    drop(logging);

    let stream = client.notifications(logging_rx).await.unwrap();
    let out: Vec<_> = stream.map(|r| r.unwrap()).collect().await;

    assert_eq!(out.len(), 3);
    assert_eq!(out[0].params["data"]["text"], "1");
    assert_eq!(out[1].params["data"]["text"], "2");
    assert!(out[2].is_stream_end());
}

#[tokio::test]
async fn test_error_status_fails_connect() {
    let url = serve_once("503 Service Unavailable", "text/plain", "down").await;
    let client = SseClient::new(url, Duration::from_secs(5)).unwrap();

    let err = client.connect().await.err().expect("connect should fail");
    assert!(err.to_string().contains("503"), "unexpected error: {err}");
}

#[tokio::test]
async fn test_client_name_from_config() {
    let config = mcp_relay_core::config::ServerConfig {
        url: "http://localhost:3000/sse".into(),
        name: Some("SSE Server".into()),
        connect_timeout_secs: 2,
    };
    let client = SseClient::from_config(&config).unwrap();
    assert_eq!(client.name(), "SSE Server");
    assert_eq!(client.url(), "http://localhost:3000/sse");
}
