use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

use super::*;

#[tokio::test]
async fn missing_daemon_port_is_a_no_op() {
    notify_session_started(None, "sid-1", serde_json::json!({})).await;
}

#[tokio::test]
async fn posts_session_started_to_loopback_port() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let accept = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 4096];
        let n = socket.read(&mut buf).await.unwrap();
        String::from_utf8_lossy(&buf[..n]).to_string()
    });

    notify_session_started(Some(port), "sid-42", serde_json::json!({ "cwd": "/tmp" })).await;

    let request = tokio::time::timeout(std::time::Duration::from_secs(5), accept).await.unwrap().unwrap();
    assert!(request.starts_with("POST /session-started"));
    assert!(request.contains("sid-42"));
}

#[tokio::test]
async fn unreachable_daemon_is_ignored() {
    // Nothing listens on this port; the call must not panic or hang.
    notify_session_started(Some(1), "sid-1", serde_json::json!({})).await;
}
