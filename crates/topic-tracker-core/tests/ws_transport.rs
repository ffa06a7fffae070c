//! WebSocket transport against a local tokio-tungstenite server.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use topic_tracker_core::{
    ClientMessage, ConnectionManager, ConnectionState, ReconnectPolicy, ServerMessage,
    WsConnector,
};

const WAIT: Duration = Duration::from_secs(10);

/// Accept one connection, push a greeting, then echo chat messages back as
/// responses until the client closes. Received texts are forwarded to `seen`.
async fn serve_once(listener: TcpListener, seen: mpsc::UnboundedSender<String>) {
    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = accept_async(stream).await.unwrap();

    ws.send(Message::Text(r#"{"type":"response","message":"welcome"}"#.to_string()))
        .await
        .unwrap();

    while let Some(Ok(msg)) = ws.next().await {
        match msg {
            Message::Text(text) => {
                let _ = seen.send(text.clone());
                let value: serde_json::Value = serde_json::from_str(&text).unwrap();
                let reply = serde_json::json!({
                    "type": "response",
                    "message": format!("echo: {}", value["message"].as_str().unwrap_or_default()),
                });
                ws.send(Message::Text(reply.to_string())).await.unwrap();
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}

#[tokio::test]
async fn exchanges_messages_with_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let server = tokio::spawn(serve_once(listener, seen_tx));

    let connector = WsConnector::new(format!("ws://{addr}/ws"));
    let (manager, mut messages) = ConnectionManager::spawn(connector, ReconnectPolicy::default());
    let mut status = manager.subscribe();

    manager.connect();
    timeout(WAIT, status.wait_for(|s| s.state == ConnectionState::Connected))
        .await
        .unwrap()
        .unwrap();

    let greeting = timeout(WAIT, messages.recv()).await.unwrap().unwrap();
    assert_eq!(
        greeting,
        ServerMessage::Response {
            message: "welcome".to_string()
        }
    );

    assert!(manager.send(&ClientMessage::chat("AI trends")));
    let seen = timeout(WAIT, seen_rx.recv()).await.unwrap().unwrap();
    assert_eq!(seen, r#"{"type":"chat_message","message":"AI trends"}"#);

    let reply = timeout(WAIT, messages.recv()).await.unwrap().unwrap();
    assert_eq!(
        reply,
        ServerMessage::Response {
            message: "echo: AI trends".to_string()
        }
    );

    manager.disconnect();
    timeout(WAIT, status.wait_for(|s| s.state == ConnectionState::Disconnected))
        .await
        .unwrap()
        .unwrap();
    timeout(WAIT, server).await.unwrap().unwrap();
}

#[tokio::test]
async fn refused_connection_gives_up_after_retries() {
    // Bind then drop to get a port nobody listens on.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let connector = WsConnector::new(format!("ws://{addr}/ws"));
    let policy = ReconnectPolicy {
        enabled: true,
        interval: Duration::from_millis(20),
        max_attempts: 2,
    };
    let (manager, _messages) = ConnectionManager::spawn(connector, policy);
    let mut status = manager.subscribe();

    manager.connect();
    let s = *timeout(WAIT, status.wait_for(|s| s.exhausted))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(s.state, ConnectionState::Disconnected);
    assert_eq!(s.attempts, 2);
    assert!(!manager.send(&ClientMessage::chat("lost")));
}
