//! Shared helpers for integration tests: start a server, connect clients.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use courier_server::delivery::{DeliveryEngine, EngineOptions};
use courier_server::state::AppState;
use courier_server::uploads::store::LocalObjectStore;
use courier_server::ws::actor::KeepaliveSettings;

pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub engine: Arc<DeliveryEngine>,
    pub data_dir: tempfile::TempDir,
}

impl TestServer {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self, client_id: &str) -> String {
        format!("ws://{}/ws/{}", self.addr, client_id)
    }
}

/// Start the server on a random port with default options.
pub async fn start_test_server() -> TestServer {
    start_test_server_with(EngineOptions::default(), KeepaliveSettings::default(), 1024 * 1024).await
}

pub async fn start_test_server_with(
    options: EngineOptions,
    keepalive: KeepaliveSettings,
    max_upload_bytes: usize,
) -> TestServer {
    let data_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let store = LocalObjectStore::new(data_dir.path().join("uploads"), format!("http://{}", addr));
    store.init().await.expect("Failed to init upload store");

    let engine = Arc::new(DeliveryEngine::new(options));
    let state = AppState {
        engine: engine.clone(),
        store: Arc::new(store),
        keepalive,
        max_upload_bytes,
        cors_allowed_origins: Vec::new(),
    };

    let app = courier_server::routes::build_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        addr,
        engine,
        data_dir,
    }
}

/// Connect as `client_id` and wait until the server has registered the session.
pub async fn connect(server: &TestServer, client_id: &str) -> WsStream {
    let (ws, _) = tokio_tungstenite::connect_async(server.ws_url(client_id))
        .await
        .expect("Failed to connect to WebSocket");
    wait_until(|| server.engine.is_online(client_id)).await;
    ws
}

pub async fn send_text(ws: &mut WsStream, text: &str) {
    ws.send(Message::text(text.to_string()))
        .await
        .expect("Failed to send frame");
}

/// Next text frame, skipping control frames. Panics after two seconds.
pub async fn recv_text(ws: &mut WsStream) -> String {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("Expected a message within timeout");
        match msg {
            Some(Ok(Message::Text(text))) => return text.as_str().to_owned(),
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            other => panic!("Expected text message, got: {:?}", other),
        }
    }
}

/// Assert that no text frame arrives within `ms` milliseconds.
pub async fn assert_silent(ws: &mut WsStream, ms: u64) {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(ms);
    loop {
        match tokio::time::timeout_at(deadline, ws.next()).await {
            Err(_) => return,
            Ok(Some(Ok(Message::Ping(_)))) | Ok(Some(Ok(Message::Pong(_)))) => continue,
            Ok(other) => panic!("Expected silence, got: {:?}", other),
        }
    }
}

/// Poll `condition` every 10ms for up to two seconds.
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Condition not met within timeout");
}
