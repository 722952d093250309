use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::delivery::ClientId;
use crate::state::AppState;
use crate::ws::{protocol, Connection};

/// How long the writer gets to flush queued frames after the session ends.
const WRITER_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Server-initiated ping settings. `ping_interval: None` disables keepalive,
/// in which case a silent peer keeps its session open indefinitely.
#[derive(Debug, Clone, Copy)]
pub struct KeepaliveSettings {
    pub ping_interval: Option<Duration>,
    pub pong_timeout: Duration,
}

impl Default for KeepaliveSettings {
    fn default() -> Self {
        Self {
            ping_interval: Some(Duration::from_secs(30)),
            pong_timeout: Duration::from_secs(10),
        }
    }
}

/// Why a session left the Open state.
#[derive(Debug)]
enum SessionEnd {
    PeerClosed(Option<u16>),
    StreamEnded,
    ReceiveError,
    TransmitFailed,
    KeepaliveTimeout,
}

impl SessionEnd {
    fn as_str(&self) -> &'static str {
        match self {
            Self::PeerClosed(_) => "peer closed",
            Self::StreamEnded => "stream ended",
            Self::ReceiveError => "receive error",
            Self::TransmitFailed => "transmit failed",
            Self::KeepaliveTimeout => "keepalive timeout",
        }
    }
}

/// Run one client session from accept to close.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards frames pushed through the client's `Connection`
/// - Reader loop (this task): parses inbound frames and hands them to the delivery engine
///
/// Every way out of the reader loop (peer close, stream end, receive error, the
/// writer dying on a failed send, keepalive timeout) ends in the same cleanup,
/// so a dead socket never stays registered.
pub async fn run_session(socket: WebSocket, state: AppState, client_id: ClientId) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();
    let connection = Connection::new(tx);
    let connection_id = connection.id();

    let mut writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Register and flush anything that arrived while the client was away
    let flushed = state.engine.on_connect(client_id.clone(), connection.clone());

    tracing::info!(
        client_id = %client_id,
        connection = %connection_id,
        flushed = flushed,
        "Session opened"
    );

    let (pong_tx, pong_rx) = mpsc::unbounded_channel::<()>();
    let mut keepalive_handle =
        tokio::spawn(keepalive_task(connection.clone(), pong_rx, state.keepalive));

    let end = loop {
        tokio::select! {
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    protocol::handle_text_message(text.as_str(), &connection, &state.engine, &client_id);
                }
                Some(Ok(Message::Binary(data))) => {
                    tracing::debug!(
                        client_id = %client_id,
                        len = data.len(),
                        "Ignoring binary frame"
                    );
                }
                // The socket answers pings itself
                Some(Ok(Message::Ping(_))) => {}
                Some(Ok(Message::Pong(_))) => {
                    let _ = pong_tx.send(());
                }
                Some(Ok(Message::Close(frame))) => {
                    break SessionEnd::PeerClosed(frame.map(|f| f.code));
                }
                Some(Err(e)) => {
                    tracing::warn!(
                        client_id = %client_id,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break SessionEnd::ReceiveError;
                }
                None => break SessionEnd::StreamEnded,
            },
            _ = &mut writer_handle => break SessionEnd::TransmitFailed,
            _ = &mut keepalive_handle => break SessionEnd::KeepaliveTimeout,
        }
    };

    keepalive_handle.abort();

    // Closed: leave the registry and announce the departure
    state
        .engine
        .on_session_closed(client_id.as_str(), connection_id);
    drop(connection);

    if !matches!(end, SessionEnd::TransmitFailed)
        && timeout(WRITER_FLUSH_TIMEOUT, &mut writer_handle).await.is_err()
    {
        writer_handle.abort();
    }

    let close_code = match end {
        SessionEnd::PeerClosed(code) => code,
        _ => None,
    };
    tracing::info!(
        client_id = %client_id,
        connection = %connection_id,
        reason = end.as_str(),
        close_code = ?close_code,
        "Session closed"
    );
}

/// Writer task: receives frames from the connection channel and forwards them to the sink.
/// Returns when the socket rejects a frame or every sender has been dropped.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            break;
        }
    }
}

/// Ping the client periodically; finish (ending the session) if a pong does not
/// arrive in time. Never finishes when keepalive is disabled.
async fn keepalive_task(
    connection: Connection,
    mut pong_rx: mpsc::UnboundedReceiver<()>,
    settings: KeepaliveSettings,
) {
    let Some(period) = settings.ping_interval else {
        return std::future::pending::<()>().await;
    };

    let mut ping_timer = interval(period);
    // Skip the first immediate tick
    ping_timer.tick().await;

    loop {
        ping_timer.tick().await;

        if connection.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
            return;
        }

        match timeout(settings.pong_timeout, pong_rx.recv()).await {
            Ok(Some(())) => {}
            _ => {
                tracing::warn!(connection = %connection.id(), "Pong timeout, closing connection");
                let _ = connection.close(1001, "Pong timeout");
                return;
            }
        }
    }
}
