use axum::{
    extract::{ws::WebSocketUpgrade, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::delivery::ClientId;
use crate::state::AppState;
use crate::ws::actor;

/// GET /ws/{client_id}
/// WebSocket upgrade endpoint. The path segment is the caller's client ID;
/// identity is taken at face value, there is no authentication.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(client_id) = ClientId::new(client_id) else {
        return (StatusCode::BAD_REQUEST, "Client ID must not be empty").into_response();
    };

    tracing::info!(client_id = %client_id, "WebSocket connection accepted");
    ws.on_upgrade(move |socket| actor::run_session(socket, state, client_id))
}
