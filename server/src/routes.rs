use axum::{extract::DefaultBodyLimit, http::HeaderValue, Router};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::landing;
use crate::state::AppState;
use crate::uploads::routes as upload_routes;
use crate::ws::handler as ws_handler;

/// Headroom on top of the file size limit for multipart boundaries and the other fields.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // WebSocket endpoint: the path segment is the client ID
    let ws_routes = Router::new().route(
        "/ws/{client_id}",
        axum::routing::get(ws_handler::ws_upgrade),
    );

    // Uploads, with a body limit sized to the configured maximum file size
    let upload_routes = Router::new()
        .route("/upload", axum::routing::post(upload_routes::upload_file))
        .layer(DefaultBodyLimit::max(
            state.max_upload_bytes + MULTIPART_OVERHEAD_BYTES,
        ))
        .route("/files/{key}", axum::routing::get(upload_routes::get_file));

    // Public pages and health check
    let public_routes = Router::new()
        .route("/", axum::routing::get(landing::index_page))
        .route("/health", axum::routing::get(health_check));

    let cors = cors_layer(&state.cors_allowed_origins);

    Router::new()
        .merge(ws_routes)
        .merge(upload_routes)
        .merge(public_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Permissive CORS when no origins are configured, otherwise an exact-match allow list.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
