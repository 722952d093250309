use std::sync::Arc;

use crate::delivery::DeliveryEngine;
use crate::uploads::store::ObjectStore;
use crate::ws::actor::KeepaliveSettings;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Connection registry and offline mailboxes, shared by every session
    pub engine: Arc<DeliveryEngine>,
    /// Backing store for uploaded files
    pub store: Arc<dyn ObjectStore>,
    /// Server ping / pong timing for WebSocket sessions
    pub keepalive: KeepaliveSettings,
    /// Maximum accepted upload size in bytes
    pub max_upload_bytes: usize,
    /// Allowed CORS origins; empty means any origin
    pub cors_allowed_origins: Vec<String>,
}
