use std::sync::Arc;
use tokio::net::TcpListener;

use courier_server::config::{generate_config_template, Config};
use courier_server::delivery::DeliveryEngine;
use courier_server::routes;
use courier_server::state::AppState;
use courier_server::uploads::store::LocalObjectStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("courier_server=info,tower_http=info"));
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(env_filter)
            .init();
    }

    tracing::info!(
        "Courier server v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    // Upload storage
    let store = LocalObjectStore::new(config.uploads_dir(), config.public_url());
    store.init().await?;

    let engine_options = config.engine_options();
    tracing::info!(
        close_superseded = engine_options.close_superseded,
        mailbox_capacity = ?engine_options.mailbox_capacity,
        "Delivery engine configured"
    );

    // Build application state
    let app_state = AppState {
        engine: Arc::new(DeliveryEngine::new(engine_options)),
        store: Arc::new(store),
        keepalive: config.keepalive(),
        max_upload_bytes: config.max_upload_bytes(),
        cors_allowed_origins: config.cors_allowed_origins.clone(),
    };

    // Build router
    let app = routes::build_router(app_state);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolve on Ctrl+C so in-flight sessions get a clean close.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
