//! `key-upload`: diagnosis key upload service entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise the telemetry pipeline (tracing + optional OTLP export).
//! 3. Create the key store and issue a server keypair.
//! 4. Build the upload pipeline and event logger.
//! 5. Build the Axum router and start the HTTP server.

mod config;
mod crypto;
mod events;
mod server;
mod store;
mod telemetry;
#[cfg(test)]
mod testing;
mod upload;

use std::sync::Arc;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{info, warn};

use config::Config;
use events::{EventLogger, MemoryEventStore};
use server::state::AppState;
use store::MemoryKeyStore;
use upload::UploadPipeline;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otel_exporter_otlp_endpoint.as_deref(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = cfg.listen_port,
        otlp = cfg.otel_exporter_otlp_endpoint.is_some(),
        "key-upload starting"
    );

    // -----------------------------------------------------------------------
    // 3. Key store
    // -----------------------------------------------------------------------
    let key_store = MemoryKeyStore::new(cfg.quota_policy());
    let server_public_key = key_store.generate_server_keypair().await;
    info!(
        server_public_key = %STANDARD.encode(server_public_key),
        "server keypair issued"
    );

    // -----------------------------------------------------------------------
    // 4. Services
    // -----------------------------------------------------------------------
    let tokens = cfg.token_table()?;
    if tokens.is_empty() {
        warn!("AUTH_TOKENS is empty; events will be attributed to raw tokens");
    } else {
        info!(tokens = tokens.len(), "event tokens loaded");
    }

    let pipeline = UploadPipeline::new(Arc::new(key_store), cfg.max_timestamp_skew());
    let events = EventLogger::new(Arc::new(tokens), Arc::new(MemoryEventStore::new()));

    // -----------------------------------------------------------------------
    // 5. HTTP server
    // -----------------------------------------------------------------------
    let state = AppState::new(pipeline, events);
    let router = server::router::build(state, cfg.request_timeout());

    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.listen_port).into();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    telemetry::shutdown_telemetry();
    info!("key-upload stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
}
