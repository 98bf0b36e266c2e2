//! Stylus Studio share API entry point.
//!
//! Opens the backend store, checks that the configured RPC endpoint serves
//! the expected chain, and exposes the read-only API for publicly shared
//! projects.

use std::sync::Arc;

use reqwest::Client;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use studio::api;
use studio::backend::Backend;
use studio::rpc::RpcClient;
use studio::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;
    info!(
        "Compiler service at {}, chain {} ({})",
        config.api_url, config.chain.name, config.chain.chain_id
    );

    // Open the SQLite store and run migrations.
    let backend = Backend::connect(&config.database_url).await?;

    let client = Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;

    // ─── Chain probe ──────────────────────────────────────
    let rpc = RpcClient::new(client, &config.chain.rpc_url);
    let expected = config.chain.chain_id;
    tokio::spawn(async move {
        match rpc.chain_id().await {
            Ok(id) if id == expected => info!("RPC {} serves chain {id}", rpc.url()),
            Ok(id) => warn!("RPC {} serves chain {id}, expected {expected}", rpc.url()),
            Err(e) => warn!("RPC {} unreachable: {e}", rpc.url()),
        }
    });

    // ─── Share API ────────────────────────────────────────
    let app = api::router(Arc::new(api::ApiState { backend }))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
