//! Pagecount API Server
//!
//! Run with: cargo run --bin pagecount-api
//!
//! # Configuration
//!
//! Read from the default config locations (see `pagecount config`), then
//! overridden by environment variables:
//! - `PAGECOUNT_HOST` / `PAGECOUNT_PORT` (or `PORT`, default 5000)
//! - `PAGECOUNT_DATABASE_PATH` (or `DATABASE_PATH`, default ./counter.db)
//! - `PAGECOUNT_ALLOWED_ORIGINS` (or `ALLOWED_ORIGINS`, default *)
//! - `PAGECOUNT_DEBOUNCE_MINUTES`, `PAGECOUNT_IP_SALT`
//! - `PAGECOUNT_VISIT_RETENTION_HOURS`, `PAGECOUNT_CLEANUP_EVERY`, `PAGECOUNT_REQUEST_TIMEOUT_SECS`
//! - `RUST_LOG`: Log filter (default: pagecount=info)

use pagecount::api::{serve, AppState};
use pagecount::config::Config;
use pagecount::storage::{CounterDb, CounterPolicy};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load_default();
    config.logging.init_tracing();

    tracing::info!("Starting Pagecount API server v{}", env!("CARGO_PKG_VERSION"));

    let server = config.server;
    tracing::info!("Database: {}", server.database_path);
    tracing::info!("Allowed origins: {}", server.allowed_origins.join(", "));
    tracing::info!("Debounce window: {} minutes", server.debounce_minutes);

    let db = Arc::new(CounterDb::open(
        &server.database_path,
        CounterPolicy::from_config(&server),
    )?);

    let state = AppState::new(db, server.clone());
    serve(state, &server).await?;

    tracing::info!("Pagecount API server stopped");
    Ok(())
}
