use anyhow::{Context, Result};
use axum::Router;
use std::io::ErrorKind;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;
mod storage;

use storage::StorageAccount;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting retail-backoffice with config: {:?}", cfg);

    // --- Connect the storage account ---
    let account = match cfg.connection_string.as_deref() {
        Some(conn) => StorageAccount::connect(conn)
            .await
            .context("connecting storage account")?,
        None => {
            tracing::warn!(
                "No storage connection string configured; storage-backed routes will answer 503"
            );
            StorageAccount::disconnected()
        }
    };

    // --- Handle migration mode ---
    if migrate {
        if !account.is_configured() {
            anyhow::bail!("--migrate needs a storage connection string");
        }
        // Connecting already applied the schema.
        tracing::info!("Database migration complete.");
        return Ok(());
    }

    // --- Build router ---
    let state = state::AppState::new(account, &cfg).await;
    let app: Router = routes::routes::routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
