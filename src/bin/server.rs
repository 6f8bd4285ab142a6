//! Confstore Server
//!
//! Serves the configuration REST API over two directories of YAML files.
//!
//! # Configuration
//!
//! Settings are read from `~/.config/confstore/settings.yaml` (or the file
//! named by `CONFSTORE_SETTINGS`) and overridden by environment variables:
//! - `CONFSTORE_BIND`: Address to listen on (default: 0.0.0.0:8000)
//! - `CONFSTORE_CONFIG_DIR`: Generic configuration directory (default: config_files)
//! - `CONFSTORE_SPECIFIC_DIR`: Specific configuration directory (default: specific_configs)
//! - `CONFSTORE_TOKEN_SECRET`: Token signing secret
//! - `CONFSTORE_TOKEN_TTL_HOURS`: Token lifetime in hours (default: 24)
//!
//! # Settings File Format
//!
//! ```yaml
//! bind_address: "0.0.0.0:8000"
//! config_dir: /srv/confstore/config_files
//! specific_dir: /srv/confstore/specific_configs
//! token_secret: "generate-with-confstore-admin-secret"
//! cors_origins:
//!   - "http://localhost:5173"
//! ```

use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use confstore::server::{self, AppState};
use confstore::store::DocumentStore;
use confstore::{ConfigStore, Settings, SpecificStore};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "confstore=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load(None)?;

    if settings.uses_placeholder_secret() {
        tracing::warn!(
            "Token secret is the built-in placeholder; set CONFSTORE_TOKEN_SECRET before exposing this server"
        );
    }

    let configs: ConfigStore = open_store(&settings.config_dir)?;
    let specifics: SpecificStore = open_store(&settings.specific_dir)?;
    tracing::info!(
        "Loaded {} config(s) from {}",
        configs.len(),
        settings.config_dir.display()
    );
    tracing::info!(
        "Loaded {} specific config(s) from {}",
        specifics.len(),
        settings.specific_dir.display()
    );

    let tokens = settings.token_service()?;
    let state = AppState::new(configs, specifics, tokens);
    let app = server::app(state, &settings.cors_origins);

    let listener = tokio::net::TcpListener::bind(&settings.bind_address).await?;
    tracing::info!("Starting server on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Ensures the directory exists, then loads every document in it.
fn open_store<D: confstore::store::Document>(
    dir: &Path,
) -> Result<DocumentStore<D>, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(dir)
        .map_err(|e| format!("Failed to create directory {}: {}", dir.display(), e))?;
    Ok(DocumentStore::open(dir)?)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
