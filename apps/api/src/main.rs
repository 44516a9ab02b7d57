mod config;
mod documents;
mod editor;
mod errors;
mod layout;
mod models;
mod persistence;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, Storage};
use crate::persistence::{DocumentPersistence, InMemoryPersistence, PgDocumentRepository};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting resume editor v{}", env!("CARGO_PKG_VERSION"));

    let persistence: Arc<dyn DocumentPersistence> = match &config.storage {
        Storage::Postgres { database_url } => {
            Arc::new(PgDocumentRepository::connect(database_url).await?)
        }
        Storage::Memory => {
            warn!("Using in-memory storage; documents are lost on restart");
            Arc::new(InMemoryPersistence::new())
        }
    };

    info!(
        "Editing engine: autosave after {:?} idle, {} history entries, {:?} coalescing",
        config.engine.autosave_debounce, config.engine.history_limit, config.engine.coalesce_window
    );

    let state = AppState::new(persistence, config.engine);

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins to the editor frontend once it has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
