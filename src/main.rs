//! Bookshelf Server - shared personal library
//!
//! A Rust REST API server for cataloguing and lending books.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookshelf_server::{
    api,
    config::{AppConfig, LoggingConfig, StorageBackend},
    repository::{LibraryStore, MemoryStore, Repository},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(&config.logging);

    tracing::info!("Starting Bookshelf Server v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn LibraryStore> = match config.database.backend {
        StorageBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .min_connections(config.database.min_connections)
                .connect(&config.database.url)
                .await
                .context("Failed to connect to database")?;

            tracing::info!("Connected to database");

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run database migrations")?;

            tracing::info!("Database migrations completed");
            Arc::new(Repository::new(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory store, data will be lost on shutdown");
            Arc::new(MemoryStore::new())
        }
    };

    let addr = SocketAddr::new(
        config.server.host.parse::<IpAddr>().context("Invalid host address")?,
        config.server.port,
    );
    let reminders_enabled = config.reminders.enabled;

    let state = AppState::new(config, store);

    if reminders_enabled {
        let _reminder_task = state.services.reminders.spawn();
        tracing::info!(
            hour = state.config.reminders.hour,
            days_before = state.config.reminders.days_before,
            "Due-date reminder task scheduled"
        );
    }

    let app = api::create_router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("bookshelf_server={},tower_http=debug", logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
