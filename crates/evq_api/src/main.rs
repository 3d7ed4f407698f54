use anyhow::Context;
use clap::Parser;
use evq_api::{AppState, config::ServerConfig, create_app, logging};
use evq_engine::Engine;
use evq_store::{MemoryStore, SqliteStore, StationStore};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments and environment
    let config = ServerConfig::parse();

    // Initialize tracing
    logging::init();

    let Some(database_url) = config.database_url.as_deref() else {
        tracing::error!("Missing database connection string, set DATABASE_URL");
        std::process::exit(1);
    };

    let store: Arc<dyn StationStore> = if database_url == "memory" {
        tracing::warn!("Using the in-memory store, state is lost on exit");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(
            SqliteStore::open(database_url)
                .with_context(|| format!("Failed to open database '{}'", database_url))?,
        )
    };

    let engine = Arc::new(Engine::new(store, config.engine_settings()));

    // Make sure the default station document exists
    if let Err(error) = engine.ensure_station(&config.station_id).await {
        tracing::error!(
            "Could not initialize station {}: {}",
            config.station_id,
            error
        );
    }

    let _ticker = engine.spawn_ticker(config.tick_interval(), config.minutes_per_tick());

    let app = create_app(AppState::new(engine));

    let bind_addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
