//! services/api/src/bin/api.rs

use casebook_api::{
    adapters::{DbAdapter, HtmlPrintRenderer, LogMailer, MemoryAdapter},
    config::{Config, StorageBackend},
    error::ApiError,
    web::{build_router, AppState},
};
use casebook_core::ports::DatabaseService;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Storage & Run Migrations ---
    let db: Arc<dyn DatabaseService> = match &config.storage {
        StorageBackend::Postgres { database_url } => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect(database_url)
                .await?;
            let db_adapter = DbAdapter::new(db_pool);
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(db_adapter)
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; records are lost on exit.");
            Arc::new(MemoryAdapter::new())
        }
    };

    // --- 3. Initialize Mail and Document Adapters ---
    let mailer = Arc::new(LogMailer::new(config.mail_from.clone()));
    let renderer = Arc::new(HtmlPrintRenderer::new(config.templates_path.as_deref())?);

    // --- 4. Build the Shared AppState and Router ---
    let app_state = Arc::new(AppState {
        db,
        config: config.clone(),
        mailer,
        renderer,
    });
    let app = build_router(app_state)?;

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
