mod config;
mod error;
mod routes;

use std::sync::Arc;

use config::AppConfig;
use fleet_core::DatabaseService;
use routes::{app_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only load .env in development; production uses platform-native env injection.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fleet_api=info".parse()?),
        )
        .init();

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!("Starting fleet-api with config: {:?}", config);

    let db = DatabaseService::open_path(&config.db_path, config.run_migrations).await?;
    let state = AppState::new(Arc::clone(&config), db);
    let router = app_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("fleet-api listening on {}", config.bind_addr);
    axum::serve(listener, router).await?;
    Ok(())
}
