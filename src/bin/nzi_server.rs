//! NZI REST API server

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use nzi_pro::api::{create_router, AppState};
use nzi_pro::config::AppConfig;
use nzi_pro::database::{DatabaseConfig, DatabaseManager};
use nzi_pro::services::TargetForecastService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("nzi_pro=info,tower_http=debug")),
        )
        .init();

    let config = AppConfig::from_env()?;
    let manager = DatabaseManager::new(DatabaseConfig::from_app_config(&config)?).await?;
    manager.test_connection().await?;

    let state = AppState {
        forecasts: TargetForecastService::new(Arc::new(manager.client_repository())),
        default_year: config.default_year,
    };
    let app = create_router(state);

    // Determine port
    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(3000);

    let addr = format!("0.0.0.0:{}", port);
    info!("Starting {} API on {}", config.app_title, addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
