mod config;
mod handlers;
mod services;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use config::Config;
use handlers::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(Config::from_env());
    if config.gemini_api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set, every question will get the fallback reply");
    }

    let state = AppState::from_config(config.clone());
    let app = router(state);

    let listener = TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_address))?;

    tracing::info!("Server running on http://{}", config.bind_address);
    axum::serve(listener, app).await.context("server stopped")?;
    Ok(())
}
