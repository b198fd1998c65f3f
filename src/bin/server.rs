//! `homedash` server binary.
//!
//! Reads its settings from the environment (a `.env` file is honoured) and
//! serves the dashboard until interrupted.

use std::sync::Arc;

use anyhow::Context;
use homedash::{server, AppState, ChromeBackend, Config, HassClient, Pipeline, RenderConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env().context("Invalid configuration")?;
    let layout = config.layout().context("Failed to load dashboard layout")?;
    tracing::info!(
        "Showing {} rooms from {} (timezone {})",
        layout.rooms.len(),
        config.hass_url,
        config.timezone
    );

    let mut render_config = RenderConfig::default();
    if let Some(path) = &config.chrome_path {
        render_config = render_config.with_chrome_path(path);
    }
    let backend = ChromeBackend::launch(render_config)
        .await
        .context("Failed to start the capture backend")?;

    let state = Arc::new(AppState::new(
        HassClient::new(&config.hass_url, &config.hass_token),
        Pipeline::new(backend),
        layout,
        config.timezone,
        format!("{}/assets", config.public_url),
    ));

    let assets = config.assets_dir.as_path();
    let assets = if assets.is_dir() {
        Some(assets)
    } else {
        tracing::warn!("Assets directory {} not found, icons will be missing", assets.display());
        None
    };
    let app = server::router(state.clone(), assets);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    match Arc::try_unwrap(state) {
        Ok(state) => state.pipeline.into_backend().shutdown().await?,
        Err(_) => tracing::warn!("Capture backend still in use, skipping cleanup"),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutting down");
}
