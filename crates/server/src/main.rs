use anyhow::{Context, Result};
use docchat_core::Config;
use server::{create_router, AppState};
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// How often finished alerts and expired in-memory sessions are purged.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting docchat server");

    let config = Config::load_from_env().context("Failed to load configuration")?;
    let bind = config.server.bind.clone();

    let state = AppState::from_config(config).await?;
    info!("Application state initialized");

    state.alerts.clone().spawn_sweeper(SWEEP_INTERVAL);
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let expired = sessions.gc().await;
            if expired > 0 {
                debug!("Dropped {} expired sessions", expired);
            }
        }
    });

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind to {}", bind))?;

    info!("Server running on http://{}", bind);

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
