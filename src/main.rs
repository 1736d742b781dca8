use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{routing::get, Router};
use tracing::info;
use tracing_subscriber::EnvFilter;

use vitals_agent::{
    broadcast::Broadcaster,
    config::Config,
    scheduler::Scheduler,
    source::{MetricSource, SysinfoSource},
    state::AppState,
    ws::ws_handler,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    let source: Arc<dyn MetricSource> = Arc::new(SysinfoSource::new());
    let broadcaster = Broadcaster::new(16);

    Scheduler::new(
        source.clone(),
        broadcaster.clone(),
        Duration::from_millis(config.update_interval_ms),
    )
    .spawn();

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(AppState { source, broadcaster });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(%addr, interval_ms = config.update_interval_ms, "telemetry agent listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
