//! Apex Stats server.
//!
//! Refreshes the upstream status feed on a fixed interval and serves the
//! derived view over HTTP.
//!
//! # API Endpoints
//!
//! - `GET /stats` - Snapshot, trends, history and sync status
//! - `GET /history` - Seven-day history series
//! - `POST /refresh` - Trigger a refresh now
//! - `GET /health` - Health check

use std::net::SocketAddr;
use std::sync::Arc;

use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use apexstats::api::{AppState, router};
use apexstats::config::Config;
use apexstats::data_sources::{default_strategies, http_client};
use apexstats::fetcher::FallbackFetcher;
use apexstats::history::HistoryStore;
use apexstats::service::AcquisitionService;
use apexstats::storage::Storage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("apexstats=info".parse()?))
        .init();

    let config = Config::from_env()?;

    info!(
        port = config.port,
        db_url = %config.database_url,
        resource = %config.resource_url,
        refresh_secs = config.refresh_interval.as_secs(),
        "Starting Apex Stats"
    );

    let storage = Storage::new(&config.database_url).await?;
    info!("Database initialized");

    let client = http_client(config.attempt_timeout)?;
    let fetcher = FallbackFetcher::new(default_strategies(client))?;
    info!(strategies = ?fetcher.strategy_names(), "Fetch strategies configured");

    let history = HistoryStore::new(Arc::new(storage), &config.history_key);
    let service = Arc::new(AcquisitionService::new(
        fetcher,
        &config.resource_url,
        history,
    ));
    service.restore_history().await;

    let refresher = service.spawn_periodic(config.refresh_interval);

    let app = router(AppState {
        service: Arc::clone(&service),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "Apex Stats is listening");

    let served = axum::serve(listener, app).await;
    refresher.abort();
    served?;

    Ok(())
}
