//! Expiry & Warning Engine service.
//!
//! Runs once a minute, single instance, and performs (in order): the
//! warning ladder, out-of-memory accounting, expiry of reservations whose
//! time budget has elapsed, and the hard-deletion sweep over soft-deleted
//! volumes past their retention window. Every step is written to be safe
//! to re-run — a failure partway through is picked up again on the next
//! tick rather than leaking state.

pub mod config;
pub mod engine;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use core_config::Environment;
use database::postgres::connect_from_config_with_retry as connect_pg_with_retry;
use domain_reservations::PgReservationRepository;
use domain_volumes::PgVolumeRepository;
use eyre::{Result, WrapErr};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Config;
use crate::engine::Engine;

async fn kube_client() -> Result<kube::Client> {
    kube::Client::try_default().await.wrap_err("failed to build kubernetes client")
}

async fn build_engine(config: Arc<Config>) -> Result<Engine> {
    let db = connect_pg_with_retry(config.database.clone(), None)
        .await
        .wrap_err("failed to connect to postgresql")?;

    Ok(Engine {
        db: db.clone(),
        reservations: Arc::new(PgReservationRepository::new(db.clone())),
        volumes: Arc::new(PgVolumeRepository::new(db)),
        cluster: Arc::new(cluster_gateway::K8sClusterGateway::new(kube_client().await?)),
        cloud: Arc::new(cloud_adapter::AwsCloudAdapter::from_env().await),
        config,
    })
}

async fn start_health_server(port: u16) -> Result<()> {
    let app = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/metrics", get(observability::metrics_handler));
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await.wrap_err_with(|| format!("failed to bind health server to {addr}"))?;
    info!(port = %port, "health server listening");
    axum::serve(listener, app).await.wrap_err("health server failed")?;
    Ok(())
}

/// Run a single tick and return the resulting stats.
pub async fn tick() -> Result<engine::RunStats> {
    let config = Arc::new(Config::from_env().wrap_err("failed to load expiry engine configuration")?);
    let engine = build_engine(config).await?;
    Ok(engine.run_tick().await)
}

/// Run forever on the configured cadence.
pub async fn run() -> Result<()> {
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    let app_name = env!("CARGO_PKG_NAME");
    let app_version = env!("CARGO_PKG_VERSION");
    info!(name = %app_name, version = %app_version, "starting expiry engine");
    info!("environment: {:?}", environment);

    observability::init_metrics();

    let config = Arc::new(Config::from_env().wrap_err("failed to load expiry engine configuration")?);

    let health_port = config.admin_health_port;
    tokio::spawn(async move {
        if let Err(e) = start_health_server(health_port).await {
            error!(error = %e, "health server failed");
        }
    });

    let engine = build_engine(config.clone()).await.wrap_err("failed to build engine")?;

    let mut ticker = tokio::time::interval(Duration::from_secs(config.expiry_tick_seconds));
    const TICK_DEADLINE: Duration = Duration::from_secs(60);

    loop {
        ticker.tick().await;
        match tokio::time::timeout(TICK_DEADLINE, engine.run_tick()).await {
            Ok(stats) => info!(?stats, "expiry engine tick summary"),
            Err(_) => error!("expiry engine tick exceeded deadline, aborting and retrying next cadence"),
        }
    }
}
