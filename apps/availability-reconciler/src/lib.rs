//! Availability Reconciler service.
//!
//! Runs on a fixed cadence (default every 5 minutes), single instance at a
//! time, and performs two independent reconciliation passes: Phase A
//! recomputes the GPU-type catalog's availability columns from cluster and
//! cloud ground truth; Phase B reconciles the volume catalog against the
//! cloud's authoritative volume inventory. A per-volume or per-tag failure
//! is logged and counted, never aborts the run.

pub mod config;
pub mod reconciler;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use core_config::Environment;
use database::postgres::connect_from_config_with_retry as connect_pg_with_retry;
use domain_gpu_types::{GpuTypeRepository, PgGpuTypeRepository};
use domain_volumes::{PgVolumeRepository, VolumeRepository};
use eyre::{Result, WrapErr};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Config;
use crate::reconciler::Reconciler;

/// Read-only snapshot of the catalogs AR reconciles, for `status` — never
/// touches the cluster or the cloud, never writes anything.
#[derive(Debug, Serialize)]
pub struct StatusSnapshot {
    pub gpu_type_count: usize,
    pub total_cluster_gpus: i32,
    pub available_gpus: i32,
    pub active_volume_count: usize,
}

async fn build_reconciler(config: Arc<Config>) -> Result<Reconciler> {
    let db = connect_pg_with_retry(config.database.clone(), None)
        .await
        .wrap_err("failed to connect to postgresql")?;

    let kube_client = kube_client_or_default().await?;

    Ok(Reconciler {
        gpu_types: Arc::new(PgGpuTypeRepository::new(db.clone())),
        volumes: Arc::new(PgVolumeRepository::new(db)),
        cluster: Arc::new(cluster_gateway::K8sClusterGateway::new(kube_client)),
        cloud: Arc::new(cloud_adapter::AwsCloudAdapter::from_env().await),
        config,
    })
}

async fn kube_client_or_default() -> Result<kube::Client> {
    kube::Client::try_default().await.wrap_err("failed to build kubernetes client")
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

/// Run a single reconciliation tick and return the combined phase stats.
pub async fn tick() -> Result<(reconciler::RunStats, reconciler::RunStats)> {
    let config = Arc::new(Config::from_env().wrap_err("failed to load availability reconciler configuration")?);
    let reconciler = build_reconciler(config).await?;
    Ok(reconciler.run_tick().await)
}

/// Read current gpu_type/volume counters without reconciling anything —
/// no cluster or cloud calls, no writes.
pub async fn status() -> Result<StatusSnapshot> {
    let config = Config::from_env().wrap_err("failed to load availability reconciler configuration")?;
    let db = connect_pg_with_retry(config.database.clone(), None)
        .await
        .wrap_err("failed to connect to postgresql")?;

    let gpu_types = PgGpuTypeRepository::new(db.clone());
    let volumes = PgVolumeRepository::new(db);

    let types = gpu_types.list().await.wrap_err("failed to list gpu types")?;
    let active_volumes = volumes.list_active().await.wrap_err("failed to list active volumes")?;

    Ok(StatusSnapshot {
        gpu_type_count: types.len(),
        total_cluster_gpus: types.iter().map(|t| t.total_cluster_gpus).sum(),
        available_gpus: types.iter().map(|t| t.available_gpus).sum(),
        active_volume_count: active_volumes.len(),
    })
}

/// Run forever on the configured cadence, refusing to let two ticks
/// overlap (the scheduler's "forbid overlap" concurrency policy).
pub async fn run() -> Result<()> {
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    let app_name = env!("CARGO_PKG_NAME");
    let app_version = env!("CARGO_PKG_VERSION");
    info!(name = %app_name, version = %app_version, "starting availability reconciler");
    info!("environment: {:?}", environment);

    observability::init_metrics();

    let config = Arc::new(Config::from_env().wrap_err("failed to load availability reconciler configuration")?);

    let health_port = config.admin_health_port;
    tokio::spawn(async move {
        if let Err(e) = start_health_server(health_port).await {
            error!(error = %e, "health server failed");
        }
    });

    let reconciler = build_reconciler(config.clone()).await.wrap_err("failed to build reconciler")?;

    let interval_seconds = config.availability_reconcile_seconds;
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds));

    const TICK_DEADLINE: Duration = Duration::from_secs(600);

    loop {
        ticker.tick().await;
        match tokio::time::timeout(TICK_DEADLINE, reconciler.run_tick()).await {
            Ok((phase_a, phase_b)) => info!(?phase_a, ?phase_b, "reconciliation tick summary"),
            Err(_) => error!("reconciliation tick exceeded deadline, aborting and retrying next cadence"),
        }
    }
}
