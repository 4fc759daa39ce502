//! Reservation Processor service.
//!
//! ```text
//! Redis Stream (gpu_reservations)      Redis Stream (disk_operations)
//!   ↓ (Consumer Group)                   ↓ (Consumer Group)
//! StreamWorker<ReservationJob, _>       StreamWorker<DiskOpJob, _>
//!   ↓                                     ↓
//! ReservationProcessor  ─────────────────┘
//!   ↓ (drives the reservation state machine)
//! PostgreSQL + Cluster Gateway + Cloud Adapter
//! ```
//!
//! Both streams are consumed by the same process since a single
//! reservation's lifecycle touches both (a `Reserve` may carry a
//! `disk_name`, and disk ops are requested independently) — they just run
//! as two independently-shutdown-coordinated `StreamWorker` instances.

pub mod config;
pub mod github_keys;
pub mod handlers;
pub mod processor;

use std::sync::Arc;

use axum::Router;
use core_config::Environment;
use database::postgres::connect_from_config_with_retry as connect_pg_with_retry;
use database::redis::connect_from_config_with_retry as connect_redis_with_retry;
use domain_audit::PgAuditRepository;
use domain_gpu_types::PgGpuTypeRepository;
use domain_reservations::{DiskOpJob, DiskOpsStream, PgReservationRepository, ReservationJob, ReservationsStream};
use domain_volumes::PgVolumeRepository;
use eyre::{Result, WrapErr};
use stream_worker::{full_admin_router, metrics, HealthState, StreamWorker, WorkerConfig};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::Config;
use crate::handlers::AppState;
use crate::processor::{DiskOpProcessor, ReservationProcessor};

async fn start_health_server(health_state: HealthState, port: u16) -> Result<()> {
    let app: Router = full_admin_router(health_state);
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("failed to bind health server to {addr}"))?;

    info!(port = %port, "health and admin server listening");

    axum::serve(listener, app).await.wrap_err("health server failed")?;
    Ok(())
}

async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install ctrl+c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl+c, initiating shutdown..."),
        _ = terminate => info!("received sigterm, initiating shutdown..."),
    }

    Ok(())
}

pub async fn run() -> Result<()> {
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    metrics::init_metrics();

    let app_name = env!("CARGO_PKG_NAME");
    let app_version = env!("CARGO_PKG_VERSION");
    info!(name = %app_name, version = %app_version, "starting reservation processor");
    info!("environment: {:?}", environment);

    let config = Config::from_env().wrap_err("failed to load reservation processor configuration")?;

    let pg_config = config.database.clone();
    info!("connecting to postgresql...");
    let db = connect_pg_with_retry(pg_config, None)
        .await
        .wrap_err("failed to connect to postgresql")?;
    info!("connected to postgresql successfully");

    info!("connecting to redis...");
    let redis = connect_redis_with_retry(config.redis.clone(), None)
        .await
        .wrap_err("failed to connect to redis")?;
    info!("connected to redis successfully");

    let kube_client = kube::Client::try_default()
        .await
        .wrap_err("failed to build kubernetes client")?;

    let state = AppState {
        db: db.clone(),
        reservations: Arc::new(PgReservationRepository::new(db.clone())),
        volumes: Arc::new(PgVolumeRepository::new(db.clone())),
        gpu_types: Arc::new(PgGpuTypeRepository::new(db.clone())),
        cluster: Arc::new(cluster_gateway::K8sClusterGateway::new(kube_client)),
        cloud: Arc::new(cloud_adapter::AwsCloudAdapter::from_env().await),
        audit: Arc::new(PgAuditRepository::new(db.clone())),
        config: Arc::new(config),
    };

    let reservation_worker_config = WorkerConfig::from_stream_def::<ReservationsStream>()
        .with_blocking(Some(5_000))
        .with_batch_size(state.config.batch_size)
        .with_max_concurrent_jobs(state.config.worker_concurrency)
        .with_claim_idle_time_secs(state.config.visibility_timeout_seconds);

    let disk_worker_config = WorkerConfig::from_stream_def::<DiskOpsStream>()
        .with_blocking(Some(5_000))
        .with_batch_size(state.config.batch_size)
        .with_max_concurrent_jobs(state.config.worker_concurrency)
        .with_claim_idle_time_secs(state.config.visibility_timeout_seconds);

    let reservation_processor = ReservationProcessor { state: state.clone() };
    let disk_processor = DiskOpProcessor { state: state.clone() };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = shutdown_signal().await {
            error!("error waiting for shutdown signal: {}", e);
        }
        let _ = shutdown_tx.send(true);
    });

    let health_state = HealthState::new(
        Arc::new(redis.clone()),
        app_name,
        app_version,
        reservation_worker_config.stream_name.clone(),
    );

    let health_state_clone = health_state.clone();
    let health_port = state.config.admin_health_port;
    tokio::spawn(async move {
        if let Err(e) = start_health_server(health_state_clone, health_port).await {
            error!(error = %e, "health server failed");
        }
    });

    let reservation_worker =
        StreamWorker::<ReservationJob, _>::new(redis.clone(), reservation_processor, reservation_worker_config);
    let disk_worker = StreamWorker::<DiskOpJob, _>::new(redis, disk_processor, disk_worker_config);

    info!("starting reservation and disk-op consumers...");
    let (reservation_result, disk_result) =
        tokio::join!(reservation_worker.run(shutdown_rx.clone()), disk_worker.run(shutdown_rx));

    reservation_result.map_err(|e| eyre::eyre!("{}", e))?;
    disk_result.map_err(|e| eyre::eyre!("{}", e))?;

    info!("reservation processor stopped");
    Ok(())
}
