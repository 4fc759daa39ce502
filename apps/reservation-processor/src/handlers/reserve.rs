//! State-driven `Reserve` handler.
//!
//! Every delivery looks the reservation up by id and resumes from its
//! *current* status rather than assuming this is the first delivery — the
//! queue's at-least-once semantics and the 5-step execution sequence mean a
//! redelivery can land at any step. Each branch below performs only the
//! work needed to advance one step and returns; the next delivery (or the
//! same one, looping within its budget for the `Preparing` branch) picks up
//! from wherever the reservation now sits.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::Utc;
use cluster_gateway::{PodPhase, PodSpecRequest, PodStatusSnapshot};
use database::postgres::transaction_scope;
use domain_reservations::{
    AdmitOutcome, CreateReservation, ReservationError, ReservationPatch, ReservationResult,
    ReservationStatus, ReservePayload, StatusHistoryEntry,
};
use domain_volumes::BindOutcome;
use rand::Rng;
use uuid::Uuid;

use super::shared::{pod_name_for, AppState};
use crate::github_keys;

const LOCK_TIMEOUT_MS: u64 = 2_000;

/// Entry point invoked by the stream processor for every `Reserve` delivery.
pub async fn handle_reserve(state: &AppState, payload: &ReservePayload) -> ReservationResult<()> {
    let existing = state.reservations.get_by_id(&payload.reservation_id).await?;

    let reservation = match existing {
        Some(r) => r,
        None => create_queued(state, payload).await?,
    };

    if reservation.status.is_terminal() || reservation.status == ReservationStatus::Active {
        return Ok(());
    }

    match reservation.status {
        ReservationStatus::Queued => admit(state, payload).await,
        ReservationStatus::Pending => prepare(state, payload).await,
        ReservationStatus::Preparing => finalize(state, payload).await,
        ReservationStatus::Active
        | ReservationStatus::Cancelled
        | ReservationStatus::Expired
        | ReservationStatus::Failed => Ok(()),
    }
}

async fn create_queued(state: &AppState, payload: &ReservePayload) -> ReservationResult<domain_reservations::Reservation> {
    let disk_name = payload.disk_name.clone();
    state
        .reservations
        .create(CreateReservation {
            id: payload.reservation_id.clone(),
            user_id: payload.user_id.clone(),
            gpu_type: payload.gpu_type.clone(),
            gpu_count: payload.gpu_count,
            instance_type: payload.instance_type.clone(),
            duration_hours: payload.duration_hours,
            image: payload.image.clone(),
            disk_name,
            env_vars: payload.env_vars.clone(),
            jupyter_enabled: payload.jupyter_enabled,
            preserve_entrypoint: payload.preserve_entrypoint,
            github_user: payload.github_user.clone(),
            is_multinode: payload.is_multinode,
            total_nodes: payload.total_nodes,
            node_index: payload.node_index,
            master_reservation_id: payload.master_reservation_id.clone(),
        })
        .await
}

/// Admission: lock the GPU-type row and decrement it alongside the
/// `queued -> pending` transition, all in one transaction. On
/// `Backpressure` we return an error so the message is left on the queue
/// unmutated rather than recorded as failed — capacity may free up before
/// the next delivery.
async fn admit(state: &AppState, payload: &ReservePayload) -> ReservationResult<()> {
    let txn = transaction_scope(&state.db).await.map_err(|e| ReservationError::Database(e.to_string()))?;

    let outcome = domain_reservations::txn::admit(
        &txn,
        &payload.reservation_id,
        &payload.gpu_type,
        payload.gpu_count,
        payload.is_multinode,
        LOCK_TIMEOUT_MS,
    )
    .await;

    match outcome {
        Ok(AdmitOutcome::Admitted) => {
            txn.commit().await.map_err(|e| ReservationError::Database(e.to_string()))?;
            Ok(())
        }
        Ok(AdmitOutcome::Backpressure) => {
            txn.rollback().await.map_err(|e| ReservationError::Database(e.to_string()))?;
            Err(ReservationError::Contention(format!(
                "insufficient capacity for {} x{}",
                payload.gpu_type, payload.gpu_count
            )))
        }
        Err(e) => {
            let _ = txn.rollback().await;
            Err(e)
        }
    }
}

/// Bind the volume (if requested), materialise the pod spec, and submit it
/// idempotently (§4.1 steps 1-3).
async fn prepare(state: &AppState, payload: &ReservePayload) -> ReservationResult<()> {
    if let Some(disk_name) = &payload.disk_name {
        bind_volume(state, payload, disk_name).await?;
    }

    let gpu_type = state
        .gpu_types
        .get_by_tag(&payload.gpu_type)
        .await?
        .ok_or_else(|| ReservationError::UserFatal(format!("unknown gpu type: {}", payload.gpu_type)))?;

    let ssh_public_key = match &payload.github_user {
        Some(user) => {
            let client = reqwest::Client::new();
            Some(github_keys::fetch_public_keys(&client, &state.config, user).await?)
        }
        None => None,
    };

    let pod_name = pod_name_for(&payload.reservation_id);
    let namespace = "reservations".to_string();
    let fraction = gpu_count_fraction(payload.gpu_count, gpu_type.max_gpus_per_node);

    let request = PodSpecRequest {
        pod_name: pod_name.clone(),
        namespace: namespace.clone(),
        instance_selector_label: payload.gpu_type.clone(),
        image: payload.image.clone(),
        env_vars: payload.env_vars.clone(),
        ssh_public_key,
        cpu_millis: (gpu_type.cpu_per_instance as f64 * fraction * 1000.0) as i64,
        memory_mb: (gpu_type.memory_mb_per_instance as f64 * fraction) as i64,
        jupyter_sidecar: payload.jupyter_enabled,
        preserve_entrypoint: payload.preserve_entrypoint,
        reservation_id: payload.reservation_id.clone(),
        owner_user_id: payload.user_id.clone(),
    };

    if state
        .cluster
        .get_pod_status(&namespace, &pod_name)
        .await?
        .is_none()
    {
        state.cluster.create_pod(request).await?;
    }

    let now = Utc::now();
    state
        .reservations
        .apply_patch(
            &payload.reservation_id,
            ReservationPatch {
                status: Some(ReservationStatus::Preparing),
                append_history: Some(StatusHistoryEntry {
                    status: ReservationStatus::Preparing,
                    timestamp: now,
                    detail: None,
                }),
                pod_name: Some(pod_name),
                namespace: Some(namespace),
                ..Default::default()
            },
        )
        .await
}

fn gpu_count_fraction(gpu_count: i32, max_gpus_per_node: i32) -> f64 {
    if max_gpus_per_node <= 0 {
        1.0
    } else {
        gpu_count as f64 / max_gpus_per_node as f64
    }
}

async fn bind_volume(state: &AppState, payload: &ReservePayload, disk_name: &str) -> ReservationResult<()> {
    let volume = state
        .volumes
        .get_by_user_and_name(&payload.user_id, disk_name)
        .await?
        .ok_or_else(|| ReservationError::UserFatal(format!("unknown disk: {disk_name}")))?;

    if volume.reservation_id == Some(Uuid::parse_str(&payload.reservation_id).unwrap_or_default()) && volume.in_use {
        return Ok(());
    }

    let txn = transaction_scope(&state.db).await.map_err(|e| ReservationError::Database(e.to_string()))?;
    let reservation_uuid = Uuid::parse_str(&payload.reservation_id)
        .map_err(|_| ReservationError::UserFatal("reservation id is not a uuid".to_string()))?;

    let outcome = domain_volumes::txn::bind_volume(&txn, volume.id, reservation_uuid).await;

    match outcome {
        Ok(BindOutcome::Bound) => {
            txn.commit().await.map_err(|e| ReservationError::Database(e.to_string()))?;
            Ok(())
        }
        Ok(BindOutcome::AlreadyInUse) | Ok(BindOutcome::Deleted) => {
            let _ = txn.rollback().await;
            fail_reservation(state, &payload.reservation_id, "disk in use").await?;
            Err(ReservationError::UserFatal("disk in use".to_string()))
        }
        Ok(BindOutcome::LockUnavailable) => {
            let _ = txn.rollback().await;
            Err(ReservationError::Contention(format!("disk {disk_name} is locked")))
        }
        Ok(BindOutcome::NotFound) => {
            let _ = txn.rollback().await;
            Err(ReservationError::UserFatal(format!("unknown disk: {disk_name}")))
        }
        Err(e) => {
            let _ = txn.rollback().await;
            Err(e.into())
        }
    }
}

async fn fail_reservation(state: &AppState, reservation_id: &str, reason: &str) -> ReservationResult<()> {
    let now = Utc::now();
    state
        .reservations
        .apply_patch(
            reservation_id,
            ReservationPatch {
                status: Some(ReservationStatus::Failed),
                append_history: Some(StatusHistoryEntry {
                    status: ReservationStatus::Failed,
                    timestamp: now,
                    detail: Some(reason.to_string()),
                }),
                failure_reason: Some(reason.to_string()),
                ..Default::default()
            },
        )
        .await
}

/// Poll pod status until it reaches a terminal scheduling outcome or the
/// ceiling expires, then TCP-probe the node before writing `active` — only
/// a reachable node counts as ready (§4.1 step 4-5).
async fn finalize(state: &AppState, payload: &ReservePayload) -> ReservationResult<()> {
    let reservation = state
        .reservations
        .get_by_id(&payload.reservation_id)
        .await?
        .ok_or_else(|| ReservationError::NotFound(payload.reservation_id.clone()))?;

    let pod_name = reservation
        .pod_name
        .clone()
        .ok_or_else(|| ReservationError::Database("preparing reservation missing pod_name".to_string()))?;
    let namespace = reservation
        .namespace
        .clone()
        .ok_or_else(|| ReservationError::Database("preparing reservation missing namespace".to_string()))?;

    let deadline = std::time::Instant::now() + Duration::from_secs(state.config.prepare_timeout_seconds);
    let mut snapshot: Option<PodStatusSnapshot> = None;

    while std::time::Instant::now() < deadline {
        let status = state.cluster.get_pod_status(&namespace, &pod_name).await?;
        match status {
            Some(s) if matches!(s.phase, PodPhase::Ready) => {
                snapshot = Some(s);
                break;
            }
            Some(s) if matches!(s.phase, PodPhase::Failed) => {
                fail_reservation(
                    state,
                    &payload.reservation_id,
                    s.last_termination_reason.as_deref().unwrap_or("pod failed"),
                )
                .await?;
                return Ok(());
            }
            _ => {
                let jitter_ms = rand::rng().random_range(2_000..=5_000);
                tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
            }
        }
    }

    let snapshot = match snapshot {
        Some(s) => s,
        None => {
            fail_reservation(state, &payload.reservation_id, "pod did not become ready before prepare deadline").await?;
            return Ok(());
        }
    };

    let (node_ip, node_port) = match (snapshot.node_ip, snapshot.node_public_port) {
        (Some(ip), Some(port)) => (ip, port),
        _ => {
            fail_reservation(state, &payload.reservation_id, "pod ready without a node address").await?;
            return Ok(());
        }
    };

    if !tcp_probe(&node_ip, node_port).await {
        fail_reservation(state, &payload.reservation_id, "node unreachable after scheduling").await?;
        return Ok(());
    }

    let now = Utc::now();
    let expiry = now + chrono::Duration::milliseconds((payload.duration_hours * 3_600_000.0) as i64);

    state
        .reservations
        .apply_patch(
            &payload.reservation_id,
            ReservationPatch {
                status: Some(ReservationStatus::Active),
                append_history: Some(StatusHistoryEntry {
                    status: ReservationStatus::Active,
                    timestamp: now,
                    detail: None,
                }),
                launch_time: Some(now),
                expiry_time: Some(expiry),
                node_ip: Some(node_ip),
                node_public_port: Some(node_port),
                ..Default::default()
            },
        )
        .await
}

async fn tcp_probe(host: &str, port: i32) -> bool {
    let Ok(addr): Result<SocketAddr, _> = format!("{host}:{port}").parse() else {
        return false;
    };
    tokio::time::timeout(Duration::from_secs(3), tokio::net::TcpStream::connect(addr))
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false)
}
