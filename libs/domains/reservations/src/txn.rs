//! Transaction-scoped reservation writes.
//!
//! `apply_patch_on` is generic over `ConnectionTrait` so it can run against
//! either a pooled `DatabaseConnection` (the common case, via
//! `postgres::PgReservationRepository::apply_patch`) or a borrowed
//! `&DatabaseTransaction` when it must commit atomically alongside other
//! writes — see the nested-scope trap in `database::postgres::scope`. The
//! admission path (`admit`) is the reason this module exists: it must move
//! the reservation to `pending` and decrement the GPU-type row's
//! `available_gpus` in one transaction.

use sea_orm::{ActiveValue::Set, ConnectionTrait, DatabaseTransaction, EntityTrait};

use crate::entity;
use crate::error::{ReservationError, ReservationResult};
use crate::models::{AdmitOutcome, ReservationPatch, ReservationStatus, StatusHistoryEntry};

pub async fn apply_patch_on<C: ConnectionTrait>(
    conn: &C,
    id: &str,
    patch: ReservationPatch,
) -> ReservationResult<()> {
    let existing = entity::Entity::find_by_id(id.to_string())
        .one(conn)
        .await?
        .ok_or_else(|| ReservationError::NotFound(id.to_string()))?;

    let mut active = entity::ActiveModel {
        id: Set(id.to_string()),
        ..Default::default()
    };

    if let Some(status) = patch.status {
        active.status = Set(status.as_str().to_string());
    }
    if let Some(entry) = patch.append_history {
        let mut history: Vec<StatusHistoryEntry> =
            serde_json::from_value(existing.status_history).unwrap_or_default();
        history.push(entry);
        active.status_history = Set(serde_json::to_value(history).unwrap());
    }
    if let Some(v) = patch.launch_time {
        active.launch_time = Set(Some(v.into()));
    }
    if let Some(v) = patch.expiry_time {
        active.expiry_time = Set(Some(v.into()));
    }
    if let Some(v) = patch.reservation_ended {
        active.reservation_ended = Set(Some(v.into()));
    }
    if let Some(v) = patch.pod_name {
        active.pod_name = Set(Some(v));
    }
    if let Some(v) = patch.namespace {
        active.namespace = Set(Some(v));
    }
    if let Some(v) = patch.node_ip {
        active.node_ip = Set(Some(v));
    }
    if let Some(v) = patch.node_public_port {
        active.node_public_port = Set(Some(v));
    }
    if let Some(v) = patch.node_private_ip {
        active.node_private_ip = Set(Some(v));
    }
    if let Some(v) = patch.jupyter_url {
        active.jupyter_url = Set(v);
    }
    if let Some(v) = patch.jupyter_port {
        active.jupyter_port = Set(v);
    }
    if let Some(v) = patch.jupyter_token {
        active.jupyter_token = Set(v);
    }
    if let Some(v) = patch.jupyter_error {
        active.jupyter_error = Set(v);
    }
    if let Some(v) = patch.volume_id {
        active.volume_id = Set(v);
    }
    if let Some(v) = patch.oom_count {
        active.oom_count = Set(v);
    }
    if let Some(v) = patch.last_oom_at {
        active.last_oom_at = Set(Some(v.into()));
    }
    if let Some(v) = patch.oom_container {
        active.oom_container = Set(Some(v));
    }
    if let Some(v) = patch.warnings_sent {
        active.warnings_sent = Set(serde_json::to_value(v).unwrap());
    }
    if let Some(v) = patch.last_warning_at {
        active.last_warning_at = Set(Some(v.into()));
    }
    if let Some(v) = patch.secondary_users {
        active.secondary_users = Set(serde_json::to_value(v).unwrap());
    }
    if let Some(v) = patch.failure_reason {
        active.failure_reason = Set(Some(v));
    }

    entity::Entity::update(active).exec(conn).await?;
    Ok(())
}

/// Admission: lock the GPU-type row, decrement on success, and move the
/// reservation `queued -> pending` in the same transaction. Returns
/// `Backpressure` (no write at all) when capacity is unavailable, so the
/// caller leaves the message queued rather than dequeuing it.
pub async fn admit(
    txn: &DatabaseTransaction,
    reservation_id: &str,
    gpu_type_tag: &str,
    gpu_count: i32,
    is_multinode: bool,
    lock_timeout_ms: u64,
) -> ReservationResult<AdmitOutcome> {
    let decision = domain_gpu_types::txn::lock_and_decrement(
        txn,
        gpu_type_tag,
        gpu_count,
        is_multinode,
        lock_timeout_ms,
    )
    .await?;

    match decision {
        domain_gpu_types::AdmissionDecision::InsufficientCapacity => Ok(AdmitOutcome::Backpressure),
        domain_gpu_types::AdmissionDecision::Admitted => {
            let now = chrono::Utc::now();
            let patch = ReservationPatch {
                status: Some(ReservationStatus::Pending),
                append_history: Some(StatusHistoryEntry {
                    status: ReservationStatus::Pending,
                    timestamp: now,
                    detail: None,
                }),
                ..Default::default()
            };
            apply_patch_on(txn, reservation_id, patch).await?;
            Ok(AdmitOutcome::Admitted)
        }
    }
}
