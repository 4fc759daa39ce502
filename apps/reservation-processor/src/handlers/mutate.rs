//! `Cancel`/`Extend`/`EnableJupyter`/`DisableJupyter`/`AddUser` handlers.
//!
//! Cancel and Extend cascade to every sibling sharing a
//! `master_reservation_id` (multi-node reservations are N rows that move
//! together); AddUser deliberately does not — §9 decided it's a per-node
//! operation, not a reservation-wide one.

use chrono::Utc;
use cluster_gateway::JupyterSidecarRequest;
use domain_reservations::state_machine::{can_extend, extension_allowed};
use domain_reservations::{
    Reservation, ReservationError, ReservationPatch, ReservationResult, ReservationStatus,
    StatusHistoryEntry,
};
use serde_json::json;

use super::shared::AppState;
use crate::github_keys;

async fn siblings(state: &AppState, reservation: &Reservation) -> ReservationResult<Vec<Reservation>> {
    match &reservation.master_reservation_id {
        Some(master_id) => state.reservations.list_by_master(master_id).await,
        None => Ok(vec![reservation.clone()]),
    }
}

pub async fn handle_cancel(state: &AppState, reservation_id: &str, user_id: &str) -> ReservationResult<()> {
    let reservation = state
        .reservations
        .get_by_id(reservation_id)
        .await?
        .ok_or_else(|| ReservationError::NotFound(reservation_id.to_string()))?;

    for member in siblings(state, &reservation).await? {
        if member.status.is_terminal() {
            continue;
        }
        cancel_one(state, &member).await?;
    }

    state
        .audit
        .record(domain_audit::NewAuditEntry {
            user_id: user_id.to_string(),
            event_type: "reservation".to_string(),
            action: "cancel".to_string(),
            resource_type: "reservation".to_string(),
            resource_id: reservation_id.to_string(),
            details: json!({}),
            actor_ip: None,
        })
        .await?;

    Ok(())
}

async fn cancel_one(state: &AppState, reservation: &Reservation) -> ReservationResult<()> {
    if let (Some(namespace), Some(pod_name)) = (&reservation.namespace, &reservation.pod_name) {
        state.cluster.delete_pod(namespace, pod_name).await?;
    }

    if let Some(volume_id) = reservation.volume_id {
        let txn = database::postgres::transaction_scope(&state.db)
            .await
            .map_err(|e| ReservationError::Database(e.to_string()))?;
        match domain_volumes::txn::unbind_volume(&txn, volume_id).await {
            Ok(()) => txn.commit().await.map_err(|e| ReservationError::Database(e.to_string()))?,
            Err(e) => {
                let _ = txn.rollback().await;
                return Err(e.into());
            }
        }
    }

    let now = Utc::now();
    state
        .reservations
        .apply_patch(
            &reservation.id,
            ReservationPatch {
                status: Some(ReservationStatus::Cancelled),
                append_history: Some(StatusHistoryEntry {
                    status: ReservationStatus::Cancelled,
                    timestamp: now,
                    detail: None,
                }),
                reservation_ended: Some(now),
                ..Default::default()
            },
        )
        .await
}

pub async fn handle_extend(
    state: &AppState,
    reservation_id: &str,
    _user_id: &str,
    hours: f64,
) -> ReservationResult<()> {
    let reservation = state
        .reservations
        .get_by_id(reservation_id)
        .await?
        .ok_or_else(|| ReservationError::NotFound(reservation_id.to_string()))?;

    if !can_extend(reservation.status) {
        return Err(ReservationError::UserFatal(
            "reservation must be active to be extended".to_string(),
        ));
    }

    let launch_time = reservation
        .launch_time
        .ok_or_else(|| ReservationError::UserFatal("reservation has not launched yet".to_string()))?;

    let current_expiry = reservation
        .expiry_time
        .ok_or_else(|| ReservationError::Database("active reservation missing expiry_time".to_string()))?;
    let new_expiry = current_expiry + chrono::Duration::milliseconds((hours * 3_600_000.0) as i64);

    if !extension_allowed(launch_time, new_expiry, state.config.total_max_hours) {
        return Err(ReservationError::UserFatal(
            "extension would exceed the total reservation time budget".to_string(),
        ));
    }

    for member in siblings(state, &reservation).await? {
        if !can_extend(member.status) {
            return Err(ReservationError::UserFatal(
                "reservation must be active to be extended".to_string(),
            ));
        }
        state
            .reservations
            .apply_patch(
                &member.id,
                ReservationPatch {
                    expiry_time: Some(new_expiry),
                    ..Default::default()
                },
            )
            .await?;
    }

    Ok(())
}

pub async fn handle_enable_jupyter(state: &AppState, reservation_id: &str, _user_id: &str) -> ReservationResult<()> {
    let reservation = state
        .reservations
        .get_by_id(reservation_id)
        .await?
        .ok_or_else(|| ReservationError::NotFound(reservation_id.to_string()))?;

    let namespace = reservation
        .namespace
        .clone()
        .ok_or_else(|| ReservationError::UserFatal("reservation has no pod yet".to_string()))?;
    let pod_name = reservation
        .pod_name
        .clone()
        .ok_or_else(|| ReservationError::UserFatal("reservation has no pod yet".to_string()))?;

    let sidecar = state
        .cluster
        .configure_jupyter_sidecar(JupyterSidecarRequest {
            pod_name: pod_name.clone(),
            namespace: namespace.clone(),
            enable: true,
        })
        .await?;

    state
        .reservations
        .apply_patch(
            reservation_id,
            ReservationPatch {
                jupyter_url: Some(Some(sidecar.url)),
                jupyter_port: Some(Some(sidecar.port)),
                jupyter_token: Some(Some(sidecar.token)),
                jupyter_error: Some(None),
                ..Default::default()
            },
        )
        .await
}

pub async fn handle_disable_jupyter(state: &AppState, reservation_id: &str, _user_id: &str) -> ReservationResult<()> {
    let reservation = state
        .reservations
        .get_by_id(reservation_id)
        .await?
        .ok_or_else(|| ReservationError::NotFound(reservation_id.to_string()))?;

    let namespace = reservation
        .namespace
        .clone()
        .ok_or_else(|| ReservationError::UserFatal("reservation has no pod yet".to_string()))?;
    let pod_name = reservation
        .pod_name
        .clone()
        .ok_or_else(|| ReservationError::UserFatal("reservation has no pod yet".to_string()))?;

    state
        .cluster
        .configure_jupyter_sidecar(JupyterSidecarRequest {
            pod_name,
            namespace,
            enable: false,
        })
        .await?;

    state
        .reservations
        .apply_patch(
            reservation_id,
            ReservationPatch {
                jupyter_url: Some(None),
                jupyter_port: Some(None),
                jupyter_token: Some(None),
                jupyter_error: Some(None),
                ..Default::default()
            },
        )
        .await
}

/// Adds a secondary user's SSH key to a single reservation's pod. Does not
/// cascade to siblings — a multi-node job's secondary users are scoped to
/// the node that was asked for, not the whole job (§9).
pub async fn handle_add_user(
    state: &AppState,
    reservation_id: &str,
    _user_id: &str,
    external_identifier: &str,
) -> ReservationResult<()> {
    let reservation = state
        .reservations
        .get_by_id(reservation_id)
        .await?
        .ok_or_else(|| ReservationError::NotFound(reservation_id.to_string()))?;

    let namespace = reservation
        .namespace
        .clone()
        .ok_or_else(|| ReservationError::UserFatal("reservation has no pod yet".to_string()))?;
    let pod_name = reservation
        .pod_name
        .clone()
        .ok_or_else(|| ReservationError::UserFatal("reservation has no pod yet".to_string()))?;

    let client = reqwest::Client::new();
    let keys = github_keys::fetch_public_keys(&client, &state.config, external_identifier).await?;
    state.cluster.write_ssh_key(&namespace, &pod_name, &keys).await?;

    let mut secondary_users = reservation.secondary_users.clone();
    if !secondary_users.iter().any(|u| u == external_identifier) {
        secondary_users.push(external_identifier.to_string());
    }

    state
        .reservations
        .apply_patch(
            reservation_id,
            ReservationPatch {
                secondary_users: Some(secondary_users),
                ..Default::default()
            },
        )
        .await
}
