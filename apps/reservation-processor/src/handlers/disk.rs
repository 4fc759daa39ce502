//! `DiskCreate`/`DiskDelete` handlers.
//!
//! Both route through the Cluster Gateway's persistent-volume primitive
//! (`create_persistent_volume`/`delete_persistent_volume`) rather than the
//! Cloud Adapter directly — CA's role is read-only discovery and snapshot
//! management, not volume lifecycle.

use chrono::Utc;
use domain_reservations::ReservationResult;
use domain_volumes::{CreateVolume, VolumeOperationStatus};

use super::shared::AppState;

pub async fn handle_disk_create(
    state: &AppState,
    disk_name: &str,
    user_id: &str,
    size_gib: i32,
    operation_id: &str,
) -> ReservationResult<()> {
    let existing = state.volumes.get_by_user_and_name(user_id, disk_name).await?;
    let volume = match existing {
        Some(v) => v,
        None => {
            state
                .volumes
                .create(CreateVolume {
                    user_id: user_id.to_string(),
                    name: disk_name.to_string(),
                    size_gib,
                    operation_id: operation_id.to_string(),
                })
                .await?
        }
    };

    if volume.cloud_volume_id.is_some() {
        return Ok(());
    }

    state
        .volumes
        .mark_operation_status(volume.id, VolumeOperationStatus::InProgress)
        .await?;

    let cloud_volume_id = state
        .cluster
        .create_persistent_volume(disk_name, size_gib)
        .await?;

    state
        .volumes
        .apply_cloud_snapshot(
            volume.id,
            domain_volumes::CloudVolumeSnapshot {
                cloud_volume_id,
                size_gib,
                attached: false,
                snapshot_count: 0,
                pending_snapshot_count: 0,
                last_snapshot_at: None,
            },
        )
        .await?;

    state
        .volumes
        .mark_operation_status(volume.id, VolumeOperationStatus::Completed)
        .await?;

    Ok(())
}

/// Soft-delete: snapshot the volume, mark it deleted, and schedule the
/// hard delete for `volume_soft_delete_retention_days` out — the Expiry
/// Engine's retention sweep performs the actual cloud deletion (§4.3).
pub async fn handle_disk_delete(
    state: &AppState,
    disk_name: &str,
    user_id: &str,
    _operation_id: &str,
) -> ReservationResult<()> {
    let volume = state
        .volumes
        .get_by_user_and_name(user_id, disk_name)
        .await?
        .ok_or_else(|| domain_reservations::ReservationError::UserFatal(format!("unknown disk: {disk_name}")))?;

    if volume.is_deleted {
        return Ok(());
    }

    if let Some(cloud_volume_id) = &volume.cloud_volume_id {
        state.cloud.create_snapshot(cloud_volume_id).await?;
    }

    let delete_date = Utc::now() + chrono::Duration::days(state.config.volume_soft_delete_retention_days);
    state.volumes.mark_deleted(volume.id, delete_date).await?;

    Ok(())
}
