use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::VolumeResult;
use crate::models::{CloudVolumeSnapshot, CreateVolume, Volume, VolumeOperationStatus};

/// Read/write access to the volume catalog outside of the bind fast-path
/// (which needs a shared transaction — see `txn::bind_volume`).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VolumeRepository: Send + Sync {
    async fn create(&self, input: CreateVolume) -> VolumeResult<Volume>;

    async fn get_by_id(&self, id: Uuid) -> VolumeResult<Option<Volume>>;

    async fn get_by_user_and_name(&self, user_id: &str, name: &str) -> VolumeResult<Option<Volume>>;

    async fn list_for_user(&self, user_id: &str) -> VolumeResult<Vec<Volume>>;

    /// Non-deleted volumes, for the Availability Reconciler's Phase B sweep.
    async fn list_active(&self) -> VolumeResult<Vec<Volume>>;

    /// `delete_date` is the day the Expiry Engine's retention sweep is
    /// allowed to hard-delete the underlying cloud volume, not the time of
    /// this soft-delete — the caller computes it from the configured
    /// retention window.
    async fn mark_deleted(&self, id: Uuid, delete_date: DateTime<Utc>) -> VolumeResult<()>;

    async fn release(&self, id: Uuid) -> VolumeResult<()>;

    /// Overwrite the cloud-sourced columns after reconciling against the
    /// adapter's authoritative listing. Deliberately leaves
    /// `operation_status` untouched — see `mark_operation_status`.
    async fn apply_cloud_snapshot(&self, id: Uuid, snapshot: CloudVolumeSnapshot) -> VolumeResult<()>;

    /// Advance the `pending -> in_progress -> completed` disk-create
    /// lifecycle tracked on the volume row, driven by the Reservation
    /// Processor's `DiskCreate` handler.
    async fn mark_operation_status(&self, id: Uuid, status: VolumeOperationStatus) -> VolumeResult<()>;

    /// Soft-deleted volumes whose retention window has elapsed, for the
    /// Expiry Engine's hard-deletion sweep.
    async fn list_for_hard_deletion(&self, as_of: DateTime<Utc>) -> VolumeResult<Vec<Volume>>;

    /// Remove the row entirely after the underlying cloud volume has been
    /// deleted.
    async fn purge(&self, id: Uuid) -> VolumeResult<()>;
}
