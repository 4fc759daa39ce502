use async_trait::async_trait;

use crate::error::GpuTypeResult;
use crate::models::{AvailabilityUpdate, GpuType};

/// Read/write access to the GPU-type catalog outside of the admission
/// fast-path (which needs a shared transaction — see `txn::lock_and_decrement`).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GpuTypeRepository: Send + Sync {
    async fn get_by_tag(&self, tag: &str) -> GpuTypeResult<Option<GpuType>>;

    async fn list(&self) -> GpuTypeResult<Vec<GpuType>>;

    /// Overwrite the five availability columns plus attribution in one row
    /// update, as the Availability Reconciler's Phase A does every tick.
    async fn apply_availability_update(&self, update: AvailabilityUpdate) -> GpuTypeResult<()>;
}
