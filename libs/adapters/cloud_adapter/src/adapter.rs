use async_trait::async_trait;

use crate::error::CloudAdapterResult;
use crate::models::{AutoScalingGroupCount, CloudSnapshot, CloudVolume};

/// Abstraction over the IaaS provider (§2). Never issues volume
/// create/delete directly — those go through the Cluster Gateway's
/// persistent-volume primitive.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CloudAdapter: Send + Sync {
    /// Every cloud volume tagged with the system identifier, for AR's
    /// Phase B reconciliation.
    async fn list_tagged_volumes(&self, tag_key: &str, tag_value: &str) -> CloudAdapterResult<Vec<CloudVolume>>;

    async fn describe_snapshots(&self, volume_id: &str) -> CloudAdapterResult<Vec<CloudSnapshot>>;

    async fn create_snapshot(&self, volume_id: &str) -> CloudAdapterResult<CloudSnapshot>;

    async fn delete_snapshot(&self, snapshot_id: &str) -> CloudAdapterResult<()>;

    /// Hard-delete a cloud volume, used by EE's retention sweep.
    async fn delete_volume(&self, volume_id: &str) -> CloudAdapterResult<()>;

    /// In-service instance counts for every ASG matching
    /// `<prefix>-gpu-nodes-<tag>*`, for AR Phase A.
    async fn describe_asg_instance_counts(&self, name_pattern: &str) -> CloudAdapterResult<Vec<AutoScalingGroupCount>>;
}
