//! Reconciliation passes that bring the GPU-type catalog and the volume
//! catalog back in line with cluster and cloud ground truth.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use cloud_adapter::{CloudAdapter, CloudVolume};
use cluster_gateway::{ClusterGateway, NodeInfo};
use domain_gpu_types::{AvailabilityUpdate, GpuType, GpuTypeRepository};
use domain_volumes::{CloudVolumeSnapshot, CreateVolume, Volume, VolumeOperationStatus, VolumeRepository};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::config::Config;

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub aws_volumes: usize,
    pub db_records: usize,
    pub synced: usize,
    pub updated: usize,
    pub created: usize,
    pub errors: usize,
}

pub struct Reconciler {
    pub gpu_types: Arc<dyn GpuTypeRepository>,
    pub volumes: Arc<dyn VolumeRepository>,
    pub cluster: Arc<dyn ClusterGateway>,
    pub cloud: Arc<dyn CloudAdapter>,
    pub config: Arc<Config>,
}

/// Pure arithmetic for one GPU-type tag's Phase A row — kept free of I/O so
/// the boundary behaviours from the floor/cap rules are directly testable.
pub fn compute_phase_a(
    gpu_type: &GpuType,
    in_service_instances: i32,
    nodes: &[NodeInfo],
    high_end_gpu_tags: &HashSet<String>,
    cpu_users_per_node: i32,
    max_multinode_nodes: i32,
) -> AvailabilityUpdate {
    let used: i32 = nodes.iter().map(|n| n.requested_gpus_by_running_pods).sum();
    let total = in_service_instances * gpu_type.max_gpus_per_node;
    let available = (total - used).max(0);

    let full_nodes_available =
        nodes.iter().filter(|n| n.requested_gpus_by_running_pods == 0).count() as i32;

    let max_on_single_node_available =
        nodes.iter().map(|n| (n.allocatable_gpus - n.requested_gpus_by_running_pods).max(0)).max().unwrap_or(0);

    let max_reservable = if gpu_type.is_cpu_only() {
        let has_free_slot =
            nodes.iter().any(|n| n.requested_gpus_by_running_pods < cpu_users_per_node);
        if has_free_slot { 1 } else { 0 }
    } else if high_end_gpu_tags.contains(&gpu_type.tag) {
        let capped_nodes = full_nodes_available.min(max_multinode_nodes);
        (capped_nodes * gpu_type.max_gpus_per_node).max(max_on_single_node_available)
    } else {
        max_on_single_node_available
    };

    AvailabilityUpdate {
        tag: gpu_type.tag.clone(),
        total_cluster_gpus: total,
        available_gpus: available,
        max_reservable,
        full_nodes_available,
        running_instances: in_service_instances,
        updated_by: "availability-reconciler".to_string(),
    }
}

/// Classification of one cloud volume against the database's view of it,
/// for Phase B. Kept as plain data so the matching logic is unit-testable
/// without a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeReconcileAction {
    /// Present in the cloud, unknown to the database.
    Insert,
    /// Known and already soft-deleted; absence from the cloud is expected.
    NoOp,
    /// Present on both sides; refresh the cloud-sourced columns.
    Refresh(uuid::Uuid),
}

pub fn classify_volume(cloud_volume_id: &str, db_volumes: &[Volume]) -> VolumeReconcileAction {
    match db_volumes.iter().find(|v| v.cloud_volume_id.as_deref() == Some(cloud_volume_id)) {
        Some(v) if v.is_deleted => VolumeReconcileAction::NoOp,
        Some(v) => VolumeReconcileAction::Refresh(v.id),
        None => VolumeReconcileAction::Insert,
    }
}

/// DB-side volumes with a `cloud_volume_id` that never showed up in this
/// cloud listing — the "in SS, not in CA" case of Phase B.
pub fn volumes_missing_from_cloud<'a>(
    db_volumes: &'a [Volume],
    cloud_volume_ids: &HashSet<&str>,
) -> Vec<&'a Volume> {
    db_volumes
        .iter()
        .filter(|v| !v.is_deleted)
        .filter(|v| match v.cloud_volume_id.as_deref() {
            Some(id) => !cloud_volume_ids.contains(id),
            None => false,
        })
        .collect()
}

impl Reconciler {
    #[instrument(skip(self))]
    pub async fn run_phase_a(&self) -> RunStats {
        let mut stats = RunStats::default();

        let gpu_types = match self.gpu_types.list().await {
            Ok(types) => types,
            Err(err) => {
                warn!(error = %err, "failed to list gpu types, skipping phase A");
                stats.errors += 1;
                return stats;
            }
        };

        for gpu_type in gpu_types {
            match self.reconcile_one_tag(&gpu_type).await {
                Ok(()) => stats.synced += 1,
                Err(err) => {
                    warn!(tag = %gpu_type.tag, error = %err, "phase A tag reconciliation failed");
                    stats.errors += 1;
                }
            }
        }

        info!(synced = stats.synced, errors = stats.errors, "phase A complete");
        stats
    }

    async fn reconcile_one_tag(&self, gpu_type: &GpuType) -> eyre::Result<()> {
        let name_pattern = format!("{}-gpu-nodes-{}*", self.config.asg_name_prefix, gpu_type.tag);
        let asg_counts = self.cloud.describe_asg_instance_counts(&name_pattern).await?;
        let in_service_instances: i32 = asg_counts.iter().map(|a| a.in_service_instances).sum();

        let nodes = self.cluster.list_nodes_for_tag(&gpu_type.tag).await?;

        let update = compute_phase_a(
            gpu_type,
            in_service_instances,
            &nodes,
            &self.config.high_end_gpu_tags,
            self.config.cpu_users_per_node,
            self.config.max_multinode_nodes,
        );

        self.gpu_types.apply_availability_update(update).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn run_phase_b(&self) -> RunStats {
        let mut stats = RunStats::default();

        let cloud_volumes = match self.cloud.list_tagged_volumes(&self.config.volume_tag_key, &self.config.volume_tag_value).await {
            Ok(v) => v,
            Err(err) => {
                warn!(error = %err, "failed to list tagged cloud volumes, skipping phase B");
                stats.errors += 1;
                return stats;
            }
        };
        stats.aws_volumes = cloud_volumes.len();

        let db_volumes = match self.volumes.list_active().await {
            Ok(v) => v,
            Err(err) => {
                warn!(error = %err, "failed to list active volumes, skipping phase B");
                stats.errors += 1;
                return stats;
            }
        };
        stats.db_records = db_volumes.len();

        let cloud_ids: HashSet<&str> = cloud_volumes.iter().map(|v| v.cloud_volume_id.as_str()).collect();

        for cloud_volume in &cloud_volumes {
            match classify_volume(&cloud_volume.cloud_volume_id, &db_volumes) {
                VolumeReconcileAction::Insert => match self.insert_discovered_volume(cloud_volume).await {
                    Ok(()) => stats.created += 1,
                    Err(err) => {
                        warn!(cloud_volume_id = %cloud_volume.cloud_volume_id, error = %err, "failed to insert discovered volume");
                        stats.errors += 1;
                    }
                },
                VolumeReconcileAction::Refresh(id) => match self.refresh_volume(id, cloud_volume).await {
                    Ok(()) => stats.updated += 1,
                    Err(err) => {
                        warn!(volume_id = %id, error = %err, "failed to refresh volume");
                        stats.errors += 1;
                    }
                },
                VolumeReconcileAction::NoOp => {}
            }
        }

        for missing in volumes_missing_from_cloud(&db_volumes, &cloud_ids) {
            match self.volumes.release(missing.id).await {
                Ok(()) => stats.updated += 1,
                Err(err) => {
                    warn!(volume_id = %missing.id, error = %err, "failed to mark volume as detached");
                    stats.errors += 1;
                }
            }
        }

        info!(
            aws_volumes = stats.aws_volumes,
            db_records = stats.db_records,
            created = stats.created,
            updated = stats.updated,
            errors = stats.errors,
            "phase B complete"
        );
        stats
    }

    async fn insert_discovered_volume(&self, cloud_volume: &CloudVolume) -> eyre::Result<()> {
        let user_id = cloud_volume.tags.get("owner-user-id").cloned().unwrap_or_else(|| "unknown".to_string());
        let name = cloud_volume.tags.get("volume-name").cloned().unwrap_or_else(|| cloud_volume.cloud_volume_id.clone());

        let created = self
            .volumes
            .create(CreateVolume {
                user_id,
                name,
                size_gib: cloud_volume.size_gib,
                operation_id: format!("ar-discovered-{}", cloud_volume.cloud_volume_id),
            })
            .await?;

        self.volumes.mark_operation_status(created.id, VolumeOperationStatus::Completed).await?;
        self.apply_snapshot(created.id, cloud_volume).await
    }

    async fn refresh_volume(&self, id: uuid::Uuid, cloud_volume: &CloudVolume) -> eyre::Result<()> {
        self.apply_snapshot(id, cloud_volume).await
    }

    async fn apply_snapshot(&self, id: uuid::Uuid, cloud_volume: &CloudVolume) -> eyre::Result<()> {
        self.volumes
            .apply_cloud_snapshot(
                id,
                CloudVolumeSnapshot {
                    cloud_volume_id: cloud_volume.cloud_volume_id.clone(),
                    size_gib: cloud_volume.size_gib,
                    attached: cloud_volume.attached,
                    snapshot_count: cloud_volume.snapshot_count,
                    pending_snapshot_count: cloud_volume.pending_snapshot_count,
                    last_snapshot_at: cloud_volume.last_snapshot_at,
                },
            )
            .await?;
        Ok(())
    }

    pub async fn run_tick(&self) -> (RunStats, RunStats) {
        let started = Utc::now();
        let phase_a = self.run_phase_a().await;
        let phase_b = self.run_phase_b().await;
        info!(elapsed_ms = (Utc::now() - started).num_milliseconds(), "reconciliation tick complete");
        (phase_a, phase_b)
    }
}
