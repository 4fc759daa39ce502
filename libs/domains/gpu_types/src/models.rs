use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Static and dynamic attributes of one GPU family (or CPU-only tag).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuType {
    pub tag: String,
    pub instance_family: String,
    pub max_gpus_per_node: i32,
    pub cpu_per_instance: i32,
    pub memory_mb_per_instance: i32,
    pub max_multinode_nodes: i32,
    pub total_cluster_gpus: i32,
    pub available_gpus: i32,
    pub max_reservable: i32,
    pub full_nodes_available: i32,
    pub running_instances: i32,
    pub last_availability_update: Option<DateTime<Utc>>,
    pub last_availability_updated_by: Option<String>,
}

impl GpuType {
    /// `0` GPUs per node marks a CPU-only tag (§9 Open Question (b)).
    pub fn is_cpu_only(&self) -> bool {
        self.max_gpus_per_node == 0
    }
}

/// All five availability columns the Availability Reconciler writes in a
/// single row update, plus the attribution fields.
#[derive(Debug, Clone)]
pub struct AvailabilityUpdate {
    pub tag: String,
    pub total_cluster_gpus: i32,
    pub available_gpus: i32,
    pub max_reservable: i32,
    pub full_nodes_available: i32,
    pub running_instances: i32,
    pub updated_by: String,
}

/// Outcome of the optimistic admission decrement: whether capacity was
/// available and, if so, the row lock was already released by commit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    Admitted,
    InsufficientCapacity,
}
