use async_trait::async_trait;

use crate::error::GatewayResult;
use crate::models::{
    JupyterSidecarRequest, JupyterSidecarState, NodeEvent, NodeInfo, PodSpecRequest,
    PodStatusSnapshot,
};

/// Abstraction over the container-orchestration API (§2). RP uses this for
/// both scheduling decisions and execution; AR uses it to read node/pod
/// state for reconciliation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterGateway: Send + Sync {
    /// Idempotent: a retried create for a pod name that already exists
    /// returns the existing pod rather than erroring (§4.1's idempotence
    /// requirement — pod names are a deterministic hash of reservation_id).
    async fn create_pod(&self, request: PodSpecRequest) -> GatewayResult<()>;

    async fn delete_pod(&self, namespace: &str, pod_name: &str) -> GatewayResult<()>;

    async fn get_pod_status(&self, namespace: &str, pod_name: &str) -> GatewayResult<Option<PodStatusSnapshot>>;

    async fn list_nodes_for_tag(&self, tag_label: &str) -> GatewayResult<Vec<NodeInfo>>;

    /// Recent events for the owning pod, used by EE's OOM detection.
    async fn pod_events(&self, namespace: &str, pod_name: &str) -> GatewayResult<Vec<NodeEvent>>;

    async fn pod_logs(&self, namespace: &str, pod_name: &str, tail_lines: i64) -> GatewayResult<String>;

    async fn configure_jupyter_sidecar(
        &self,
        request: JupyterSidecarRequest,
    ) -> GatewayResult<JupyterSidecarState>;

    /// Persistent-volume primitive CG exposes for disk create/delete;
    /// `DiskCreate`/`DiskDelete` route through it rather than CA (§2: CA
    /// never issues volume create/delete directly).
    async fn create_persistent_volume(&self, name: &str, size_gib: i32) -> GatewayResult<String>;

    async fn delete_persistent_volume(&self, cloud_volume_id: &str) -> GatewayResult<()>;

    /// Write a file into a running pod, used by EE's warning ladder.
    async fn write_file(&self, namespace: &str, pod_name: &str, path: &str, contents: &str) -> GatewayResult<()>;

    /// Broadcast a message to all open terminals in a pod.
    async fn broadcast_message(&self, namespace: &str, pod_name: &str, message: &str) -> GatewayResult<()>;

    /// Write SSH key material into a running pod, used by `AddUser`.
    async fn write_ssh_key(&self, namespace: &str, pod_name: &str, public_key: &str) -> GatewayResult<()>;
}
