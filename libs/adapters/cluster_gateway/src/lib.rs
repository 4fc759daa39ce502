//! Abstraction over the container-orchestration API (§2's Cluster Gateway).

pub mod error;
pub mod gateway;
pub mod k8s;
pub mod models;

pub use error::{GatewayError, GatewayResult};
pub use gateway::ClusterGateway;
pub use k8s::K8sClusterGateway;
pub use models::{
    JupyterSidecarRequest, JupyterSidecarState, NodeEvent, NodeInfo, PodPhase, PodSpecRequest,
    PodStatusSnapshot,
};
