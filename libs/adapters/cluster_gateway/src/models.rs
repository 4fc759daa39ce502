use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Everything RP needs to materialise a pod for one reservation (§4.1 step 2).
#[derive(Debug, Clone)]
pub struct PodSpecRequest {
    pub pod_name: String,
    pub namespace: String,
    pub instance_selector_label: String,
    pub image: String,
    pub env_vars: HashMap<String, String>,
    pub ssh_public_key: Option<String>,
    pub cpu_millis: i64,
    pub memory_mb: i64,
    pub jupyter_sidecar: bool,
    pub preserve_entrypoint: bool,
    pub reservation_id: String,
    pub owner_user_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Scheduled,
    Ready,
    Failed,
    Succeeded,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct PodStatusSnapshot {
    pub phase: PodPhase,
    pub node_ip: Option<String>,
    pub node_public_port: Option<i32>,
    pub restart_count: i32,
    pub last_termination_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub name: String,
    pub labels: HashMap<String, String>,
    pub allocatable_gpus: i32,
    pub requested_gpus_by_running_pods: i32,
}

#[derive(Debug, Clone)]
pub struct NodeEvent {
    pub node_name: String,
    pub pod_name: Option<String>,
    pub reason: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct JupyterSidecarRequest {
    pub pod_name: String,
    pub namespace: String,
    pub enable: bool,
}

#[derive(Debug, Clone)]
pub struct JupyterSidecarState {
    pub url: String,
    pub port: i32,
    pub token: String,
}
