use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct CloudVolume {
    pub cloud_volume_id: String,
    pub size_gib: i32,
    pub attached: bool,
    pub snapshot_count: i32,
    pub pending_snapshot_count: i32,
    pub last_snapshot_at: Option<DateTime<Utc>>,
    pub tags: std::collections::HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct CloudSnapshot {
    pub snapshot_id: String,
    pub volume_id: String,
    pub state: SnapshotState,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotState {
    Pending,
    Completed,
    Error,
}

#[derive(Debug, Clone)]
pub struct AutoScalingGroupCount {
    pub name: String,
    pub in_service_instances: i32,
}
