use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Volume {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub size_gib: i32,
    pub cloud_volume_id: Option<String>,
    pub in_use: bool,
    pub reservation_id: Option<Uuid>,
    pub is_deleted: bool,
    pub delete_date: Option<DateTime<Utc>>,
    pub snapshot_count: i32,
    pub pending_snapshot_count: i32,
    pub last_snapshot_at: Option<DateTime<Utc>>,
    pub last_used: Option<DateTime<Utc>>,
    pub operation_id: Option<String>,
    pub operation_status: Option<VolumeOperationStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeOperationStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl VolumeOperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateVolume {
    pub user_id: String,
    pub name: String,
    pub size_gib: i32,
    pub operation_id: String,
}

/// A record sourced from the Cloud Adapter's authoritative volume listing,
/// used by AR's Phase B reconciliation.
#[derive(Debug, Clone)]
pub struct CloudVolumeSnapshot {
    pub cloud_volume_id: String,
    pub size_gib: i32,
    pub attached: bool,
    pub snapshot_count: i32,
    pub pending_snapshot_count: i32,
    pub last_snapshot_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    Bound,
    AlreadyInUse,
    Deleted,
    LockUnavailable,
    NotFound,
}
