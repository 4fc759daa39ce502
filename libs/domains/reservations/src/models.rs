use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Queued,
    Pending,
    Preparing,
    Active,
    Cancelled,
    Expired,
    Failed,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Pending => "pending",
            Self::Preparing => "preparing",
            Self::Active => "active",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "pending" => Some(Self::Pending),
            "preparing" => Some(Self::Preparing),
            "active" => Some(Self::Active),
            "cancelled" => Some(Self::Cancelled),
            "expired" => Some(Self::Expired),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Expired | Self::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: ReservationStatus,
    pub timestamp: DateTime<Utc>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarningsSent {
    #[serde(rename = "30min")]
    pub thirty_min: bool,
    #[serde(rename = "15min")]
    pub fifteen_min: bool,
    #[serde(rename = "5min")]
    pub five_min: bool,
}

impl Default for WarningsSent {
    fn default() -> Self {
        Self {
            thirty_min: false,
            fifteen_min: false,
            five_min: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: String,
    pub user_id: String,
    pub status: ReservationStatus,
    pub gpu_type: String,
    pub gpu_count: i32,
    pub instance_type: String,
    pub duration_hours: f64,
    pub created_at: DateTime<Utc>,
    pub launch_time: Option<DateTime<Utc>>,
    pub expiry_time: Option<DateTime<Utc>>,
    pub reservation_ended: Option<DateTime<Utc>>,
    pub pod_name: Option<String>,
    pub namespace: Option<String>,
    pub node_ip: Option<String>,
    pub node_public_port: Option<i32>,
    pub node_private_ip: Option<String>,
    pub jupyter_enabled: bool,
    pub jupyter_url: Option<String>,
    pub jupyter_port: Option<i32>,
    pub jupyter_token: Option<String>,
    pub jupyter_error: Option<String>,
    pub volume_id: Option<uuid::Uuid>,
    pub status_history: Vec<StatusHistoryEntry>,
    pub oom_count: i32,
    pub last_oom_at: Option<DateTime<Utc>>,
    pub oom_container: Option<String>,
    pub warnings_sent: WarningsSent,
    pub last_warning_at: Option<DateTime<Utc>>,
    pub is_multinode: bool,
    pub master_reservation_id: Option<String>,
    pub node_index: Option<i32>,
    pub total_nodes: Option<i32>,
    pub secondary_users: Vec<String>,
    pub alb_arn: Option<String>,
    pub nlb_arn: Option<String>,
    pub jupyter_subdomain: Option<String>,
    pub failure_reason: Option<String>,
    pub env_vars: std::collections::HashMap<String, String>,
    pub image: String,
    pub preserve_entrypoint: bool,
    pub github_user: Option<String>,
}

impl Reservation {
    /// Proportional resource request, per §4.1 step 2: CPU/memory scale as
    /// `requested_gpus / max_per_node`.
    pub fn resource_fraction(&self, max_gpus_per_node: i32) -> f64 {
        if max_gpus_per_node <= 0 {
            1.0
        } else {
            self.gpu_count as f64 / max_gpus_per_node as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateReservation {
    pub id: String,
    pub user_id: String,
    pub gpu_type: String,
    pub gpu_count: i32,
    pub instance_type: String,
    pub duration_hours: f64,
    pub image: String,
    pub disk_name: Option<String>,
    pub env_vars: std::collections::HashMap<String, String>,
    pub jupyter_enabled: bool,
    pub preserve_entrypoint: bool,
    pub github_user: Option<String>,
    pub is_multinode: bool,
    pub total_nodes: Option<i32>,
    pub node_index: Option<i32>,
    pub master_reservation_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitOutcome {
    Admitted,
    Backpressure,
}

/// Partial update applied through `ReservationRepository::apply_patch`.
/// `None` leaves a column untouched; every handler builds one of these
/// rather than exposing a setter per column.
#[derive(Debug, Clone, Default)]
pub struct ReservationPatch {
    pub status: Option<ReservationStatus>,
    pub append_history: Option<StatusHistoryEntry>,
    pub launch_time: Option<DateTime<Utc>>,
    pub expiry_time: Option<DateTime<Utc>>,
    pub reservation_ended: Option<DateTime<Utc>>,
    pub pod_name: Option<String>,
    pub namespace: Option<String>,
    pub node_ip: Option<String>,
    pub node_public_port: Option<i32>,
    pub node_private_ip: Option<String>,
    pub jupyter_url: Option<Option<String>>,
    pub jupyter_port: Option<Option<i32>>,
    pub jupyter_token: Option<Option<String>>,
    pub jupyter_error: Option<Option<String>>,
    pub volume_id: Option<Option<uuid::Uuid>>,
    pub oom_count: Option<i32>,
    pub last_oom_at: Option<DateTime<Utc>>,
    pub oom_container: Option<String>,
    pub warnings_sent: Option<WarningsSent>,
    pub last_warning_at: Option<DateTime<Utc>>,
    pub secondary_users: Option<Vec<String>>,
    pub failure_reason: Option<String>,
}
