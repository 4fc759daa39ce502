//! Wire format for the `reservations` and `disk-ops` queues (§6).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use stream_worker::StreamJob;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReservationMessage {
    Reserve(ReservePayload),
    Cancel {
        reservation_id: String,
        user_id: String,
    },
    Extend {
        reservation_id: String,
        user_id: String,
        hours: f64,
    },
    EnableJupyter {
        reservation_id: String,
        user_id: String,
    },
    DisableJupyter {
        reservation_id: String,
        user_id: String,
    },
    AddUser {
        reservation_id: String,
        user_id: String,
        external_identifier: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservePayload {
    pub reservation_id: String,
    pub user_id: String,
    pub gpu_type: String,
    pub gpu_count: i32,
    pub instance_type: String,
    pub duration_hours: f64,
    pub image: String,
    pub disk_name: Option<String>,
    pub preserve_entrypoint: bool,
    pub env_vars: HashMap<String, String>,
    pub jupyter_enabled: bool,
    pub github_user: Option<String>,
    pub is_multinode: bool,
    pub total_nodes: Option<i32>,
    pub node_index: Option<i32>,
    pub master_reservation_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DiskOpMessage {
    DiskCreate {
        disk_name: String,
        user_id: String,
        size_gib: i32,
        operation_id: String,
    },
    DiskDelete {
        disk_name: String,
        user_id: String,
        operation_id: String,
    },
}

/// The envelope every message on either queue is wrapped in before
/// reaching a `StreamProcessor` — carries the retry bookkeeping
/// `StreamJob` needs on top of the typed payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationJob {
    pub msg_id: String,
    pub retry_count: u32,
    pub message: ReservationMessage,
}

impl StreamJob for ReservationJob {
    fn job_id(&self) -> String {
        self.msg_id.clone()
    }

    fn retry_count(&self) -> u32 {
        self.retry_count
    }

    fn with_retry(&self) -> Self {
        Self {
            retry_count: self.retry_count + 1,
            ..self.clone()
        }
    }

    fn max_retries(&self) -> u32 {
        3
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskOpJob {
    pub msg_id: String,
    pub retry_count: u32,
    pub message: DiskOpMessage,
}

impl StreamJob for DiskOpJob {
    fn job_id(&self) -> String {
        self.msg_id.clone()
    }

    fn retry_count(&self) -> u32 {
        self.retry_count
    }

    fn with_retry(&self) -> Self {
        Self {
            retry_count: self.retry_count + 1,
            ..self.clone()
        }
    }

    fn max_retries(&self) -> u32 {
        3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_message_round_trips_through_the_tagged_envelope() {
        let msg = ReservationMessage::Reserve(ReservePayload {
            reservation_id: "r1".into(),
            user_id: "u".into(),
            gpu_type: "t4".into(),
            gpu_count: 1,
            instance_type: "g4dn.xlarge".into(),
            duration_hours: 1.0,
            image: "i:1".into(),
            disk_name: None,
            preserve_entrypoint: false,
            env_vars: HashMap::new(),
            jupyter_enabled: false,
            github_user: None,
            is_multinode: false,
            total_nodes: None,
            node_index: None,
            master_reservation_id: None,
        });

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"action\":\"reserve\""));
        let back: ReservationMessage = serde_json::from_str(&json).unwrap();
        matches!(back, ReservationMessage::Reserve(_));
    }

    #[test]
    fn cancel_message_tags_correctly() {
        let msg = ReservationMessage::Cancel {
            reservation_id: "r1".into(),
            user_id: "u".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"action\":\"cancel\""));
    }

    #[test]
    fn job_retry_increments_and_preserves_id() {
        let job = ReservationJob {
            msg_id: "m1".into(),
            retry_count: 0,
            message: ReservationMessage::Cancel {
                reservation_id: "r1".into(),
                user_id: "u".into(),
            },
        };
        let retried = job.with_retry();
        assert_eq!(retried.retry_count, 1);
        assert_eq!(retried.job_id(), "m1");
    }
}
