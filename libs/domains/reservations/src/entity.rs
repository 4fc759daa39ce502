use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, serde::Serialize, serde::Deserialize)]
#[sea_orm(table_name = "reservations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub status: String,
    pub gpu_type: String,
    pub gpu_count: i32,
    pub instance_type: String,
    pub duration_hours: f64,
    pub created_at: DateTimeWithTimeZone,
    pub launch_time: Option<DateTimeWithTimeZone>,
    pub expiry_time: Option<DateTimeWithTimeZone>,
    pub reservation_ended: Option<DateTimeWithTimeZone>,
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
    pub volume_id: Option<Uuid>,
    pub status_history: Json,
    pub oom_count: i32,
    pub last_oom_at: Option<DateTimeWithTimeZone>,
    pub oom_container: Option<String>,
    pub warnings_sent: Json,
    pub last_warning_at: Option<DateTimeWithTimeZone>,
    pub is_multinode: bool,
    pub master_reservation_id: Option<String>,
    pub node_index: Option<i32>,
    pub total_nodes: Option<i32>,
    pub secondary_users: Json,
    pub alb_arn: Option<String>,
    pub nlb_arn: Option<String>,
    pub jupyter_subdomain: Option<String>,
    pub failure_reason: Option<String>,
    pub env_vars: Json,
    pub image: String,
    pub preserve_entrypoint: bool,
    pub github_user: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for crate::models::Reservation {
    fn from(m: Model) -> Self {
        let status_history: Vec<crate::models::StatusHistoryEntry> =
            serde_json::from_value(m.status_history).unwrap_or_default();
        let warnings_sent: crate::models::WarningsSent =
            serde_json::from_value(m.warnings_sent).unwrap_or_default();
        let secondary_users: Vec<String> =
            serde_json::from_value(m.secondary_users).unwrap_or_default();
        let env_vars: HashMap<String, String> = serde_json::from_value(m.env_vars).unwrap_or_default();

        Self {
            id: m.id,
            user_id: m.user_id,
            status: crate::models::ReservationStatus::parse(&m.status)
                .expect("status column holds a value this core itself wrote"),
            gpu_type: m.gpu_type,
            gpu_count: m.gpu_count,
            instance_type: m.instance_type,
            duration_hours: m.duration_hours,
            created_at: m.created_at.into(),
            launch_time: m.launch_time.map(Into::into),
            expiry_time: m.expiry_time.map(Into::into),
            reservation_ended: m.reservation_ended.map(Into::into),
            pod_name: m.pod_name,
            namespace: m.namespace,
            node_ip: m.node_ip,
            node_public_port: m.node_public_port,
            node_private_ip: m.node_private_ip,
            jupyter_enabled: m.jupyter_enabled,
            jupyter_url: m.jupyter_url,
            jupyter_port: m.jupyter_port,
            jupyter_token: m.jupyter_token,
            jupyter_error: m.jupyter_error,
            volume_id: m.volume_id,
            status_history,
            oom_count: m.oom_count,
            last_oom_at: m.last_oom_at.map(Into::into),
            oom_container: m.oom_container,
            warnings_sent,
            last_warning_at: m.last_warning_at.map(Into::into),
            is_multinode: m.is_multinode,
            master_reservation_id: m.master_reservation_id,
            node_index: m.node_index,
            total_nodes: m.total_nodes,
            secondary_users,
            alb_arn: m.alb_arn,
            nlb_arn: m.nlb_arn,
            jupyter_subdomain: m.jupyter_subdomain,
            failure_reason: m.failure_reason,
            env_vars,
            image: m.image,
            preserve_entrypoint: m.preserve_entrypoint,
            github_user: m.github_user,
        }
    }
}

impl From<crate::models::CreateReservation> for ActiveModel {
    fn from(input: crate::models::CreateReservation) -> Self {
        let now = chrono::Utc::now();
        let history = vec![crate::models::StatusHistoryEntry {
            status: crate::models::ReservationStatus::Queued,
            timestamp: now,
            detail: None,
        }];

        ActiveModel {
            id: Set(input.id),
            user_id: Set(input.user_id),
            status: Set(crate::models::ReservationStatus::Queued.as_str().to_string()),
            gpu_type: Set(input.gpu_type),
            gpu_count: Set(input.gpu_count),
            instance_type: Set(input.instance_type),
            duration_hours: Set(input.duration_hours),
            created_at: Set(now.into()),
            launch_time: Set(None),
            expiry_time: Set(None),
            reservation_ended: Set(None),
            pod_name: Set(None),
            namespace: Set(None),
            node_ip: Set(None),
            node_public_port: Set(None),
            node_private_ip: Set(None),
            jupyter_enabled: Set(input.jupyter_enabled),
            jupyter_url: Set(None),
            jupyter_port: Set(None),
            jupyter_token: Set(None),
            jupyter_error: Set(None),
            volume_id: Set(None),
            status_history: Set(serde_json::to_value(history).unwrap()),
            oom_count: Set(0),
            last_oom_at: Set(None),
            oom_container: Set(None),
            warnings_sent: Set(serde_json::to_value(crate::models::WarningsSent::default()).unwrap()),
            last_warning_at: Set(None),
            is_multinode: Set(input.is_multinode),
            master_reservation_id: Set(input.master_reservation_id),
            node_index: Set(input.node_index),
            total_nodes: Set(input.total_nodes),
            secondary_users: Set(serde_json::to_value(Vec::<String>::new()).unwrap()),
            alb_arn: Set(None),
            nlb_arn: Set(None),
            jupyter_subdomain: Set(None),
            failure_reason: Set(None),
            env_vars: Set(serde_json::to_value(input.env_vars).unwrap()),
            image: Set(input.image),
            preserve_entrypoint: Set(input.preserve_entrypoint),
            github_user: Set(input.github_user),
        }
    }
}
