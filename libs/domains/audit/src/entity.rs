use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, serde::Serialize, serde::Deserialize)]
#[sea_orm(table_name = "audit_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: String,
    pub event_type: String,
    #[sea_orm(column_type = "Text")]
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub details: Json,
    pub actor_ip: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for crate::models::AuditEntry {
    fn from(m: Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            event_type: m.event_type,
            action: m.action,
            resource_type: m.resource_type,
            resource_id: m.resource_id,
            details: m.details,
            actor_ip: m.actor_ip,
            created_at: m.created_at.into(),
        }
    }
}

impl From<crate::models::NewAuditEntry> for ActiveModel {
    fn from(input: crate::models::NewAuditEntry) -> Self {
        ActiveModel {
            id: Set(Uuid::now_v7()),
            user_id: Set(input.user_id),
            event_type: Set(input.event_type),
            action: Set(input.action),
            resource_type: Set(input.resource_type),
            resource_id: Set(input.resource_id),
            details: Set(input.details),
            actor_ip: Set(input.actor_ip),
            created_at: Set(chrono::Utc::now().into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewAuditEntry;
    use sea_orm::ActiveValue;

    #[test]
    fn new_entry_gets_a_fresh_id_and_carries_fields_through() {
        let input = NewAuditEntry {
            user_id: "user-1".to_string(),
            event_type: "reservation".to_string(),
            action: "admit".to_string(),
            resource_type: "reservation".to_string(),
            resource_id: "res-1".to_string(),
            details: serde_json::json!({"gpu_type": "a100"}),
            actor_ip: Some("10.0.0.1".to_string()),
        };

        let active: ActiveModel = input.into();

        match active.id {
            ActiveValue::Set(id) => assert_eq!(id.get_version_num(), 7),
            other => panic!("expected a set v7 id, got {other:?}"),
        }
        assert_eq!(active.user_id, ActiveValue::Set("user-1".to_string()));
        assert_eq!(active.resource_id, ActiveValue::Set("res-1".to_string()));
        assert_eq!(active.actor_ip, ActiveValue::Set(Some("10.0.0.1".to_string())));
    }

    #[test]
    fn missing_actor_ip_maps_to_none() {
        let input = NewAuditEntry {
            user_id: "user-2".to_string(),
            event_type: "volume".to_string(),
            action: "create".to_string(),
            resource_type: "volume".to_string(),
            resource_id: "vol-1".to_string(),
            details: serde_json::Value::Null,
            actor_ip: None,
        };

        let active: ActiveModel = input.into();
        assert_eq!(active.actor_ip, ActiveValue::Set(None));
    }
}
