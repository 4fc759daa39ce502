use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, serde::Serialize, serde::Deserialize)]
#[sea_orm(table_name = "volumes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub size_gib: i32,
    pub cloud_volume_id: Option<String>,
    pub in_use: bool,
    pub reservation_id: Option<Uuid>,
    pub is_deleted: bool,
    pub delete_date: Option<DateTimeWithTimeZone>,
    pub snapshot_count: i32,
    pub pending_snapshot_count: i32,
    pub last_snapshot_at: Option<DateTimeWithTimeZone>,
    pub last_used: Option<DateTimeWithTimeZone>,
    pub operation_id: Option<String>,
    pub operation_status: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for crate::models::Volume {
    fn from(m: Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            name: m.name,
            size_gib: m.size_gib,
            cloud_volume_id: m.cloud_volume_id,
            in_use: m.in_use,
            reservation_id: m.reservation_id,
            is_deleted: m.is_deleted,
            delete_date: m.delete_date.map(Into::into),
            snapshot_count: m.snapshot_count,
            pending_snapshot_count: m.pending_snapshot_count,
            last_snapshot_at: m.last_snapshot_at.map(Into::into),
            last_used: m.last_used.map(Into::into),
            operation_id: m.operation_id,
            operation_status: m
                .operation_status
                .as_deref()
                .and_then(crate::models::VolumeOperationStatus::parse),
            created_at: m.created_at.into(),
            updated_at: m.updated_at.into(),
        }
    }
}

impl From<crate::models::CreateVolume> for ActiveModel {
    fn from(input: crate::models::CreateVolume) -> Self {
        let now = chrono::Utc::now();
        ActiveModel {
            id: Set(Uuid::now_v7()),
            user_id: Set(input.user_id),
            name: Set(input.name),
            size_gib: Set(input.size_gib),
            cloud_volume_id: Set(None),
            in_use: Set(false),
            reservation_id: Set(None),
            is_deleted: Set(false),
            delete_date: Set(None),
            snapshot_count: Set(0),
            pending_snapshot_count: Set(0),
            last_snapshot_at: Set(None),
            last_used: Set(None),
            operation_id: Set(Some(input.operation_id)),
            operation_status: Set(Some(
                crate::models::VolumeOperationStatus::Pending
                    .as_str()
                    .to_string(),
            )),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
    }
}
