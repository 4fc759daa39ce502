use async_trait::async_trait;
use database::BaseRepository;
use sea_orm::{ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::{
    entity,
    error::VolumeResult,
    models::{CloudVolumeSnapshot, CreateVolume, Volume, VolumeOperationStatus},
    repository::VolumeRepository,
};

pub struct PgVolumeRepository {
    base: BaseRepository<entity::Entity>,
}

impl PgVolumeRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

#[async_trait]
impl VolumeRepository for PgVolumeRepository {
    async fn create(&self, input: CreateVolume) -> VolumeResult<Volume> {
        let active: entity::ActiveModel = input.into();
        let model = self.base.insert(active).await?;
        Ok(model.into())
    }

    async fn get_by_id(&self, id: Uuid) -> VolumeResult<Option<Volume>> {
        let model = self.base.find_by_id(id).await?;
        Ok(model.map(Into::into))
    }

    async fn get_by_user_and_name(&self, user_id: &str, name: &str) -> VolumeResult<Option<Volume>> {
        let model = entity::Entity::find()
            .filter(entity::Column::UserId.eq(user_id))
            .filter(entity::Column::Name.eq(name))
            .one(self.base.db())
            .await?;
        Ok(model.map(Into::into))
    }

    async fn list_for_user(&self, user_id: &str) -> VolumeResult<Vec<Volume>> {
        let models = entity::Entity::find()
            .filter(entity::Column::UserId.eq(user_id))
            .filter(entity::Column::IsDeleted.eq(false))
            .all(self.base.db())
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn list_active(&self) -> VolumeResult<Vec<Volume>> {
        let models = entity::Entity::find()
            .filter(entity::Column::IsDeleted.eq(false))
            .all(self.base.db())
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn mark_deleted(&self, id: Uuid, delete_date: chrono::DateTime<chrono::Utc>) -> VolumeResult<()> {
        let active = entity::ActiveModel {
            id: Set(id),
            is_deleted: Set(true),
            delete_date: Set(Some(delete_date.into())),
            ..Default::default()
        };
        entity::Entity::update(active).exec(self.base.db()).await?;
        Ok(())
    }

    async fn release(&self, id: Uuid) -> VolumeResult<()> {
        let active = entity::ActiveModel {
            id: Set(id),
            in_use: Set(false),
            reservation_id: Set(None),
            last_used: Set(Some(chrono::Utc::now().into())),
            ..Default::default()
        };
        entity::Entity::update(active).exec(self.base.db()).await?;
        Ok(())
    }

    async fn apply_cloud_snapshot(&self, id: Uuid, snapshot: CloudVolumeSnapshot) -> VolumeResult<()> {
        let active = entity::ActiveModel {
            id: Set(id),
            cloud_volume_id: Set(Some(snapshot.cloud_volume_id)),
            size_gib: Set(snapshot.size_gib),
            in_use: Set(snapshot.attached),
            snapshot_count: Set(snapshot.snapshot_count),
            pending_snapshot_count: Set(snapshot.pending_snapshot_count),
            last_snapshot_at: Set(snapshot.last_snapshot_at.map(Into::into)),
            ..Default::default()
        };
        entity::Entity::update(active).exec(self.base.db()).await?;
        Ok(())
    }

    async fn mark_operation_status(&self, id: Uuid, status: VolumeOperationStatus) -> VolumeResult<()> {
        let active = entity::ActiveModel {
            id: Set(id),
            operation_status: Set(Some(status.as_str().to_string())),
            ..Default::default()
        };
        entity::Entity::update(active).exec(self.base.db()).await?;
        Ok(())
    }

    async fn list_for_hard_deletion(&self, as_of: chrono::DateTime<chrono::Utc>) -> VolumeResult<Vec<Volume>> {
        let as_of_tz: chrono::DateTime<chrono::FixedOffset> = as_of.into();
        let models = entity::Entity::find()
            .filter(entity::Column::IsDeleted.eq(true))
            .filter(entity::Column::DeleteDate.lte(as_of_tz))
            .all(self.base.db())
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn purge(&self, id: Uuid) -> VolumeResult<()> {
        entity::Entity::delete_by_id(id).exec(self.base.db()).await?;
        Ok(())
    }
}
