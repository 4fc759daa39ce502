use async_trait::async_trait;
use database::BaseRepository;
use sea_orm::{ActiveValue::Set, DatabaseConnection, EntityTrait};

use crate::{
    entity,
    error::GpuTypeResult,
    models::{AvailabilityUpdate, GpuType},
    repository::GpuTypeRepository,
};

pub struct PgGpuTypeRepository {
    base: BaseRepository<entity::Entity>,
}

impl PgGpuTypeRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

#[async_trait]
impl GpuTypeRepository for PgGpuTypeRepository {
    async fn get_by_tag(&self, tag: &str) -> GpuTypeResult<Option<GpuType>> {
        let model = self.base.find_by_id(tag.to_string()).await?;
        Ok(model.map(Into::into))
    }

    async fn list(&self) -> GpuTypeResult<Vec<GpuType>> {
        let models = entity::Entity::find().all(self.base.db()).await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn apply_availability_update(&self, update: AvailabilityUpdate) -> GpuTypeResult<()> {
        let active = entity::ActiveModel {
            tag: Set(update.tag),
            total_cluster_gpus: Set(update.total_cluster_gpus),
            available_gpus: Set(update.available_gpus),
            max_reservable: Set(update.max_reservable),
            full_nodes_available: Set(update.full_nodes_available),
            running_instances: Set(update.running_instances),
            last_availability_update: Set(Some(chrono::Utc::now().into())),
            last_availability_updated_by: Set(Some(update.updated_by)),
            ..Default::default()
        };

        entity::Entity::update(active)
            .exec(self.base.db())
            .await?;

        Ok(())
    }
}
