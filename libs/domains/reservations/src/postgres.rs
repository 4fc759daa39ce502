use async_trait::async_trait;
use database::BaseRepository;
use sea_orm::{ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::{
    entity,
    error::ReservationResult,
    models::{CreateReservation, Reservation, ReservationPatch, ReservationStatus},
    repository::ReservationRepository,
};

pub struct PgReservationRepository {
    base: BaseRepository<entity::Entity>,
}

impl PgReservationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    async fn list_by_status(&self, status: ReservationStatus) -> ReservationResult<Vec<Reservation>> {
        let models = entity::Entity::find()
            .filter(entity::Column::Status.eq(status.as_str()))
            .all(self.base.db())
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl ReservationRepository for PgReservationRepository {
    async fn create(&self, input: CreateReservation) -> ReservationResult<Reservation> {
        let active: entity::ActiveModel = input.into();
        let model = self.base.insert(active).await?;
        Ok(model.into())
    }

    async fn get_by_id(&self, id: &str) -> ReservationResult<Option<Reservation>> {
        let model = self.base.find_by_id(id.to_string()).await?;
        Ok(model.map(Into::into))
    }

    async fn list_by_master(&self, master_reservation_id: &str) -> ReservationResult<Vec<Reservation>> {
        let models = entity::Entity::find()
            .filter(entity::Column::MasterReservationId.eq(master_reservation_id))
            .all(self.base.db())
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn list_active(&self) -> ReservationResult<Vec<Reservation>> {
        self.list_by_status(ReservationStatus::Active).await
    }

    async fn list_pending(&self) -> ReservationResult<Vec<Reservation>> {
        self.list_by_status(ReservationStatus::Pending).await
    }

    async fn list_preparing(&self) -> ReservationResult<Vec<Reservation>> {
        self.list_by_status(ReservationStatus::Preparing).await
    }

    async fn apply_patch(&self, id: &str, patch: ReservationPatch) -> ReservationResult<()> {
        crate::txn::apply_patch_on(self.base.db(), id, patch).await
    }
}
