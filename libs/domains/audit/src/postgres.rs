use async_trait::async_trait;
use database::BaseRepository;
use sea_orm::DatabaseConnection;

use crate::{entity, error::AuditResult, models::NewAuditEntry, repository::AuditRepository};

pub struct PgAuditRepository {
    base: BaseRepository<entity::Entity>,
}

impl PgAuditRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

#[async_trait]
impl AuditRepository for PgAuditRepository {
    async fn record(&self, entry: NewAuditEntry) -> AuditResult<()> {
        let active: entity::ActiveModel = entry.into();
        self.base.insert(active).await?;
        Ok(())
    }
}
