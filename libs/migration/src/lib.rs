pub use sea_orm_migration::prelude::*;

mod m20241128_000000_bootstrap;
mod m20260101_000000_create_gpu_types;
mod m20260101_000001_create_volumes;
mod m20260101_000002_create_reservations;
mod m20260101_000003_create_audit_log;
mod m20260101_000004_seed_gpu_types;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20241128_000000_bootstrap::Migration),
            Box::new(m20260101_000000_create_gpu_types::Migration),
            Box::new(m20260101_000001_create_volumes::Migration),
            Box::new(m20260101_000002_create_reservations::Migration),
            Box::new(m20260101_000003_create_audit_log::Migration),
            Box::new(m20260101_000004_seed_gpu_types::Migration),
        ]
    }
}
