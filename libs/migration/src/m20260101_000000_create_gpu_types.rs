use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GpuTypes::Table)
                    .if_not_exists()
                    .col(string(GpuTypes::Tag).primary_key())
                    .col(string(GpuTypes::InstanceFamily))
                    .col(integer(GpuTypes::MaxGpusPerNode))
                    .col(integer(GpuTypes::CpuPerInstance))
                    .col(integer(GpuTypes::MemoryMbPerInstance))
                    .col(integer(GpuTypes::MaxMultinodeNodes).default(1))
                    .col(integer(GpuTypes::TotalClusterGpus).default(0))
                    .col(integer(GpuTypes::AvailableGpus).default(0))
                    .col(integer(GpuTypes::MaxReservable).default(0))
                    .col(integer(GpuTypes::FullNodesAvailable).default(0))
                    .col(integer(GpuTypes::RunningInstances).default(0))
                    .col(timestamp_with_time_zone_null(GpuTypes::LastAvailabilityUpdate))
                    .col(string_null(GpuTypes::LastAvailabilityUpdatedBy))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GpuTypes::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum GpuTypes {
    Table,
    Tag,
    InstanceFamily,
    MaxGpusPerNode,
    CpuPerInstance,
    MemoryMbPerInstance,
    MaxMultinodeNodes,
    TotalClusterGpus,
    AvailableGpus,
    MaxReservable,
    FullNodesAvailable,
    RunningInstances,
    LastAvailabilityUpdate,
    LastAvailabilityUpdatedBy,
}
