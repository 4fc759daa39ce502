use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Volumes::Table)
                    .if_not_exists()
                    .col(pk_uuid(Volumes::Id))
                    .col(string(Volumes::UserId))
                    .col(string(Volumes::Name))
                    .col(integer(Volumes::SizeGib))
                    .col(string_null(Volumes::CloudVolumeId))
                    .col(boolean(Volumes::InUse).default(false))
                    .col(uuid_null(Volumes::ReservationId))
                    .col(boolean(Volumes::IsDeleted).default(false))
                    .col(timestamp_with_time_zone_null(Volumes::DeleteDate))
                    .col(integer(Volumes::SnapshotCount).default(0))
                    .col(integer(Volumes::PendingSnapshotCount).default(0))
                    .col(timestamp_with_time_zone_null(Volumes::LastSnapshotAt))
                    .col(timestamp_with_time_zone_null(Volumes::LastUsed))
                    .col(string_null(Volumes::OperationId))
                    .col(string_null(Volumes::OperationStatus))
                    .col(
                        timestamp_with_time_zone(Volumes::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Volumes::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("unique_volume_user_name")
                    .table(Volumes::Table)
                    .col(Volumes::UserId)
                    .col(Volumes::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_volumes_reservation_id")
                    .table(Volumes::Table)
                    .col(Volumes::ReservationId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Volumes::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Volumes {
    Table,
    Id,
    UserId,
    Name,
    SizeGib,
    CloudVolumeId,
    InUse,
    ReservationId,
    IsDeleted,
    DeleteDate,
    SnapshotCount,
    PendingSnapshotCount,
    LastSnapshotAt,
    LastUsed,
    OperationId,
    OperationStatus,
    CreatedAt,
    UpdatedAt,
}
