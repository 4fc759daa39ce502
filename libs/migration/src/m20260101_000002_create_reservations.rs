use sea_orm_migration::{prelude::*, schema::*};

use crate::m20260101_000000_create_gpu_types::GpuTypes;
use crate::m20260101_000001_create_volumes::Volumes;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Reservations::Table)
                    .if_not_exists()
                    .col(string(Reservations::Id).primary_key())
                    .col(string(Reservations::UserId))
                    .col(string(Reservations::Status).default("queued"))
                    .col(string(Reservations::GpuType))
                    .col(integer(Reservations::GpuCount))
                    .col(string(Reservations::InstanceType))
                    .col(double(Reservations::DurationHours))
                    .col(
                        timestamp_with_time_zone(Reservations::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(timestamp_with_time_zone_null(Reservations::LaunchTime))
                    .col(timestamp_with_time_zone_null(Reservations::ExpiryTime))
                    .col(timestamp_with_time_zone_null(Reservations::ReservationEnded))
                    .col(string_null(Reservations::PodName))
                    .col(string_null(Reservations::Namespace))
                    .col(string_null(Reservations::NodeIp))
                    .col(integer_null(Reservations::NodePublicPort))
                    .col(string_null(Reservations::NodePrivateIp))
                    .col(boolean(Reservations::JupyterEnabled).default(false))
                    .col(string_null(Reservations::JupyterUrl))
                    .col(integer_null(Reservations::JupyterPort))
                    .col(string_null(Reservations::JupyterToken))
                    .col(string_null(Reservations::JupyterError))
                    .col(uuid_null(Reservations::VolumeId))
                    .col(json(Reservations::StatusHistory).default("[]"))
                    .col(integer(Reservations::OomCount).default(0))
                    .col(timestamp_with_time_zone_null(Reservations::LastOomAt))
                    .col(string_null(Reservations::OomContainer))
                    .col(json(Reservations::WarningsSent).default(r#"{"30min":false,"15min":false,"5min":false}"#))
                    .col(timestamp_with_time_zone_null(Reservations::LastWarningAt))
                    .col(boolean(Reservations::IsMultinode).default(false))
                    .col(string_null(Reservations::MasterReservationId))
                    .col(integer_null(Reservations::NodeIndex))
                    .col(integer_null(Reservations::TotalNodes))
                    .col(json(Reservations::SecondaryUsers).default("[]"))
                    .col(string_null(Reservations::AlbArn))
                    .col(string_null(Reservations::NlbArn))
                    .col(string_null(Reservations::JupyterSubdomain))
                    .col(string_null(Reservations::FailureReason))
                    .col(json(Reservations::EnvVars).default("{}"))
                    .col(string(Reservations::Image))
                    .col(boolean(Reservations::PreserveEntrypoint).default(false))
                    .col(string_null(Reservations::GithubUser))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reservations_gpu_type")
                            .from(Reservations::Table, Reservations::GpuType)
                            .to(GpuTypes::Table, GpuTypes::Tag),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reservations_volume_id")
                            .from(Reservations::Table, Reservations::VolumeId)
                            .to(Volumes::Table, Volumes::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reservations_status")
                    .table(Reservations::Table)
                    .col(Reservations::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reservations_master_reservation_id")
                    .table(Reservations::Table)
                    .col(Reservations::MasterReservationId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reservations_expiry_time")
                    .table(Reservations::Table)
                    .col(Reservations::ExpiryTime)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Reservations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Reservations {
    Table,
    Id,
    UserId,
    Status,
    GpuType,
    GpuCount,
    InstanceType,
    DurationHours,
    CreatedAt,
    LaunchTime,
    ExpiryTime,
    ReservationEnded,
    PodName,
    Namespace,
    NodeIp,
    NodePublicPort,
    NodePrivateIp,
    JupyterEnabled,
    JupyterUrl,
    JupyterPort,
    JupyterToken,
    JupyterError,
    VolumeId,
    StatusHistory,
    OomCount,
    LastOomAt,
    OomContainer,
    WarningsSent,
    LastWarningAt,
    IsMultinode,
    MasterReservationId,
    NodeIndex,
    TotalNodes,
    SecondaryUsers,
    AlbArn,
    NlbArn,
    JupyterSubdomain,
    FailureReason,
    EnvVars,
    Image,
    PreserveEntrypoint,
    GithubUser,
}
