//! Dispatches each queue's job envelope to the handler matching its tagged
//! `action`, and maps domain errors onto `StreamError`'s retry categories.

use async_trait::async_trait;
use domain_reservations::{DiskOpJob, DiskOpMessage, ReservationError, ReservationJob, ReservationMessage};
use stream_worker::{StreamError, StreamProcessor};

use crate::handlers::{disk, mutate, reserve, AppState};

/// `Contention`/`Transient` are retried by the worker's normal redelivery
/// path; `UserFatal`/`Database` are not expected to self-heal on retry but
/// are still surfaced as `Processing` so the configured retry ceiling (and
/// eventual DLQ archival) applies uniformly rather than special-casing
/// "don't retry this" at the processor layer.
fn to_stream_error(err: ReservationError) -> StreamError {
    match err {
        ReservationError::Contention(msg) => StreamError::Processing(format!("contention: {msg}")),
        ReservationError::Transient(msg) => StreamError::Processing(format!("transient: {msg}")),
        ReservationError::UserFatal(msg) => StreamError::Processing(format!("user-fatal: {msg}")),
        ReservationError::Database(msg) => StreamError::Processing(format!("database: {msg}")),
        ReservationError::NotFound(msg) => StreamError::Processing(format!("not found: {msg}")),
    }
}

pub struct ReservationProcessor {
    pub state: AppState,
}

#[async_trait]
impl StreamProcessor<ReservationJob> for ReservationProcessor {
    async fn process(&self, job: &ReservationJob) -> Result<(), StreamError> {
        let result = match &job.message {
            ReservationMessage::Reserve(payload) => reserve::handle_reserve(&self.state, payload).await,
            ReservationMessage::Cancel { reservation_id, user_id } => {
                mutate::handle_cancel(&self.state, reservation_id, user_id).await
            }
            ReservationMessage::Extend { reservation_id, user_id, hours } => {
                mutate::handle_extend(&self.state, reservation_id, user_id, *hours).await
            }
            ReservationMessage::EnableJupyter { reservation_id, user_id } => {
                mutate::handle_enable_jupyter(&self.state, reservation_id, user_id).await
            }
            ReservationMessage::DisableJupyter { reservation_id, user_id } => {
                mutate::handle_disable_jupyter(&self.state, reservation_id, user_id).await
            }
            ReservationMessage::AddUser {
                reservation_id,
                user_id,
                external_identifier,
            } => mutate::handle_add_user(&self.state, reservation_id, user_id, external_identifier).await,
        };

        result.map_err(to_stream_error)
    }

    fn name(&self) -> &'static str {
        "reservation-processor"
    }

    async fn health_check(&self) -> Result<bool, StreamError> {
        Ok(true)
    }
}

pub struct DiskOpProcessor {
    pub state: AppState,
}

#[async_trait]
impl StreamProcessor<DiskOpJob> for DiskOpProcessor {
    async fn process(&self, job: &DiskOpJob) -> Result<(), StreamError> {
        let result = match &job.message {
            DiskOpMessage::DiskCreate {
                disk_name,
                user_id,
                size_gib,
                operation_id,
            } => disk::handle_disk_create(&self.state, disk_name, user_id, *size_gib, operation_id).await,
            DiskOpMessage::DiskDelete {
                disk_name,
                user_id,
                operation_id,
            } => disk::handle_disk_delete(&self.state, disk_name, user_id, operation_id).await,
        };

        result.map_err(to_stream_error)
    }

    fn name(&self) -> &'static str {
        "disk-op-processor"
    }

    async fn health_check(&self) -> Result<bool, StreamError> {
        Ok(true)
    }
}
