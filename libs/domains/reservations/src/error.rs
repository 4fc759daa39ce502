use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReservationError {
    #[error("reservation not found: {0}")]
    NotFound(String),

    #[error("user-fatal: {0}")]
    UserFatal(String),

    #[error("contention: {0}")]
    Contention(String),

    #[error("transient: {0}")]
    Transient(String),

    #[error("database error: {0}")]
    Database(String),
}

pub type ReservationResult<T> = Result<T, ReservationError>;

impl From<sea_orm::DbErr> for ReservationError {
    fn from(err: sea_orm::DbErr) -> Self {
        ReservationError::Database(err.to_string())
    }
}

impl From<domain_gpu_types::GpuTypeError> for ReservationError {
    fn from(err: domain_gpu_types::GpuTypeError) -> Self {
        match err {
            domain_gpu_types::GpuTypeError::NotFound(tag) => {
                ReservationError::UserFatal(format!("unknown gpu type: {tag}"))
            }
            domain_gpu_types::GpuTypeError::Validation(msg) => ReservationError::Contention(msg),
            domain_gpu_types::GpuTypeError::Database(msg) => ReservationError::Database(msg),
        }
    }
}

impl From<cluster_gateway::GatewayError> for ReservationError {
    fn from(err: cluster_gateway::GatewayError) -> Self {
        ReservationError::Transient(err.to_string())
    }
}

impl From<cloud_adapter::CloudAdapterError> for ReservationError {
    fn from(err: cloud_adapter::CloudAdapterError) -> Self {
        ReservationError::Transient(err.to_string())
    }
}

impl From<domain_audit::AuditError> for ReservationError {
    fn from(err: domain_audit::AuditError) -> Self {
        ReservationError::Database(err.to_string())
    }
}

impl From<domain_volumes::VolumeError> for ReservationError {
    fn from(err: domain_volumes::VolumeError) -> Self {
        match err {
            domain_volumes::VolumeError::NotFound(id) => {
                ReservationError::UserFatal(format!("unknown volume: {id}"))
            }
            domain_volumes::VolumeError::DuplicateName(name) => {
                ReservationError::UserFatal(format!("volume name already in use: {name}"))
            }
            domain_volumes::VolumeError::InUse => {
                ReservationError::UserFatal("disk in use".to_string())
            }
            domain_volumes::VolumeError::Deleted => {
                ReservationError::UserFatal("disk in use".to_string())
            }
            domain_volumes::VolumeError::Database(msg) => ReservationError::Database(msg),
        }
    }
}
