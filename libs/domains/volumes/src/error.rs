use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("volume not found: {0}")]
    NotFound(Uuid),

    #[error("volume name already in use for this user: {0}")]
    DuplicateName(String),

    #[error("disk in use")]
    InUse,

    #[error("volume is soft-deleted")]
    Deleted,

    #[error("database error: {0}")]
    Database(String),
}

pub type VolumeResult<T> = Result<T, VolumeError>;

impl From<sea_orm::DbErr> for VolumeError {
    fn from(err: sea_orm::DbErr) -> Self {
        VolumeError::Database(err.to_string())
    }
}
