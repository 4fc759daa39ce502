use thiserror::Error;

#[derive(Debug, Error)]
pub enum GpuTypeError {
    #[error("GPU type not found: {0}")]
    NotFound(String),

    #[error("invalid GPU type data: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(String),
}

pub type GpuTypeResult<T> = Result<T, GpuTypeError>;

impl From<sea_orm::DbErr> for GpuTypeError {
    fn from(err: sea_orm::DbErr) -> Self {
        GpuTypeError::Database(err.to_string())
    }
}
