use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("database error: {0}")]
    Database(String),
}

pub type AuditResult<T> = Result<T, AuditError>;

impl From<sea_orm::DbErr> for AuditError {
    fn from(err: sea_orm::DbErr) -> Self {
        AuditError::Database(err.to_string())
    }
}
