//! Append-only audit trail domain.

pub mod entity;
pub mod error;
pub mod models;
pub mod postgres;
pub mod repository;

pub use error::{AuditError, AuditResult};
pub use models::{AuditEntry, NewAuditEntry};
pub use postgres::PgAuditRepository;
pub use repository::AuditRepository;
