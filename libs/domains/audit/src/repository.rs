use async_trait::async_trait;

use crate::error::AuditResult;
use crate::models::NewAuditEntry;

/// Append-only. Deliberately exposes no update or delete method.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn record(&self, entry: NewAuditEntry) -> AuditResult<()>;
}
