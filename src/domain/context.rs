//! Operation Context
//!
//! Per-request metadata passed explicitly through every ledger call:
//! the correlation id used to tag log output and the caller's deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use super::LedgerError;

/// Context for an operation, used for tracing and deadline enforcement.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    /// Correlation ID for request tracing
    pub correlation_id: Option<Uuid>,

    /// Point in time after which the whole request is abandoned
    pub deadline: Option<Instant>,
}

impl OperationContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create context with correlation ID
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Create context with an absolute deadline
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Create context whose deadline is `timeout` from now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Generate a new correlation ID if not present
    pub fn ensure_correlation_id(&mut self) -> Uuid {
        *self.correlation_id.get_or_insert_with(Uuid::new_v4)
    }

    /// Span that tags everything logged by `operation` with this context
    pub fn span(&self, operation: &'static str) -> tracing::Span {
        tracing::info_span!(
            "ledger",
            operation,
            correlation_id = ?self.correlation_id,
        )
    }

    /// Run `fut` bounded by the deadline.
    ///
    /// When the deadline passes the future is dropped, which drops (and so
    /// rolls back) any unit of work it holds, and `LedgerError::Timeout` is
    /// returned.
    pub async fn within_deadline<T, F>(&self, fut: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, LedgerError>>,
    {
        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, fut)
                .await
                .map_err(|_| LedgerError::Timeout)?,
            None => fut.await,
        }
    }
}
