//! Record writer seam: validated, idempotent persistence of decoded records.

use async_trait::async_trait;
use thiserror::Error;

use super::schema::{DecodedRecord, RecordTypeId};

/// Result of handing one decoded record to a writer. `Skipped` means a row
/// for the same dedup key already exists; the dispatcher treats it exactly
/// like `Written` for cursor-advance purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Skipped,
    Failed(String),
}

impl WriteOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Written => "written",
            Self::Skipped => "skipped",
            Self::Failed(_) => "failed",
        }
    }
}

/// One writer per domain record type. Writers never halt the dispatcher: any
/// failure is reported through [`WriteOutcome::Failed`].
#[async_trait]
pub trait RecordWriter: Send + Sync {
    fn name(&self) -> &str;

    /// Type guard: whether this writer handles the given record type.
    fn accepts(&self, record_type: RecordTypeId) -> bool;

    async fn write(&self, record: &DecodedRecord) -> WriteOutcome;
}

/// Outcome of a store-level find-or-create keyed by the dedup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreInsert {
    Created,
    Duplicate,
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("constraint violation: {0}")]
    Constraint(String),
}
