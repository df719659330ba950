use async_trait::async_trait;
use model::{Error, MutationRecord, Retryable};
use std::fmt::{Display, Formatter};

/// Durable key-value store holding mutation records.
///
/// Writes are single-row upserts keyed by `(pk, sk)`, the last writer wins.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn put_record(&self, table: &str, record: &MutationRecord) -> Result<(), StoreError>;
}

/// Errors arising from writing to the store.
#[derive(Debug, thiserror::Error)]
#[error("{operation} of `{state_key}` failed: {reason}")]
pub struct StoreError {
    pub state_key: String,

    pub operation: StoreOperation,
    pub reason: StoreErrorReason,
    /// Set by the backend's own classification of the failure.
    pub retryable: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreErrorReason {
    // The record couldn't be converted into the store's format
    #[error("bad record: {0}")]
    BadRecord(String),
    // An error from the underlying store
    #[error("backend failure: {0}")]
    BackendFailure(Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    PutRecord,
}

impl Display for StoreOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreOperation::PutRecord => f.write_str("PutRecord"),
        }
    }
}

impl StoreError {
    pub fn new(
        state_key: String,
        operation: StoreOperation,
        reason: StoreErrorReason,
        retryable: bool,
    ) -> Self {
        StoreError {
            state_key,
            operation,
            reason,
            retryable,
        }
    }

    /// A backend failure which may succeed when attempted again.
    pub fn transient(state_key: String, err: impl Into<Error>) -> Self {
        StoreError::new(
            state_key,
            StoreOperation::PutRecord,
            StoreErrorReason::BackendFailure(err.into()),
            true,
        )
    }

    /// A backend failure which will fail again however often it is attempted.
    pub fn permanent(state_key: String, err: impl Into<Error>) -> Self {
        StoreError::new(
            state_key,
            StoreOperation::PutRecord,
            StoreErrorReason::BackendFailure(err.into()),
            false,
        )
    }
}

impl Retryable for StoreError {
    fn is_retryable(&self) -> bool {
        self.retryable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_reports_key_and_classification() {
        let err: StoreError = StoreError::transient("p1#s1".to_string(), "throttled");

        assert!(err.is_retryable());
        assert_eq!(
            "PutRecord of `p1#s1` failed: backend failure: throttled",
            err.to_string()
        );
        assert!(!StoreError::permanent("p1#s1".to_string(), "denied").is_retryable());
    }
}
