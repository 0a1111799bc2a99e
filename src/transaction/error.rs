//! Transaction error types.

use thiserror::Error;

use crate::datasource::DriverError;
use crate::transaction::types::TransactionType;

/// Result type for transaction operations.
pub type TransactionResult<T> = Result<T, TransactionError>;

/// Errors that can occur during transaction operations.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// No manager is registered for the requested protocol.
    #[error("unsupported transaction type: {0}")]
    UnsupportedType(TransactionType),

    /// A physical connection rejected a native transaction call.
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    /// Some, but possibly not all, physical connections failed to complete a
    /// local commit or rollback. `source` is the last failure seen.
    #[error("{failed} of {total} connections failed: {source}")]
    Local {
        failed: usize,
        total: usize,
        #[source]
        source: DriverError,
    },

    /// The XA resource manager reported a failure.
    #[error("XA resource manager error on {xid}: {message}")]
    ResourceManager { xid: String, message: String },

    /// Prepare failed; the global transaction was rolled back instead.
    #[error("XA transaction {xid} rolled back after prepare failure: {message}")]
    HeuristicRollback { xid: String, message: String },

    /// The saga engine reported a failure.
    #[error("saga {saga_id} failed: {message}")]
    Saga { saga_id: String, message: String },

    /// Invalid operation for current transaction state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A provider could not build its manager.
    #[error("provider {provider} failed to create a {transaction_type} manager: {message}")]
    Provider {
        provider: String,
        transaction_type: TransactionType,
        message: String,
    },
}

impl TransactionError {
    /// Check if retrying the whole unit of work might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransactionError::HeuristicRollback { .. } => true,
            TransactionError::Driver(e) => e.is_connection_exception(),
            TransactionError::Local { source, .. } => source.is_connection_exception(),
            _ => false,
        }
    }

    /// Whether this is a configuration problem rather than a runtime failure.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TransactionError::UnsupportedType(_) | TransactionError::Provider { .. }
        )
    }

    pub(crate) fn resource_manager(xid: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ResourceManager {
            xid: xid.into(),
            message: message.into(),
        }
    }

    pub(crate) fn saga(saga_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Saga {
            saga_id: saga_id.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        let rolled_back = TransactionError::HeuristicRollback {
            xid: "x1".to_string(),
            message: "prepare failed".to_string(),
        };
        assert!(rolled_back.is_retryable());

        let lost = TransactionError::Driver(DriverError::new("lost").with_sql_state("08006"));
        assert!(lost.is_retryable());

        let unsupported = TransactionError::UnsupportedType(TransactionType::Xa);
        assert!(!unsupported.is_retryable());
        assert!(unsupported.is_configuration());
    }

    #[test]
    fn test_local_display() {
        let err = TransactionError::Local {
            failed: 2,
            total: 3,
            source: DriverError::new("deadlock"),
        };
        assert_eq!(err.to_string(), "2 of 3 connections failed: deadlock");
    }
}
