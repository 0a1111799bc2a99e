//! Logical connection error types.

use thiserror::Error;

use crate::config::ConfigError;
use crate::datasource::DriverError;
use crate::transaction::{TransactionError, TransactionType};

/// Result type for logical connection operations.
pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// Broad category of a [`ConnectionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Wrong names or protocols in configuration. Never retried.
    Configuration,
    /// A physical connection could not be opened or validated.
    Connectivity,
    /// The logical connection is closed.
    State,
    /// Physical connections failed to close.
    AggregateClose,
    /// A transaction protocol failed at runtime.
    Transaction,
}

/// Errors surfaced by a logical connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("no such datasource {data_source} in schema {schema}")]
    NoSuchDataSource { schema: String, data_source: String },

    #[error("unsupported transaction type: {0}")]
    UnsupportedTransactionType(TransactionType),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot reach datasource {data_source}: {source}")]
    Connectivity {
        data_source: String,
        #[source]
        source: DriverError,
    },

    #[error("connection already closed")]
    Closed,

    /// `last` is the final close failure encountered.
    #[error("{failed} physical connections failed to close, last: {last}")]
    CloseFailed { failed: usize, last: DriverError },

    #[error("transaction error: {0}")]
    Transaction(TransactionError),

    #[error("driver error: {0}")]
    Driver(#[from] DriverError),
}

impl From<TransactionError> for ConnectionError {
    fn from(e: TransactionError) -> Self {
        match e {
            TransactionError::UnsupportedType(t) => ConnectionError::UnsupportedTransactionType(t),
            other => ConnectionError::Transaction(other),
        }
    }
}

impl From<ConfigError> for ConnectionError {
    fn from(e: ConfigError) -> Self {
        ConnectionError::InvalidConfig(e.to_string())
    }
}

impl ConnectionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConnectionError::NoSuchDataSource { .. }
            | ConnectionError::UnsupportedTransactionType(_)
            | ConnectionError::InvalidConfig(_) => ErrorKind::Configuration,
            ConnectionError::Connectivity { .. } | ConnectionError::Driver(_) => {
                ErrorKind::Connectivity
            }
            ConnectionError::Closed => ErrorKind::State,
            ConnectionError::CloseFailed { .. } => ErrorKind::AggregateClose,
            ConnectionError::Transaction(e) if e.is_configuration() => ErrorKind::Configuration,
            ConnectionError::Transaction(_) => ErrorKind::Transaction,
        }
    }

    pub(crate) fn connectivity(data_source: impl Into<String>, source: DriverError) -> Self {
        Self::Connectivity {
            data_source: data_source.into(),
            source,
        }
    }
}
