//! Transaction protocol variants and lifecycle operations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The unit-of-work protocol a transaction runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    /// Native per-connection transactions, no cross-datasource atomicity.
    #[default]
    Local,
    /// Two-phase commit through an XA resource manager.
    Xa,
    /// Eventually consistent sagas with compensating actions.
    Base,
}

impl TransactionType {
    /// Every variant, in declaration order.
    pub const ALL: [TransactionType; 3] = [
        TransactionType::Local,
        TransactionType::Xa,
        TransactionType::Base,
    ];

    /// Whether this variant coordinates more than one datasource atomically
    /// or eventually.
    pub fn is_distributed(&self) -> bool {
        !matches!(self, TransactionType::Local)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Local => write!(f, "LOCAL"),
            TransactionType::Xa => write!(f, "XA"),
            TransactionType::Base => write!(f, "BASE"),
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LOCAL" => Ok(TransactionType::Local),
            "XA" => Ok(TransactionType::Xa),
            "BASE" => Ok(TransactionType::Base),
            _ => Err(format!("unknown transaction type: {}", s)),
        }
    }
}

/// A transaction lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionOperationType {
    Begin,
    Commit,
    Rollback,
}

impl fmt::Display for TransactionOperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionOperationType::Begin => write!(f, "BEGIN"),
            TransactionOperationType::Commit => write!(f, "COMMIT"),
            TransactionOperationType::Rollback => write!(f, "ROLLBACK"),
        }
    }
}
