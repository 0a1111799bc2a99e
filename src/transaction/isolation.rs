//! Transaction isolation levels.
//!
//! The numeric codes follow the JDBC constants so that levels can be passed
//! through driver adapters unchanged:
//!
//! | level            | code |
//! |------------------|------|
//! | NONE             | 0    |
//! | READ UNCOMMITTED | 1    |
//! | READ COMMITTED   | 2    |
//! | REPEATABLE READ  | 4    |
//! | SERIALIZABLE     | 8    |

use std::fmt;

use serde::{Deserialize, Serialize};

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IsolationLevel {
    /// Transactions are not supported.
    None,

    /// Dirty reads, non-repeatable reads and phantom reads can occur.
    ///
    /// This is the level a logical connection reports before any physical
    /// connection has been opened.
    #[default]
    ReadUncommitted,

    /// Dirty reads are prevented.
    ReadCommitted,

    /// Dirty and non-repeatable reads are prevented.
    RepeatableRead,

    /// Dirty reads, non-repeatable reads and phantom reads are prevented.
    Serializable,
}

impl IsolationLevel {
    /// The JDBC integer code for this level.
    pub fn code(&self) -> i32 {
        match self {
            IsolationLevel::None => 0,
            IsolationLevel::ReadUncommitted => 1,
            IsolationLevel::ReadCommitted => 2,
            IsolationLevel::RepeatableRead => 4,
            IsolationLevel::Serializable => 8,
        }
    }

    /// Check whether dirty reads are possible at this level.
    pub fn allows_dirty_reads(&self) -> bool {
        matches!(self, IsolationLevel::None | IsolationLevel::ReadUncommitted)
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsolationLevel::None => write!(f, "NONE"),
            IsolationLevel::ReadUncommitted => write!(f, "READ UNCOMMITTED"),
            IsolationLevel::ReadCommitted => write!(f, "READ COMMITTED"),
            IsolationLevel::RepeatableRead => write!(f, "REPEATABLE READ"),
            IsolationLevel::Serializable => write!(f, "SERIALIZABLE"),
        }
    }
}

impl TryFrom<i32> for IsolationLevel {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(IsolationLevel::None),
            1 => Ok(IsolationLevel::ReadUncommitted),
            2 => Ok(IsolationLevel::ReadCommitted),
            4 => Ok(IsolationLevel::RepeatableRead),
            8 => Ok(IsolationLevel::Serializable),
            _ => Err(format!("unknown isolation level code: {}", code)),
        }
    }
}

/// Parse isolation level from string (SQL syntax).
impl std::str::FromStr for IsolationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "NONE" => Ok(IsolationLevel::None),
            "READ UNCOMMITTED" | "READ_UNCOMMITTED" => Ok(IsolationLevel::ReadUncommitted),
            "READ COMMITTED" | "READ_COMMITTED" => Ok(IsolationLevel::ReadCommitted),
            "REPEATABLE READ" | "REPEATABLE_READ" => Ok(IsolationLevel::RepeatableRead),
            "SERIALIZABLE" => Ok(IsolationLevel::Serializable),
            _ => Err(format!("unknown isolation level: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_isolation() {
        assert_eq!(IsolationLevel::default(), IsolationLevel::ReadUncommitted);
        assert!(IsolationLevel::default().allows_dirty_reads());
    }

    #[test]
    fn test_codes() {
        for level in [
            IsolationLevel::None,
            IsolationLevel::ReadUncommitted,
            IsolationLevel::ReadCommitted,
            IsolationLevel::RepeatableRead,
            IsolationLevel::Serializable,
        ] {
            assert_eq!(IsolationLevel::try_from(level.code()), Ok(level));
        }
        assert!(IsolationLevel::try_from(3).is_err());
    }

    #[test]
    fn test_parse_isolation() {
        assert_eq!(
            "serializable".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::Serializable
        );
        assert_eq!(
            "READ_COMMITTED".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::ReadCommitted
        );
        assert!("snapshot".parse::<IsolationLevel>().is_err());
    }
}
