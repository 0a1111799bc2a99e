//! Driver-level error type.

use thiserror::Error;

/// Result type for physical connection and datasource calls.
pub type DriverResult<T> = Result<T, DriverError>;

/// Failure reported by a physical connection or datasource.
///
/// Mirrors what a database driver hands back: a message, and optionally the
/// vendor error code and the five-character SQL state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}{}", detail_suffix(.vendor_code, .sql_state))]
pub struct DriverError {
    /// Human-readable message.
    pub message: String,
    /// Vendor-specific error code, if the driver reported one.
    pub vendor_code: Option<i32>,
    /// SQL state, if the driver reported one.
    pub sql_state: Option<String>,
}

fn detail_suffix(vendor_code: &Option<i32>, sql_state: &Option<String>) -> String {
    match (vendor_code, sql_state) {
        (Some(code), Some(state)) => format!(" (code {}, state {})", code, state),
        (Some(code), None) => format!(" (code {})", code),
        (None, Some(state)) => format!(" (state {})", state),
        (None, None) => String::new(),
    }
}

impl DriverError {
    /// Create an error carrying only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            vendor_code: None,
            sql_state: None,
        }
    }

    /// Attach a vendor error code.
    pub fn with_vendor_code(mut self, code: i32) -> Self {
        self.vendor_code = Some(code);
        self
    }

    /// Attach a SQL state.
    pub fn with_sql_state(mut self, state: impl Into<String>) -> Self {
        self.sql_state = Some(state.into());
        self
    }

    /// SQL state class `08` is "connection exception".
    pub fn is_connection_exception(&self) -> bool {
        self.sql_state
            .as_deref()
            .is_some_and(|state| state.starts_with("08"))
    }
}
