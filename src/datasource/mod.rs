//! Physical datasource and connection capabilities.
//!
//! The core never implements a driver itself. Whatever pool or driver the
//! embedding application uses is adapted to these two traits:
//!
//! - [`DataSource`]: a named handle that can open physical connections
//! - [`PhysicalConnection`]: the subset of a driver connection the core drives
//!
//! Connections are handed around as [`PhysicalConnectionRef`] so that the
//! logical connection can return the same instance on repeated lookups.

mod error;

use std::collections::HashMap;
use std::sync::Arc;

pub use error::{DriverError, DriverResult};

use crate::transaction::IsolationLevel;

/// Shared handle to an open physical connection.
pub type PhysicalConnectionRef = Arc<dyn PhysicalConnection>;

/// Shared handle to a datasource.
pub type DataSourceRef = Arc<dyn DataSource>;

/// Datasource name to handle, as resolved for one schema.
pub type DataSourceMap = HashMap<String, DataSourceRef>;

/// A live connection to one physical database.
///
/// Methods take `&self`; implementations are expected to synchronize
/// internally the way driver connections do.
pub trait PhysicalConnection: Send + Sync {
    /// Check that the connection is still usable, waiting at most
    /// `timeout_seconds` (0 means no timeout).
    fn is_valid(&self, timeout_seconds: u32) -> DriverResult<bool>;

    /// Set the read-only hint.
    fn set_read_only(&self, read_only: bool) -> DriverResult<()>;

    /// Set the isolation level used by subsequent transactions.
    fn set_transaction_isolation(&self, level: IsolationLevel) -> DriverResult<()>;

    /// Report the isolation level currently in effect.
    fn transaction_isolation(&self) -> DriverResult<IsolationLevel>;

    /// Switch native autocommit on or off.
    fn set_auto_commit(&self, auto_commit: bool) -> DriverResult<()>;

    /// Commit the native transaction.
    fn commit(&self) -> DriverResult<()>;

    /// Roll back the native transaction.
    fn rollback(&self) -> DriverResult<()>;

    /// Release the connection.
    fn close(&self) -> DriverResult<()>;
}

/// A source of physical connections for one datasource name.
pub trait DataSource: Send + Sync {
    /// Open a new physical connection. May perform network I/O.
    fn open(&self) -> DriverResult<PhysicalConnectionRef>;
}
