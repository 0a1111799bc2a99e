//! Logical connections over sharded datasources.
//!
//! A [`LogicalConnection`] looks like a single database connection to its
//! caller. Underneath it keeps a [`PhysicalConnectionCache`] of connections
//! opened per datasource name and routes transaction control to the
//! protocol selected for the session.
//!
//! ```text
//!  set_auto_commit(false)
//!        │
//!        ▼
//!  TransactionTypeState ──► active protocol
//!        │
//!        ▼
//!  TransactionCoordinator::begin(protocol)
//!        │
//!        ▼
//!  get_connection(ds) ──► open, replay settings, enlist, cache
//! ```

mod cache;
mod error;
mod logical;

pub use cache::PhysicalConnectionCache;
pub use error::{ConnectionError, ConnectionResult, ErrorKind};
pub use logical::LogicalConnection;
