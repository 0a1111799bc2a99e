//! shardlink - logical connections and transaction coordination for a
//! sharded database access layer.
//!
//! A [`LogicalConnection`](connection::LogicalConnection) fronts any number of
//! physical datasource connections and behaves like a single connection to
//! its caller. Transactions run under one of three protocols (LOCAL, XA,
//! BASE), chosen from configuration and dispatched through a
//! [`TransactionCoordinator`](transaction::TransactionCoordinator).
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use shardlink::config::ShardingConfig;
//! use shardlink::connection::LogicalConnection;
//! use shardlink::context::StandaloneContextManager;
//! use shardlink::transaction::{ProviderRegistry, TransactionTypeState};
//!
//! let config = ShardingConfig::from_path("sharding.json")?;
//! let context = StandaloneContextManager::new(&config, &data_sources, ProviderRegistry::new())?;
//! let session = TransactionTypeState::new();
//!
//! let mut conn = LogicalConnection::new("logic_db", Arc::new(context), session.clone())?;
//! conn.set_auto_commit(false)?;
//! let ds0 = conn.get_connection("ds_0")?;
//! // ... run statements on ds0 ...
//! conn.commit()?;
//! conn.close()?;
//! ```

pub mod config;
pub mod connection;
pub mod context;
pub mod datasource;
pub mod transaction;

#[cfg(test)]
mod fixture;
