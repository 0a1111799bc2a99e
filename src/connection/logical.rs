//! The logical connection - one connection-like object over many datasources.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::connection::cache::PhysicalConnectionCache;
use crate::connection::error::{ConnectionError, ConnectionResult};
use crate::context::ContextManager;
use crate::datasource::PhysicalConnectionRef;
use crate::transaction::{IsolationLevel, TransactionCoordinator, TransactionType, TransactionTypeState};

/// A logical connection for one schema.
///
/// Physical connections are opened lazily per datasource name and cached, so
/// repeated lookups of a name return the same instance. Transaction control
/// is routed through the session's [`TransactionTypeState`] to the
/// coordinator's manager for the active protocol.
///
/// Calls must come from one caller at a time; the connection does no locking
/// of its own.
pub struct LogicalConnection {
    schema_name: String,
    context_manager: Arc<dyn ContextManager>,
    coordinator: TransactionCoordinator,
    session: TransactionTypeState,
    cached_connections: PhysicalConnectionCache,
    auto_commit: bool,
    /// Explicitly requested settings, replayed onto new physical connections.
    read_only: Option<bool>,
    transaction_isolation: Option<IsolationLevel>,
    closed: bool,
}

impl LogicalConnection {
    /// Create a logical connection on `schema_name` for the session owning
    /// `session`.
    ///
    /// When a transaction rule is configured, its protocol becomes the
    /// session's active protocol. Without a rule the session keeps whatever it
    /// had, LOCAL for a fresh session.
    pub fn new(
        schema_name: impl Into<String>,
        context_manager: Arc<dyn ContextManager>,
        session: TransactionTypeState,
    ) -> ConnectionResult<Self> {
        let schema_name = schema_name.into();
        let coordinator = context_manager.transaction_coordinator(&schema_name)?;
        if let Some(rule) = context_manager.transaction_rule() {
            session.set(rule.default_type);
        }
        debug!(
            schema = %schema_name,
            transaction_type = %session.get(),
            "logical connection created"
        );

        Ok(Self {
            schema_name,
            context_manager,
            coordinator,
            session,
            cached_connections: PhysicalConnectionCache::new(),
            auto_commit: true,
            read_only: None,
            transaction_isolation: None,
            closed: false,
        })
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    /// The session state this connection reads and updates.
    pub fn session(&self) -> &TransactionTypeState {
        &self.session
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> ConnectionResult<()> {
        if self.closed {
            return Err(ConnectionError::Closed);
        }
        Ok(())
    }

    // ==================== Physical Connections ====================

    /// Get the physical connection for `data_source_name`, opening it on
    /// first use.
    ///
    /// With autocommit off, a newly opened connection is enlisted in the
    /// session's unit of work. If the previous unit of work was already
    /// committed or rolled back, a new one is begun first, so work done after
    /// a commit is still transactional.
    pub fn get_connection(&mut self, data_source_name: &str) -> ConnectionResult<PhysicalConnectionRef> {
        self.ensure_open()?;
        if let Some(cached) = self.cached_connections.get(data_source_name) {
            return Ok(cached.clone());
        }

        let connection = self.open_connection(data_source_name)?;
        self.cached_connections.put(data_source_name, connection.clone());
        Ok(connection)
    }

    /// Get `count` physical connections for one datasource, reusing cached
    /// ones first and opening the rest.
    pub fn get_connections(
        &mut self,
        data_source_name: &str,
        count: usize,
    ) -> ConnectionResult<Vec<PhysicalConnectionRef>> {
        self.ensure_open()?;
        let cached = self.cached_connections.get_all(data_source_name).len();
        for _ in cached..count {
            let connection = self.open_connection(data_source_name)?;
            self.cached_connections.put(data_source_name, connection);
        }
        Ok(self
            .cached_connections
            .get_all(data_source_name)
            .iter()
            .take(count)
            .cloned()
            .collect())
    }

    fn open_connection(&self, data_source_name: &str) -> ConnectionResult<PhysicalConnectionRef> {
        let data_source = self
            .context_manager
            .data_source_map(&self.schema_name)
            .and_then(|map| map.get(data_source_name))
            .ok_or_else(|| ConnectionError::NoSuchDataSource {
                schema: self.schema_name.clone(),
                data_source: data_source_name.to_string(),
            })?
            .clone();

        let connection = data_source
            .open()
            .map_err(|e| ConnectionError::connectivity(data_source_name, e))?;
        debug!(
            schema = %self.schema_name,
            data_source = data_source_name,
            "opened physical connection"
        );

        if let Err(e) = self.prepare_connection(data_source_name, &connection) {
            if let Err(close_err) = connection.close() {
                warn!(data_source = data_source_name, error = %close_err, "failed to close rejected connection");
            }
            return Err(e);
        }
        Ok(connection)
    }

    /// Replay settings and join the open unit of work, if any.
    fn prepare_connection(
        &self,
        data_source_name: &str,
        connection: &PhysicalConnectionRef,
    ) -> ConnectionResult<()> {
        if let Some(read_only) = self.read_only {
            connection.set_read_only(read_only)?;
        }
        if let Some(level) = self.transaction_isolation {
            connection.set_transaction_isolation(level)?;
        }
        if self.auto_commit {
            return Ok(());
        }

        let transaction_type = self.session.get();
        if !self.unit_of_work_active(transaction_type) {
            // The previous unit of work was completed; the next one starts here.
            self.coordinator.begin(transaction_type)?;
            self.session.mark_open();
        }
        debug!(
            data_source = data_source_name,
            transaction_type = %transaction_type,
            "enlisting physical connection"
        );
        self.coordinator
            .enlist(transaction_type, data_source_name, connection)?;
        Ok(())
    }

    /// Number of cached physical connections.
    pub fn cached_connection_count(&self) -> usize {
        self.cached_connections.len()
    }

    // ==================== Transactions ====================

    pub fn auto_commit(&self) -> ConnectionResult<bool> {
        self.ensure_open()?;
        Ok(self.auto_commit)
    }

    /// Switch autocommit. Turning it off begins a transaction under the
    /// session's active protocol; turning it on never commits implicitly.
    pub fn set_auto_commit(&mut self, auto_commit: bool) -> ConnectionResult<()> {
        self.ensure_open()?;
        if self.auto_commit == auto_commit {
            return Ok(());
        }
        if !auto_commit {
            self.begin()?;
        }
        self.auto_commit = auto_commit;
        Ok(())
    }

    /// Whether the session has a transaction open that this connection's
    /// manager is actually tracking.
    fn unit_of_work_active(&self, transaction_type: TransactionType) -> bool {
        self.session.is_transaction_open() && self.coordinator.is_in_transaction(transaction_type)
    }

    fn begin(&self) -> ConnectionResult<()> {
        let transaction_type = self.session.get();
        if self.unit_of_work_active(transaction_type) {
            debug!(transaction_type = %transaction_type, "transaction already open on session");
            return Ok(());
        }
        if self.session.is_transaction_open() {
            // Left open by a connection that was closed mid-transaction; its
            // manager went with it.
            warn!(
                schema = %self.schema_name,
                transaction_type = %transaction_type,
                "session transaction has no live manager, beginning a new one"
            );
        }

        self.coordinator.begin(transaction_type)?;
        let enlisted = self
            .cached_connections
            .entries()
            .try_for_each(|(name, connection)| {
                self.coordinator.enlist(transaction_type, name, connection)
            });
        if let Err(e) = enlisted {
            let connections: Vec<_> = self.cached_connections.values().cloned().collect();
            if let Err(rollback_err) = self.coordinator.rollback(transaction_type, &connections) {
                warn!(error = %rollback_err, "rollback after failed enlistment also failed");
            }
            return Err(e.into());
        }
        self.session.mark_open();
        Ok(())
    }

    /// Commit the current unit of work. A no-op in autocommit mode unless
    /// the session still has a transaction open.
    pub fn commit(&mut self) -> ConnectionResult<()> {
        self.ensure_open()?;
        if self.auto_commit && !self.session.is_transaction_open() {
            debug!(schema = %self.schema_name, "commit in autocommit mode ignored");
            return Ok(());
        }
        let connections: Vec<_> = self.cached_connections.values().cloned().collect();
        let result = self.coordinator.commit(self.session.get(), &connections);
        self.session.mark_closed();
        result.map_err(Into::into)
    }

    /// Roll back the current unit of work. A no-op in autocommit mode unless
    /// the session still has a transaction open.
    pub fn rollback(&mut self) -> ConnectionResult<()> {
        self.ensure_open()?;
        if self.auto_commit && !self.session.is_transaction_open() {
            debug!(schema = %self.schema_name, "rollback in autocommit mode ignored");
            return Ok(());
        }
        let connections: Vec<_> = self.cached_connections.values().cloned().collect();
        let result = self.coordinator.rollback(self.session.get(), &connections);
        self.session.mark_closed();
        result.map_err(Into::into)
    }

    /// The session's active protocol.
    pub fn transaction_type(&self) -> TransactionType {
        self.session.get()
    }

    /// Whether the session has a transaction open.
    pub fn is_in_transaction(&self) -> bool {
        self.session.is_transaction_open()
    }

    // ==================== Connection Settings ====================

    /// Check every cached physical connection, stopping at the first invalid
    /// one. An empty cache is valid.
    pub fn is_valid(&self, timeout_seconds: u32) -> ConnectionResult<bool> {
        self.ensure_open()?;
        for (name, connection) in self.cached_connections.entries() {
            let valid = connection
                .is_valid(timeout_seconds)
                .map_err(|e| ConnectionError::connectivity(name, e))?;
            if !valid {
                debug!(data_source = name, "physical connection is not valid");
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn is_read_only(&self) -> ConnectionResult<bool> {
        self.ensure_open()?;
        Ok(self.read_only.unwrap_or(false))
    }

    /// Set the read-only hint, applying it to every cached physical
    /// connection before returning.
    pub fn set_read_only(&mut self, read_only: bool) -> ConnectionResult<()> {
        self.ensure_open()?;
        self.read_only = Some(read_only);
        for connection in self.cached_connections.values() {
            connection.set_read_only(read_only)?;
        }
        Ok(())
    }

    /// The isolation level of the first cached physical connection, or the
    /// locally configured level when nothing is cached.
    pub fn transaction_isolation(&self) -> ConnectionResult<IsolationLevel> {
        self.ensure_open()?;
        match self.cached_connections.values().next() {
            Some(connection) => Ok(connection.transaction_isolation()?),
            None => Ok(self.transaction_isolation.unwrap_or_default()),
        }
    }

    /// Set the isolation level, applying it to every cached physical
    /// connection before returning.
    pub fn set_transaction_isolation(&mut self, level: IsolationLevel) -> ConnectionResult<()> {
        self.ensure_open()?;
        self.transaction_isolation = Some(level);
        for connection in self.cached_connections.values() {
            connection.set_transaction_isolation(level)?;
        }
        Ok(())
    }

    // ==================== Close ====================

    /// Close every cached physical connection and mark this connection
    /// closed.
    ///
    /// Every connection gets a close attempt even if earlier ones fail; the
    /// last failure is reported. The session's transaction state is left as
    /// it is, including an open transaction.
    pub fn close(&mut self) -> ConnectionResult<()> {
        if self.closed {
            return Ok(());
        }
        if !self.auto_commit && self.session.is_transaction_open() {
            warn!(
                schema = %self.schema_name,
                transaction_type = %self.session.get(),
                "closing connection with an open transaction"
            );
        }

        let connections = self.cached_connections.drain();
        self.closed = true;

        let mut failed = 0;
        let mut last = None;
        for connection in connections {
            if let Err(e) = connection.close() {
                warn!(schema = %self.schema_name, error = %e, "failed to close physical connection");
                failed += 1;
                last = Some(e);
            }
        }
        match last {
            None => Ok(()),
            Some(last) => Err(ConnectionError::CloseFailed { failed, last }),
        }
    }
}

impl Drop for LogicalConnection {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(schema = %self.schema_name, error = %e, "error closing dropped connection");
        }
    }
}

impl std::fmt::Debug for LogicalConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogicalConnection")
            .field("schema_name", &self.schema_name)
            .field("cached_connections", &self.cached_connections)
            .field("auto_commit", &self.auto_commit)
            .field("closed", &self.closed)
            .finish()
    }
}
