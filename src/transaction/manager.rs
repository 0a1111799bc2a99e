//! Transaction manager capability and the LOCAL implementation.
//!
//! A [`TransactionManager`] runs units of work under exactly one protocol.
//! LOCAL needs nothing but the physical connections themselves; XA and BASE
//! managers are built by a [`TransactionManagerProvider`] found in the
//! [`ProviderRegistry`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::datasource::{DriverError, PhysicalConnectionRef};
use crate::transaction::error::{TransactionError, TransactionResult};
use crate::transaction::rule::TransactionRule;
use crate::transaction::types::TransactionType;

/// Begins, commits and rolls back units of work under one protocol.
pub trait TransactionManager: Send + Sync {
    /// The protocol this manager implements.
    fn transaction_type(&self) -> TransactionType;

    /// Start a unit of work.
    fn begin(&self) -> TransactionResult<()>;

    /// Make a physical connection part of the current unit of work.
    fn enlist(
        &self,
        data_source_name: &str,
        connection: &PhysicalConnectionRef,
    ) -> TransactionResult<()>;

    /// Complete the current unit of work. Must be a no-op when none is active.
    fn commit(&self, connections: &[PhysicalConnectionRef]) -> TransactionResult<()>;

    /// Abandon the current unit of work. Must be a no-op when none is active.
    fn rollback(&self, connections: &[PhysicalConnectionRef]) -> TransactionResult<()>;

    /// Whether this manager currently tracks an active unit of work.
    fn is_in_transaction(&self) -> bool;
}

/// Native per-connection transactions.
///
/// Begin only marks the unit of work active; enlisting turns native
/// autocommit off, and commit or rollback are applied to every connection in
/// order. A failing connection does not stop the others from being completed.
#[derive(Debug, Default)]
pub struct LocalTransactionManager {
    active: AtomicBool,
}

impl LocalTransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn complete_all(
        connections: &[PhysicalConnectionRef],
        op: impl Fn(&PhysicalConnectionRef) -> Result<(), DriverError>,
    ) -> TransactionResult<()> {
        let mut failed = 0;
        let mut last = None;
        for connection in connections {
            if let Err(e) = op(connection) {
                failed += 1;
                last = Some(e);
            }
        }
        match last {
            None => Ok(()),
            Some(source) => Err(TransactionError::Local {
                failed,
                total: connections.len(),
                source,
            }),
        }
    }
}

impl TransactionManager for LocalTransactionManager {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::Local
    }

    fn begin(&self) -> TransactionResult<()> {
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn enlist(
        &self,
        data_source_name: &str,
        connection: &PhysicalConnectionRef,
    ) -> TransactionResult<()> {
        debug!(data_source = data_source_name, "disabling native autocommit");
        connection.set_auto_commit(false)?;
        Ok(())
    }

    fn commit(&self, connections: &[PhysicalConnectionRef]) -> TransactionResult<()> {
        self.active.store(false, Ordering::SeqCst);
        Self::complete_all(connections, |c| c.commit())
    }

    fn rollback(&self, connections: &[PhysicalConnectionRef]) -> TransactionResult<()> {
        self.active.store(false, Ordering::SeqCst);
        Self::complete_all(connections, |c| c.rollback())
    }

    fn is_in_transaction(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Factory for the manager of one distributed protocol.
pub trait TransactionManagerProvider: Send + Sync {
    /// The protocol the created managers implement.
    fn transaction_type(&self) -> TransactionType;

    /// Identifier matched against [`TransactionRule::provider_type`].
    fn provider_type(&self) -> &str;

    /// Build a manager configured by `rule`.
    fn create(&self, rule: &TransactionRule) -> TransactionResult<Box<dyn TransactionManager>>;
}

/// The transaction manager providers available to a deployment.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn TransactionManagerProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider. Earlier registrations win when several match.
    pub fn register(&mut self, provider: Arc<dyn TransactionManagerProvider>) -> &mut Self {
        self.providers.push(provider);
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, provider: Arc<dyn TransactionManagerProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Find the provider for `transaction_type`, optionally narrowed to one
    /// provider identifier (compared case-insensitively).
    pub fn find(
        &self,
        transaction_type: TransactionType,
        provider_type: Option<&str>,
    ) -> Option<&Arc<dyn TransactionManagerProvider>> {
        self.providers.iter().find(|p| {
            p.transaction_type() == transaction_type
                && provider_type.map_or(true, |name| p.provider_type().eq_ignore_ascii_case(name))
        })
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(
                self.providers
                    .iter()
                    .map(|p| format!("{}:{}", p.transaction_type(), p.provider_type())),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{MockConnection, RecordingProvider};

    #[test]
    fn test_local_enlist_disables_autocommit() {
        let manager = LocalTransactionManager::new();
        let mock = MockConnection::new();
        let conn: PhysicalConnectionRef = mock.clone();
        manager.enlist("ds_0", &conn).unwrap();
        assert_eq!(mock.auto_commit_calls(), vec![false]);
    }

    #[test]
    fn test_local_commit_all() {
        let manager = LocalTransactionManager::new();
        let a = MockConnection::new();
        let b = MockConnection::new();
        let conns: Vec<PhysicalConnectionRef> = vec![a.clone(), b.clone()];
        manager.commit(&conns).unwrap();
        assert_eq!(a.commits(), 1);
        assert_eq!(b.commits(), 1);
    }

    #[test]
    fn test_local_rollback_continues_after_failure() {
        let manager = LocalTransactionManager::new();
        let a = MockConnection::new().fail_rollback("first down");
        let b = MockConnection::new();
        let c = MockConnection::new().fail_rollback("third down");
        let conns: Vec<PhysicalConnectionRef> = vec![a.clone(), b.clone(), c.clone()];

        let err = manager.rollback(&conns).unwrap_err();
        match err {
            TransactionError::Local {
                failed,
                total,
                source,
            } => {
                assert_eq!(failed, 2);
                assert_eq!(total, 3);
                assert_eq!(source.message, "third down");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(b.rollbacks(), 1);
    }

    #[test]
    fn test_local_tracks_active_unit_of_work() {
        let manager = LocalTransactionManager::new();
        manager.begin().unwrap();
        assert!(manager.is_in_transaction());
        manager.commit(&[]).unwrap();
        assert!(!manager.is_in_transaction());

        manager.begin().unwrap();
        manager.rollback(&[]).unwrap();
        assert!(!manager.is_in_transaction());
    }

    #[test]
    fn test_local_commit_without_connections() {
        let manager = LocalTransactionManager::new();
        assert!(manager.commit(&[]).is_ok());
        assert!(manager.rollback(&[]).is_ok());
        assert!(!manager.is_in_transaction());
    }

    #[test]
    fn test_registry_find() {
        let (xa, _) = RecordingProvider::new(TransactionType::Xa, "Atomikos");
        let (xa_alt, _) = RecordingProvider::new(TransactionType::Xa, "Narayana");
        let (base, _) = RecordingProvider::new(TransactionType::Base, "Seata");
        let registry = ProviderRegistry::new().with(xa).with(xa_alt).with(base);

        assert_eq!(registry.len(), 3);
        let found = registry.find(TransactionType::Xa, None).unwrap();
        assert_eq!(found.provider_type(), "Atomikos");
        let found = registry.find(TransactionType::Xa, Some("narayana")).unwrap();
        assert_eq!(found.provider_type(), "Narayana");
        assert!(registry.find(TransactionType::Base, Some("Atomikos")).is_none());
        assert!(registry.find(TransactionType::Local, None).is_none());
    }
}
