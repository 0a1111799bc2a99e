//! Transaction coordinator - dispatches lifecycle calls by protocol.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::datasource::PhysicalConnectionRef;
use crate::transaction::error::{TransactionError, TransactionResult};
use crate::transaction::manager::{LocalTransactionManager, ProviderRegistry, TransactionManager};
use crate::transaction::rule::TransactionRule;
use crate::transaction::types::{TransactionOperationType, TransactionType};

/// Registry of one manager per protocol.
///
/// LOCAL is always registered. A distributed protocol is registered only when
/// the transaction rule selects it and a matching provider exists.
pub struct TransactionCoordinator {
    managers: HashMap<TransactionType, Box<dyn TransactionManager>>,
}

impl TransactionCoordinator {
    /// A coordinator that only knows LOCAL.
    pub fn local() -> Self {
        let mut managers: HashMap<TransactionType, Box<dyn TransactionManager>> = HashMap::new();
        managers.insert(TransactionType::Local, Box::new(LocalTransactionManager::new()));
        Self { managers }
    }

    /// Build the coordinator for `rule` from the available providers.
    ///
    /// A rule naming a protocol that no provider implements is not an error
    /// here; it surfaces as [`TransactionError::UnsupportedType`] once a
    /// transaction is begun under that protocol.
    pub fn new(
        rule: Option<&TransactionRule>,
        providers: &ProviderRegistry,
    ) -> TransactionResult<Self> {
        let mut coordinator = Self::local();
        let Some(rule) = rule else {
            return Ok(coordinator);
        };
        if !rule.default_type.is_distributed() {
            return Ok(coordinator);
        }

        match providers.find(rule.default_type, rule.provider_type.as_deref()) {
            Some(provider) => {
                let manager = provider.create(rule)?;
                debug!(
                    transaction_type = %rule.default_type,
                    provider = provider.provider_type(),
                    "registered transaction manager"
                );
                coordinator.register(manager);
            }
            None => {
                warn!(
                    transaction_type = %rule.default_type,
                    provider = rule.provider_type.as_deref().unwrap_or("<any>"),
                    "no transaction manager provider found"
                );
            }
        }
        Ok(coordinator)
    }

    /// Register (or replace) the manager for its protocol.
    pub fn register(&mut self, manager: Box<dyn TransactionManager>) {
        self.managers.insert(manager.transaction_type(), manager);
    }

    /// Whether a manager is registered for `transaction_type`.
    pub fn supports(&self, transaction_type: TransactionType) -> bool {
        self.managers.contains_key(&transaction_type)
    }

    /// Registered protocols in declaration order.
    pub fn registered_types(&self) -> Vec<TransactionType> {
        TransactionType::ALL
            .into_iter()
            .filter(|t| self.supports(*t))
            .collect()
    }

    /// The manager for `transaction_type`.
    pub fn manager(
        &self,
        transaction_type: TransactionType,
    ) -> TransactionResult<&dyn TransactionManager> {
        self.managers
            .get(&transaction_type)
            .map(|m| m.as_ref())
            .ok_or(TransactionError::UnsupportedType(transaction_type))
    }

    /// Whether the manager for `transaction_type` tracks an active unit of
    /// work. False when no such manager is registered.
    pub fn is_in_transaction(&self, transaction_type: TransactionType) -> bool {
        self.managers
            .get(&transaction_type)
            .map_or(false, |m| m.is_in_transaction())
    }

    pub fn begin(&self, transaction_type: TransactionType) -> TransactionResult<()> {
        self.dispatch(transaction_type, TransactionOperationType::Begin, &[])
    }

    pub fn enlist(
        &self,
        transaction_type: TransactionType,
        data_source_name: &str,
        connection: &PhysicalConnectionRef,
    ) -> TransactionResult<()> {
        self.manager(transaction_type)?
            .enlist(data_source_name, connection)
    }

    pub fn commit(
        &self,
        transaction_type: TransactionType,
        connections: &[PhysicalConnectionRef],
    ) -> TransactionResult<()> {
        self.dispatch(transaction_type, TransactionOperationType::Commit, connections)
    }

    pub fn rollback(
        &self,
        transaction_type: TransactionType,
        connections: &[PhysicalConnectionRef],
    ) -> TransactionResult<()> {
        self.dispatch(transaction_type, TransactionOperationType::Rollback, connections)
    }

    fn dispatch(
        &self,
        transaction_type: TransactionType,
        operation: TransactionOperationType,
        connections: &[PhysicalConnectionRef],
    ) -> TransactionResult<()> {
        let manager = self.manager(transaction_type)?;
        debug!(
            transaction_type = %transaction_type,
            operation = %operation,
            connections = connections.len(),
            "dispatching transaction operation"
        );
        match operation {
            TransactionOperationType::Begin => manager.begin(),
            TransactionOperationType::Commit => manager.commit(connections),
            TransactionOperationType::Rollback => manager.rollback(connections),
        }
    }
}

impl std::fmt::Debug for TransactionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionCoordinator")
            .field("registered", &self.registered_types())
            .finish()
    }
}
