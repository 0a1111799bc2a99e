//! BASE (saga) transaction manager.
//!
//! Each unit of work is a saga: begin opens a global saga context in the
//! external [`SagaEngine`], every enlisted datasource is registered as a
//! branch, commit lets the engine run the forward actions to completion and
//! rollback asks it to run the compensating actions.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, error};
use ulid::Ulid;

use crate::datasource::{DriverResult, PhysicalConnectionRef};
use crate::transaction::error::{TransactionError, TransactionResult};
use crate::transaction::manager::{TransactionManager, TransactionManagerProvider};
use crate::transaction::rule::TransactionRule;
use crate::transaction::types::TransactionType;

/// The external saga / compensation engine.
pub trait SagaEngine: Send + Sync {
    fn begin_global(&self, saga_id: &str) -> DriverResult<()>;

    fn register_branch(&self, saga_id: &str, data_source_name: &str) -> DriverResult<()>;

    fn commit_global(&self, saga_id: &str) -> DriverResult<()>;

    fn rollback_global(&self, saga_id: &str) -> DriverResult<()>;
}

/// Bookkeeping for the active saga.
#[derive(Debug, Clone)]
pub struct SagaContext {
    pub saga_id: String,
    pub started_at: DateTime<Utc>,
    /// Registered branches, one per distinct datasource.
    pub branches: Vec<String>,
}

/// Compensation-based transaction manager.
pub struct BaseTransactionManager {
    engine: Arc<dyn SagaEngine>,
    current: Mutex<Option<SagaContext>>,
}

impl BaseTransactionManager {
    pub fn new(engine: Arc<dyn SagaEngine>) -> Self {
        Self {
            engine,
            current: Mutex::new(None),
        }
    }

    /// Snapshot of the active saga, if any.
    pub fn current_saga(&self) -> Option<SagaContext> {
        self.current.lock().clone()
    }
}

impl TransactionManager for BaseTransactionManager {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::Base
    }

    fn begin(&self) -> TransactionResult<()> {
        let mut current = self.current.lock();
        if let Some(saga) = current.as_ref() {
            return Err(TransactionError::InvalidOperation(format!(
                "saga {} is already active",
                saga.saga_id
            )));
        }

        let saga_id = Ulid::new().to_string().to_lowercase();
        self.engine
            .begin_global(&saga_id)
            .map_err(|e| TransactionError::saga(&saga_id, e.to_string()))?;
        debug!(saga_id = %saga_id, "saga started");

        *current = Some(SagaContext {
            saga_id,
            started_at: Utc::now(),
            branches: Vec::new(),
        });
        Ok(())
    }

    fn enlist(
        &self,
        data_source_name: &str,
        _connection: &PhysicalConnectionRef,
    ) -> TransactionResult<()> {
        let mut current = self.current.lock();
        let saga = current.as_mut().ok_or_else(|| {
            TransactionError::InvalidOperation("no active saga to register a branch in".into())
        })?;

        if saga.branches.iter().any(|b| b == data_source_name) {
            return Ok(());
        }
        self.engine
            .register_branch(&saga.saga_id, data_source_name)
            .map_err(|e| TransactionError::saga(&saga.saga_id, e.to_string()))?;
        saga.branches.push(data_source_name.to_string());
        Ok(())
    }

    fn commit(&self, _connections: &[PhysicalConnectionRef]) -> TransactionResult<()> {
        let Some(saga) = self.current.lock().take() else {
            debug!("saga commit with no active saga");
            return Ok(());
        };

        self.engine
            .commit_global(&saga.saga_id)
            .map_err(|e| TransactionError::saga(&saga.saga_id, e.to_string()))
    }

    fn rollback(&self, _connections: &[PhysicalConnectionRef]) -> TransactionResult<()> {
        let Some(saga) = self.current.lock().take() else {
            debug!("saga rollback with no active saga");
            return Ok(());
        };

        self.engine.rollback_global(&saga.saga_id).map_err(|e| {
            error!(saga_id = %saga.saga_id, branches = saga.branches.len(), error = %e, "saga compensation failed");
            TransactionError::saga(&saga.saga_id, e.to_string())
        })
    }

    fn is_in_transaction(&self) -> bool {
        self.current.lock().is_some()
    }
}

impl fmt::Debug for BaseTransactionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseTransactionManager")
            .field("current", &self.current.lock().as_ref().map(|s| s.saga_id.clone()))
            .finish()
    }
}

/// Provider building [`BaseTransactionManager`]s over one saga engine.
pub struct BaseTransactionManagerProvider {
    provider_type: String,
    engine: Arc<dyn SagaEngine>,
}

impl BaseTransactionManagerProvider {
    pub fn new(provider_type: impl Into<String>, engine: Arc<dyn SagaEngine>) -> Self {
        Self {
            provider_type: provider_type.into(),
            engine,
        }
    }
}

impl TransactionManagerProvider for BaseTransactionManagerProvider {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::Base
    }

    fn provider_type(&self) -> &str {
        &self.provider_type
    }

    fn create(&self, _rule: &TransactionRule) -> TransactionResult<Box<dyn TransactionManager>> {
        Ok(Box::new(BaseTransactionManager::new(self.engine.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{MockConnection, RecordingSagaEngine};

    fn setup() -> (Arc<RecordingSagaEngine>, BaseTransactionManager) {
        let engine = Arc::new(RecordingSagaEngine::default());
        let manager = BaseTransactionManager::new(engine.clone());
        (engine, manager)
    }

    #[test]
    fn test_saga_commit() {
        let (engine, manager) = setup();
        manager.begin().unwrap();
        let saga_id = manager.current_saga().unwrap().saga_id;
        let conn: PhysicalConnectionRef = MockConnection::new();
        manager.enlist("ds_0", &conn).unwrap();
        manager.enlist("ds_0", &conn).unwrap();
        manager.enlist("ds_1", &conn).unwrap();
        manager.commit(&[]).unwrap();

        assert_eq!(
            engine.calls(),
            vec![
                format!("begin {saga_id}"),
                format!("branch {saga_id} ds_0"),
                format!("branch {saga_id} ds_1"),
                format!("commit {saga_id}"),
            ]
        );
        assert!(!manager.is_in_transaction());
    }

    #[test]
    fn test_saga_compensation_failure() {
        let engine = Arc::new(RecordingSagaEngine::default().fail_rollback());
        let manager = BaseTransactionManager::new(engine);
        manager.begin().unwrap();
        let err = manager.rollback(&[]).unwrap_err();
        assert!(matches!(err, TransactionError::Saga { .. }));
        assert!(!manager.is_in_transaction());
    }

    #[test]
    fn test_no_saga_is_noop() {
        let (engine, manager) = setup();
        manager.commit(&[]).unwrap();
        manager.rollback(&[]).unwrap();
        assert!(engine.calls().is_empty());
    }
}
