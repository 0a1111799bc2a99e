//! Test doubles shared by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::datasource::{DataSource, DriverError, DriverResult, PhysicalConnection, PhysicalConnectionRef};
use crate::transaction::{
    IsolationLevel, SagaEngine, TransactionManager, TransactionManagerProvider,
    TransactionOperationType, TransactionResult, TransactionRule, TransactionType,
    XaResourceManager, Xid,
};

/// Physical connection recording every call made to it.
#[derive(Debug, Default)]
pub struct MockConnection {
    invalid: AtomicBool,
    isolation: Mutex<IsolationLevel>,
    read_only_calls: Mutex<Vec<bool>>,
    isolation_calls: Mutex<Vec<IsolationLevel>>,
    auto_commit_calls: Mutex<Vec<bool>>,
    validity_checks: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    closes: AtomicUsize,
    fail_rollback: Mutex<Option<String>>,
    fail_close: Mutex<Option<String>>,
}

impl MockConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn invalid(self: Arc<Self>) -> Arc<Self> {
        self.invalid.store(true, Ordering::SeqCst);
        self
    }

    pub fn fail_rollback(self: Arc<Self>, message: &str) -> Arc<Self> {
        *self.fail_rollback.lock() = Some(message.to_string());
        self
    }

    pub fn fail_close(self: Arc<Self>, message: &str) -> Arc<Self> {
        *self.fail_close.lock() = Some(message.to_string());
        self
    }

    pub fn read_only_calls(&self) -> Vec<bool> {
        self.read_only_calls.lock().clone()
    }

    pub fn isolation_calls(&self) -> Vec<IsolationLevel> {
        self.isolation_calls.lock().clone()
    }

    pub fn auto_commit_calls(&self) -> Vec<bool> {
        self.auto_commit_calls.lock().clone()
    }

    pub fn validity_checks(&self) -> usize {
        self.validity_checks.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

fn failure(slot: &Mutex<Option<String>>) -> DriverResult<()> {
    match slot.lock().as_ref() {
        Some(message) => Err(DriverError::new(message.clone())),
        None => Ok(()),
    }
}

impl PhysicalConnection for MockConnection {
    fn is_valid(&self, _timeout_seconds: u32) -> DriverResult<bool> {
        self.validity_checks.fetch_add(1, Ordering::SeqCst);
        Ok(!self.invalid.load(Ordering::SeqCst))
    }

    fn set_read_only(&self, read_only: bool) -> DriverResult<()> {
        self.read_only_calls.lock().push(read_only);
        Ok(())
    }

    fn set_transaction_isolation(&self, level: IsolationLevel) -> DriverResult<()> {
        self.isolation_calls.lock().push(level);
        *self.isolation.lock() = level;
        Ok(())
    }

    fn transaction_isolation(&self) -> DriverResult<IsolationLevel> {
        Ok(*self.isolation.lock())
    }

    fn set_auto_commit(&self, auto_commit: bool) -> DriverResult<()> {
        self.auto_commit_calls.lock().push(auto_commit);
        Ok(())
    }

    fn commit(&self) -> DriverResult<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rollback(&self) -> DriverResult<()> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        failure(&self.fail_rollback)
    }

    fn close(&self) -> DriverResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        failure(&self.fail_close)
    }
}

/// Datasource handing out fresh [`MockConnection`]s.
#[derive(Debug, Default)]
pub struct MockDataSource {
    fail: Option<String>,
    opened: Mutex<Vec<Arc<MockConnection>>>,
}

impl MockDataSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            fail: Some(message.to_string()),
            opened: Mutex::new(Vec::new()),
        })
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().len()
    }

    pub fn opened(&self) -> Vec<Arc<MockConnection>> {
        self.opened.lock().clone()
    }
}

impl DataSource for MockDataSource {
    fn open(&self) -> DriverResult<PhysicalConnectionRef> {
        if let Some(message) = &self.fail {
            return Err(DriverError::new(message.clone()).with_sql_state("08001"));
        }
        let connection = MockConnection::new();
        self.opened.lock().push(connection.clone());
        Ok(connection as PhysicalConnectionRef)
    }
}

/// Shared record of what a [`RecordingManager`] was asked to do.
#[derive(Debug, Clone, Default)]
pub struct InvocationLog {
    operations: Arc<Mutex<Vec<TransactionOperationType>>>,
    enlisted: Arc<Mutex<Vec<String>>>,
}

impl InvocationLog {
    pub fn operations(&self) -> Vec<TransactionOperationType> {
        self.operations.lock().clone()
    }

    pub fn count(&self, operation: TransactionOperationType) -> usize {
        self.operations
            .lock()
            .iter()
            .filter(|op| **op == operation)
            .count()
    }

    pub fn enlisted(&self) -> Vec<String> {
        self.enlisted.lock().clone()
    }
}

/// Manager that records invocations and never fails.
pub struct RecordingManager {
    transaction_type: TransactionType,
    log: InvocationLog,
    active: AtomicBool,
}

impl TransactionManager for RecordingManager {
    fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }

    fn begin(&self) -> TransactionResult<()> {
        self.log.operations.lock().push(TransactionOperationType::Begin);
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn enlist(&self, data_source_name: &str, _connection: &PhysicalConnectionRef) -> TransactionResult<()> {
        self.log.enlisted.lock().push(data_source_name.to_string());
        Ok(())
    }

    fn commit(&self, _connections: &[PhysicalConnectionRef]) -> TransactionResult<()> {
        self.log.operations.lock().push(TransactionOperationType::Commit);
        self.active.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn rollback(&self, _connections: &[PhysicalConnectionRef]) -> TransactionResult<()> {
        self.log.operations.lock().push(TransactionOperationType::Rollback);
        self.active.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_in_transaction(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Provider of [`RecordingManager`]s sharing one [`InvocationLog`].
pub struct RecordingProvider {
    transaction_type: TransactionType,
    provider_type: String,
    log: InvocationLog,
}

impl RecordingProvider {
    pub fn new(
        transaction_type: TransactionType,
        provider_type: &str,
    ) -> (Arc<dyn TransactionManagerProvider>, InvocationLog) {
        let log = InvocationLog::default();
        let provider: Arc<dyn TransactionManagerProvider> = Arc::new(Self {
            transaction_type,
            provider_type: provider_type.to_string(),
            log: log.clone(),
        });
        (provider, log)
    }
}

impl TransactionManagerProvider for RecordingProvider {
    fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }

    fn provider_type(&self) -> &str {
        &self.provider_type
    }

    fn create(&self, _rule: &TransactionRule) -> TransactionResult<Box<dyn TransactionManager>> {
        Ok(Box::new(RecordingManager {
            transaction_type: self.transaction_type,
            log: self.log.clone(),
            active: AtomicBool::new(false),
        }))
    }
}

/// XA resource manager recording calls as strings.
#[derive(Debug, Default)]
pub struct RecordingResourceManager {
    fail_prepare: bool,
    calls: Mutex<Vec<String>>,
}

impl RecordingResourceManager {
    pub fn fail_prepare(mut self) -> Self {
        self.fail_prepare = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl XaResourceManager for RecordingResourceManager {
    fn start(&self, xid: &Xid) -> DriverResult<()> {
        self.calls.lock().push(format!("start {xid}"));
        Ok(())
    }

    fn enlist(&self, xid: &Xid, data_source_name: &str, _connection: &PhysicalConnectionRef) -> DriverResult<()> {
        self.calls.lock().push(format!("enlist {xid} {data_source_name}"));
        Ok(())
    }

    fn prepare(&self, xid: &Xid) -> DriverResult<()> {
        self.calls.lock().push(format!("prepare {xid}"));
        if self.fail_prepare {
            return Err(DriverError::new("prepare vote: rollback"));
        }
        Ok(())
    }

    fn commit(&self, xid: &Xid, one_phase: bool) -> DriverResult<()> {
        let phase = if one_phase { "one-phase" } else { "two-phase" };
        self.calls.lock().push(format!("commit {xid} {phase}"));
        Ok(())
    }

    fn rollback(&self, xid: &Xid) -> DriverResult<()> {
        self.calls.lock().push(format!("rollback {xid}"));
        Ok(())
    }
}

/// Saga engine recording calls as strings.
#[derive(Debug, Default)]
pub struct RecordingSagaEngine {
    fail_rollback: bool,
    calls: Mutex<Vec<String>>,
}

impl RecordingSagaEngine {
    pub fn fail_rollback(mut self) -> Self {
        self.fail_rollback = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl SagaEngine for RecordingSagaEngine {
    fn begin_global(&self, saga_id: &str) -> DriverResult<()> {
        self.calls.lock().push(format!("begin {saga_id}"));
        Ok(())
    }

    fn register_branch(&self, saga_id: &str, data_source_name: &str) -> DriverResult<()> {
        self.calls.lock().push(format!("branch {saga_id} {data_source_name}"));
        Ok(())
    }

    fn commit_global(&self, saga_id: &str) -> DriverResult<()> {
        self.calls.lock().push(format!("commit {saga_id}"));
        Ok(())
    }

    fn rollback_global(&self, saga_id: &str) -> DriverResult<()> {
        self.calls.lock().push(format!("rollback {saga_id}"));
        if self.fail_rollback {
            return Err(DriverError::new("compensation for branch failed"));
        }
        Ok(())
    }
}
