//! XA (two-phase commit) transaction manager.
//!
//! The manager owns the bookkeeping for one global transaction at a time and
//! drives an external [`XaResourceManager`] through the protocol:
//!
//! ```text
//!   begin ──► start(xid)
//!   enlist ─► enlist(xid, ds, conn)        (once per physical connection)
//!   commit ─► prepare(xid) ─► commit(xid)  (two resources or more)
//!          └► commit(xid, one_phase)        (a single resource)
//!   rollback ► rollback(xid)
//! ```
//!
//! If prepare fails the global transaction is rolled back and the caller gets
//! [`TransactionError::HeuristicRollback`].

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

/// Rule property toggling the single-resource one-phase commit shortcut.
pub const ONE_PHASE_OPTIMIZATION_PROP: &str = "one_phase_optimization";

/// Global transaction identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Xid(String);

impl Xid {
    /// Generate a fresh identifier.
    pub fn generate() -> Self {
        Self(Ulid::new().to_string().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Xid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The external XA resource manager (e.g. an embedded transaction monitor).
pub trait XaResourceManager: Send + Sync {
    fn start(&self, xid: &Xid) -> DriverResult<()>;

    fn enlist(
        &self,
        xid: &Xid,
        data_source_name: &str,
        connection: &PhysicalConnectionRef,
    ) -> DriverResult<()>;

    fn prepare(&self, xid: &Xid) -> DriverResult<()>;

    fn commit(&self, xid: &Xid, one_phase: bool) -> DriverResult<()>;

    fn rollback(&self, xid: &Xid) -> DriverResult<()>;
}

/// Bookkeeping for the active global transaction.
#[derive(Debug, Clone)]
pub struct XaBranch {
    pub xid: Xid,
    pub started_at: DateTime<Utc>,
    /// Distinct datasource names enlisted so far, in enlistment order.
    pub resources: Vec<String>,
}

/// Two-phase commit manager.
pub struct XaTransactionManager {
    resource_manager: Arc<dyn XaResourceManager>,
    one_phase_optimization: bool,
    current: Mutex<Option<XaBranch>>,
}

impl XaTransactionManager {
    pub fn new(resource_manager: Arc<dyn XaResourceManager>) -> Self {
        Self {
            resource_manager,
            one_phase_optimization: true,
            current: Mutex::new(None),
        }
    }

    /// Enable or disable the single-resource one-phase commit shortcut.
    pub fn one_phase_optimization(mut self, enabled: bool) -> Self {
        self.one_phase_optimization = enabled;
        self
    }

    /// Snapshot of the active global transaction, if any.
    pub fn current_branch(&self) -> Option<XaBranch> {
        self.current.lock().clone()
    }

    fn two_phase_commit(&self, branch: &XaBranch) -> TransactionResult<()> {
        let xid = &branch.xid;
        if let Err(e) = self.resource_manager.prepare(xid) {
            error!(xid = %xid, error = %e, "XA prepare failed, rolling back");
            if let Err(rollback_err) = self.resource_manager.rollback(xid) {
                error!(xid = %xid, error = %rollback_err, "XA rollback after failed prepare also failed");
            }
            return Err(TransactionError::HeuristicRollback {
                xid: xid.to_string(),
                message: e.to_string(),
            });
        }
        self.resource_manager
            .commit(xid, false)
            .map_err(|e| TransactionError::resource_manager(xid.as_str(), e.to_string()))
    }
}

impl TransactionManager for XaTransactionManager {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::Xa
    }

    fn begin(&self) -> TransactionResult<()> {
        let mut current = self.current.lock();
        if let Some(branch) = current.as_ref() {
            return Err(TransactionError::InvalidOperation(format!(
                "XA transaction {} is already active",
                branch.xid
            )));
        }

        let xid = Xid::generate();
        self.resource_manager
            .start(&xid)
            .map_err(|e| TransactionError::resource_manager(xid.as_str(), e.to_string()))?;
        debug!(xid = %xid, "XA transaction started");

        *current = Some(XaBranch {
            xid,
            started_at: Utc::now(),
            resources: Vec::new(),
        });
        Ok(())
    }

    fn enlist(
        &self,
        data_source_name: &str,
        connection: &PhysicalConnectionRef,
    ) -> TransactionResult<()> {
        let mut current = self.current.lock();
        let branch = current.as_mut().ok_or_else(|| {
            TransactionError::InvalidOperation("no active XA transaction to enlist in".into())
        })?;

        self.resource_manager
            .enlist(&branch.xid, data_source_name, connection)
            .map_err(|e| TransactionError::resource_manager(branch.xid.as_str(), e.to_string()))?;
        if !branch.resources.iter().any(|r| r == data_source_name) {
            branch.resources.push(data_source_name.to_string());
        }
        debug!(xid = %branch.xid, data_source = data_source_name, "enlisted XA resource");
        Ok(())
    }

    fn commit(&self, _connections: &[PhysicalConnectionRef]) -> TransactionResult<()> {
        let Some(branch) = self.current.lock().take() else {
            debug!("XA commit with no active transaction");
            return Ok(());
        };

        if self.one_phase_optimization && branch.resources.len() <= 1 {
            debug!(xid = %branch.xid, "XA one-phase commit");
            return self
                .resource_manager
                .commit(&branch.xid, true)
                .map_err(|e| TransactionError::resource_manager(branch.xid.as_str(), e.to_string()));
        }

        debug!(xid = %branch.xid, resources = branch.resources.len(), "XA two-phase commit");
        self.two_phase_commit(&branch)
    }

    fn rollback(&self, _connections: &[PhysicalConnectionRef]) -> TransactionResult<()> {
        let Some(branch) = self.current.lock().take() else {
            debug!("XA rollback with no active transaction");
            return Ok(());
        };

        self.resource_manager
            .rollback(&branch.xid)
            .map_err(|e| TransactionError::resource_manager(branch.xid.as_str(), e.to_string()))
    }

    fn is_in_transaction(&self) -> bool {
        self.current.lock().is_some()
    }
}

impl fmt::Debug for XaTransactionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XaTransactionManager")
            .field("one_phase_optimization", &self.one_phase_optimization)
            .field("current", &self.current.lock().as_ref().map(|b| b.xid.clone()))
            .finish()
    }
}

/// Provider building [`XaTransactionManager`]s over one resource manager.
pub struct XaTransactionManagerProvider {
    provider_type: String,
    resource_manager: Arc<dyn XaResourceManager>,
}

impl XaTransactionManagerProvider {
    pub fn new(
        provider_type: impl Into<String>,
        resource_manager: Arc<dyn XaResourceManager>,
    ) -> Self {
        Self {
            provider_type: provider_type.into(),
            resource_manager,
        }
    }
}

impl TransactionManagerProvider for XaTransactionManagerProvider {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::Xa
    }

    fn provider_type(&self) -> &str {
        &self.provider_type
    }

    fn create(&self, rule: &TransactionRule) -> TransactionResult<Box<dyn TransactionManager>> {
        let one_phase = rule
            .bool_prop(ONE_PHASE_OPTIMIZATION_PROP)
            .map_err(|raw| TransactionError::Provider {
                provider: self.provider_type.clone(),
                transaction_type: TransactionType::Xa,
                message: format!("{ONE_PHASE_OPTIMIZATION_PROP} must be true or false, got {raw:?}"),
            })?
            .unwrap_or(true);
        let manager = XaTransactionManager::new(self.resource_manager.clone())
            .one_phase_optimization(one_phase);
        Ok(Box::new(manager))
    }
}
