//! Session-scoped transaction state.
//!
//! A [`TransactionTypeState`] belongs to the calling session, not to any one
//! logical connection. Each logical connection opened on the session gets a
//! clone of the same handle, so closing a connection and opening another one
//! keeps the protocol and the open-transaction flag in place. Sessions that
//! create their own handle never see each other's state.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::transaction::types::TransactionType;

#[derive(Debug, Default)]
struct StateInner {
    active_type: TransactionType,
    transaction_open: bool,
}

/// Which protocol is active for a session and whether a transaction is open.
///
/// Cloning yields another handle to the same session state.
#[derive(Debug, Clone, Default)]
pub struct TransactionTypeState {
    inner: Arc<RwLock<StateInner>>,
}

impl TransactionTypeState {
    /// Fresh state for a new session: LOCAL, no open transaction.
    pub fn new() -> Self {
        Self::default()
    }

    /// The active protocol.
    pub fn get(&self) -> TransactionType {
        self.inner.read().active_type
    }

    /// Select the active protocol.
    pub fn set(&self, transaction_type: TransactionType) {
        self.inner.write().active_type = transaction_type;
    }

    /// Reset to LOCAL with no open transaction. Meant for session teardown.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.active_type = TransactionType::default();
        inner.transaction_open = false;
    }

    /// Whether a begin happened without a matching commit or rollback.
    pub fn is_transaction_open(&self) -> bool {
        self.inner.read().transaction_open
    }

    pub fn mark_open(&self) {
        self.inner.write().transaction_open = true;
    }

    pub fn mark_closed(&self) {
        self.inner.write().transaction_open = false;
    }
}
