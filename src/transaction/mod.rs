//! Transaction protocols and their coordination.
//!
//! A logical connection never talks to a transaction implementation
//! directly. It asks the session's [`TransactionTypeState`] which protocol is
//! active and hands the call to its [`TransactionCoordinator`], which owns one
//! [`TransactionManager`] per available protocol.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  TransactionCoordinator                     │
//! │        (protocol -> manager registry, dispatch)             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │    LOCAL    │       │     XA      │       │    BASE     │
//!  │ (native tx) │       │ (2PC via RM)│       │   (saga)    │
//!  └─────────────┘       └─────────────┘       └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use shardlink::transaction::{ProviderRegistry, TransactionCoordinator, TransactionRule, TransactionType};
//!
//! let rule = TransactionRule::new(TransactionType::Xa);
//! let coordinator = TransactionCoordinator::new(Some(&rule), &providers)?;
//!
//! coordinator.begin(TransactionType::Xa)?;
//! coordinator.commit(TransactionType::Xa, &connections)?;
//! ```

mod base;
mod coordinator;
mod error;
mod isolation;
mod manager;
mod rule;
mod state;
mod types;
mod xa;

pub use base::{BaseTransactionManager, BaseTransactionManagerProvider, SagaContext, SagaEngine};
pub use coordinator::TransactionCoordinator;
pub use error::{TransactionError, TransactionResult};
pub use isolation::IsolationLevel;
pub use manager::{
    LocalTransactionManager, ProviderRegistry, TransactionManager, TransactionManagerProvider,
};
pub use rule::TransactionRule;
pub use state::TransactionTypeState;
pub use types::{TransactionOperationType, TransactionType};
pub use xa::{
    XaBranch, XaResourceManager, XaTransactionManager, XaTransactionManagerProvider, Xid,
    ONE_PHASE_OPTIMIZATION_PROP,
};
