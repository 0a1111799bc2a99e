//! Resolved transaction rule.

use std::collections::BTreeMap;

use crate::transaction::types::TransactionType;

/// The transaction protocol configured for a deployment.
///
/// Built from [`crate::config::TransactionRuleConfiguration`]. When no rule is
/// configured, LOCAL is the only protocol available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRule {
    /// Protocol used by connections created under this rule.
    pub default_type: TransactionType,
    /// Which provider implementation to pick for the protocol. `None` picks
    /// the first registered provider for the protocol.
    pub provider_type: Option<String>,
    /// Provider-specific settings.
    pub props: BTreeMap<String, String>,
}

impl TransactionRule {
    pub fn new(default_type: TransactionType) -> Self {
        Self {
            default_type,
            provider_type: None,
            props: BTreeMap::new(),
        }
    }

    /// Set the provider type.
    pub fn provider_type(mut self, provider_type: impl Into<String>) -> Self {
        self.provider_type = Some(provider_type.into());
        self
    }

    /// Add a provider property.
    pub fn prop(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    /// Read a boolean property. `Ok(None)` when absent; `Err` carries the raw
    /// value when it is neither `true` nor `false`.
    pub fn bool_prop(&self, key: &str) -> Result<Option<bool>, &str> {
        match self.props.get(key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse().map(Some).map_err(|_| raw.as_str()),
        }
    }
}
