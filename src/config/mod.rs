//! Deployment configuration.
//!
//! Configuration is plain data read from JSON:
//!
//! ```json
//! {
//!   "schemas": {
//!     "sharding_db": { "data_sources": ["ds_0", "ds_1"] }
//!   },
//!   "transaction": { "default_type": "XA", "provider_type": "Atomikos" }
//! }
//! ```
//!
//! A missing `transaction` section means only LOCAL transactions exist.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transaction::{TransactionRule, TransactionType};

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unknown transaction type: {0}")]
    UnknownTransactionType(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// The transaction section as written in configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRuleConfiguration {
    /// Protocol name: `LOCAL`, `XA` or `BASE` (any case).
    pub default_type: String,
    /// Provider identifier, e.g. `Atomikos`.
    #[serde(default)]
    pub provider_type: Option<String>,
    /// Provider-specific settings.
    #[serde(default)]
    pub props: BTreeMap<String, String>,
}

impl TransactionRuleConfiguration {
    pub fn new(default_type: impl Into<String>, provider_type: Option<String>) -> Self {
        Self {
            default_type: default_type.into(),
            provider_type,
            props: BTreeMap::new(),
        }
    }
}

impl TryFrom<&TransactionRuleConfiguration> for TransactionRule {
    type Error = ConfigError;

    fn try_from(config: &TransactionRuleConfiguration) -> ConfigResult<Self> {
        let default_type: TransactionType = config
            .default_type
            .parse()
            .map_err(|_| ConfigError::UnknownTransactionType(config.default_type.clone()))?;
        Ok(TransactionRule {
            default_type,
            provider_type: config.provider_type.clone(),
            props: config.props.clone(),
        })
    }
}

/// One logical schema and the datasources behind it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub data_sources: Vec<String>,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardingConfig {
    #[serde(default)]
    pub schemas: BTreeMap<String, SchemaConfig>,
    #[serde(default)]
    pub transaction: Option<TransactionRuleConfiguration>,
}

impl ShardingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a schema with its datasource names.
    pub fn schema<I, S>(mut self, name: impl Into<String>, data_sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schemas.insert(
            name.into(),
            SchemaConfig {
                data_sources: data_sources.into_iter().map(Into::into).collect(),
            },
        );
        self
    }

    /// Set the transaction section.
    pub fn transaction(mut self, rule: TransactionRuleConfiguration) -> Self {
        self.transaction = Some(rule);
        self
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Check structural rules that serde cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        for (schema, config) in &self.schemas {
            if schema.trim().is_empty() {
                return Err(ConfigError::Invalid("schema name must not be empty".into()));
            }
            let mut seen = HashSet::new();
            for name in &config.data_sources {
                if name.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "schema {} has an empty datasource name",
                        schema
                    )));
                }
                if !seen.insert(name.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "schema {} lists datasource {} twice",
                        schema, name
                    )));
                }
            }
        }
        self.transaction_rule()?;
        Ok(())
    }

    /// The resolved transaction rule, if one is configured.
    pub fn transaction_rule(&self) -> ConfigResult<Option<TransactionRule>> {
        self.transaction
            .as_ref()
            .map(TransactionRule::try_from)
            .transpose()
    }
}
