//! Context resolution for logical connections.
//!
//! A [`ContextManager`] answers the three questions a logical connection
//! asks when it is created and used: which datasources back a schema, which
//! transaction rule is in force, and which transaction managers exist.
//! [`StandaloneContextManager`] is the in-process implementation assembled
//! from a [`ShardingConfig`].

use std::collections::HashMap;

use crate::config::ShardingConfig;
use crate::connection::{ConnectionError, ConnectionResult};
use crate::datasource::{DataSourceMap, DataSourceRef};
use crate::transaction::{ProviderRegistry, TransactionCoordinator, TransactionRule};

/// Read-only view of deployment metadata.
pub trait ContextManager: Send + Sync {
    /// Datasources backing `schema_name`, or `None` for an unknown schema.
    fn data_source_map(&self, schema_name: &str) -> Option<&DataSourceMap>;

    /// The configured transaction rule, if any.
    fn transaction_rule(&self) -> Option<&TransactionRule>;

    /// Transaction manager providers available to coordinators.
    fn providers(&self) -> &ProviderRegistry;

    /// Build a coordinator for a new logical connection on `schema_name`.
    fn transaction_coordinator(&self, _schema_name: &str) -> ConnectionResult<TransactionCoordinator> {
        Ok(TransactionCoordinator::new(
            self.transaction_rule(),
            self.providers(),
        )?)
    }
}

/// A [`ContextManager`] built once from configuration and live handles.
pub struct StandaloneContextManager {
    schemas: HashMap<String, DataSourceMap>,
    rule: Option<TransactionRule>,
    providers: ProviderRegistry,
}

impl StandaloneContextManager {
    /// Resolve `config` against the available datasource handles.
    ///
    /// Every datasource named by a schema must have a handle in
    /// `data_sources`; datasource names are global across schemas.
    pub fn new(
        config: &ShardingConfig,
        data_sources: &HashMap<String, DataSourceRef>,
        providers: ProviderRegistry,
    ) -> ConnectionResult<Self> {
        config.validate()?;
        let rule = config.transaction_rule()?;

        let mut schemas = HashMap::with_capacity(config.schemas.len());
        for (schema, schema_config) in &config.schemas {
            let mut map = DataSourceMap::with_capacity(schema_config.data_sources.len());
            for name in &schema_config.data_sources {
                let handle = data_sources.get(name).ok_or_else(|| {
                    ConnectionError::InvalidConfig(format!(
                        "schema {} references datasource {} with no handle",
                        schema, name
                    ))
                })?;
                map.insert(name.clone(), handle.clone());
            }
            schemas.insert(schema.clone(), map);
        }

        Ok(Self {
            schemas,
            rule,
            providers,
        })
    }

    /// Names of the configured schemas.
    pub fn schema_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for StandaloneContextManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandaloneContextManager")
            .field("schemas", &self.schema_names())
            .field("rule", &self.rule)
            .field("providers", &self.providers)
            .finish()
    }
}

impl ContextManager for StandaloneContextManager {
    fn data_source_map(&self, schema_name: &str) -> Option<&DataSourceMap> {
        self.schemas.get(schema_name)
    }

    fn transaction_rule(&self) -> Option<&TransactionRule> {
        self.rule.as_ref()
    }

    fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }
}
