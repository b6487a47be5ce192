//! Static routing table from logical keys to physical providers.

use crate::{
    config::ObjectStorageConfig,
    models::{ProviderType, StorageClass},
};
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

/// Routing lookup input.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub env: String,
    pub logical_region: String,
    pub bucket: String,
    pub storage_class: StorageClass,
}

/// Routing lookup output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteResult {
    pub provider_name: String,
    pub provider_type: ProviderType,
    pub provider_region: String,
    pub provider_bucket: String,
}

#[derive(Debug, Error)]
#[error(
    "no route for env `{}` region `{}` bucket `{}` class `{}`",
    .0.env, .0.logical_region, .0.bucket, .0.storage_class
)]
pub struct RouteNotFound(pub RouteKey);

/// Exact-match routing table, built once at startup and never mutated.
#[derive(Debug, Default)]
pub struct RoutingTable {
    routes: Vec<(RouteKey, RouteResult)>,
}

impl RoutingTable {
    /// Build the table from configuration.
    ///
    /// Rules naming a provider that is not defined are skipped with a warning.
    pub fn from_config(cfg: &ObjectStorageConfig) -> Self {
        let providers: HashMap<&str, _> = cfg
            .providers
            .iter()
            .map(|p| (p.name.as_str(), p))
            .collect();

        let mut routes = Vec::with_capacity(cfg.routes.len());
        for rule in &cfg.routes {
            let Some(provider) = providers.get(rule.provider_name.as_str()) else {
                warn!(
                    "dropping route {}/{}/{}/{}: unknown provider `{}`",
                    rule.env,
                    rule.logical_region,
                    rule.bucket,
                    rule.storage_class,
                    rule.provider_name
                );
                continue;
            };
            routes.push((
                RouteKey {
                    env: rule.env.clone(),
                    logical_region: rule.logical_region.clone(),
                    bucket: rule.bucket.clone(),
                    storage_class: rule.storage_class.clone(),
                },
                RouteResult {
                    provider_name: provider.name.clone(),
                    provider_type: provider.provider_type,
                    provider_region: provider.region.clone(),
                    provider_bucket: rule.provider_bucket.clone(),
                },
            ));
        }

        Self { routes }
    }

    /// First route whose key equals `key` exactly. No wildcards, no fallback
    /// to another storage class.
    pub fn resolve(&self, key: &RouteKey) -> Result<RouteResult, RouteNotFound> {
        self.routes
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, result)| result.clone())
            .ok_or_else(|| RouteNotFound(key.clone()))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProviderConfig, RouteRule};

    fn rule(class: &str, provider: &str) -> RouteRule {
        RouteRule {
            env: "prod".into(),
            logical_region: "us".into(),
            bucket: "assets".into(),
            storage_class: class.into(),
            provider_name: provider.into(),
            provider_bucket: format!("phys-{}", class.to_lowercase()),
        }
    }

    fn key(class: &str) -> RouteKey {
        RouteKey {
            env: "prod".into(),
            logical_region: "us".into(),
            bucket: "assets".into(),
            storage_class: class.into(),
        }
    }

    fn config(routes: Vec<RouteRule>) -> ObjectStorageConfig {
        ObjectStorageConfig {
            default_storage_class: StorageClass::default(),
            routes,
            providers: vec![ProviderConfig {
                name: "p1".into(),
                provider_type: ProviderType::AwsS3,
                region: "us-east-1".into(),
                root: None,
            }],
        }
    }

    #[test]
    fn resolves_exact_key() {
        let table = RoutingTable::from_config(&config(vec![rule("HOT", "p1")]));
        let route = table.resolve(&key("HOT")).unwrap();
        assert_eq!(route.provider_name, "p1");
        assert_eq!(route.provider_type, ProviderType::AwsS3);
        assert_eq!(route.provider_region, "us-east-1");
        assert_eq!(route.provider_bucket, "phys-hot");
    }

    #[test]
    fn no_fallback_across_storage_classes() {
        let table = RoutingTable::from_config(&config(vec![rule("HOT", "p1")]));
        let err = table.resolve(&key("COLD")).unwrap_err();
        assert_eq!(err.0.storage_class.as_str(), "COLD");
    }

    #[test]
    fn rules_with_unknown_provider_are_dropped() {
        let table = RoutingTable::from_config(&config(vec![
            rule("HOT", "p1"),
            rule("COLD", "missing"),
        ]));
        assert_eq!(table.len(), 1);
        assert!(table.resolve(&key("COLD")).is_err());
    }

    #[test]
    fn first_matching_rule_wins() {
        let mut second = rule("HOT", "p1");
        second.provider_bucket = "shadow".into();
        let table = RoutingTable::from_config(&config(vec![rule("HOT", "p1"), second]));
        assert_eq!(table.resolve(&key("HOT")).unwrap().provider_bucket, "phys-hot");
    }
}
