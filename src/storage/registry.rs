//! Named collection of provider backends.

use super::{
    backend::{BackendError, BackendResult, ObjectBackend},
    filesystem::FilesystemBackend,
    memory::MemoryBackend,
};
use crate::{config::ProviderConfig, models::ProviderType};
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};
use tracing::{info, warn};

/// A provider whose adapter could not be constructed at startup.
#[derive(Debug)]
pub struct ProviderInitFailure {
    pub name: String,
    pub error: BackendError,
}

/// Maps provider names to backends.
///
/// Writers only run during startup; request handling takes the read lock.
#[derive(Default)]
pub struct ProviderRegistry {
    backends: RwLock<HashMap<String, Arc<dyn ObjectBackend>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one backend per configured provider.
    ///
    /// A provider that fails to build is left out of the registry and reported
    /// in the returned failures; the others are still registered.
    pub fn from_config(providers: &[ProviderConfig]) -> (Self, Vec<ProviderInitFailure>) {
        let registry = Self::new();
        let mut failures = Vec::new();

        for provider in providers {
            match build_backend(provider) {
                Ok(backend) => {
                    info!(
                        "registered provider `{}` ({})",
                        provider.name, provider.provider_type
                    );
                    registry.register(provider.name.clone(), backend);
                }
                Err(error) => {
                    warn!(
                        "failed to init adapter for provider `{}`: {}",
                        provider.name, error
                    );
                    failures.push(ProviderInitFailure {
                        name: provider.name.clone(),
                        error,
                    });
                }
            }
        }

        (registry, failures)
    }

    pub fn register(&self, name: impl Into<String>, backend: Arc<dyn ObjectBackend>) {
        self.backends.write().insert(name.into(), backend);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ObjectBackend>> {
        self.backends.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.backends.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.read().is_empty()
    }
}

fn build_backend(provider: &ProviderConfig) -> BackendResult<Arc<dyn ObjectBackend>> {
    match provider.provider_type {
        ProviderType::LocalFs => {
            let root = provider.root.clone().ok_or_else(|| {
                BackendError::Misconfigured(format!(
                    "LOCAL_FS provider `{}` needs a `root` directory",
                    provider.name
                ))
            })?;
            Ok(Arc::new(FilesystemBackend::new(root)))
        }
        ProviderType::Memory => Ok(Arc::new(MemoryBackend::new())),
        ProviderType::AwsS3 | ProviderType::CfR2 | ProviderType::GcpGcs => {
            Err(BackendError::Unsupported(provider.provider_type))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(name: &str, provider_type: ProviderType) -> ProviderConfig {
        ProviderConfig {
            name: name.into(),
            provider_type,
            region: String::new(),
            root: None,
        }
    }

    #[test]
    fn one_failing_provider_does_not_block_the_rest() {
        let (registry, failures) = ProviderRegistry::from_config(&[
            provider("mem", ProviderType::Memory),
            provider("s3", ProviderType::AwsS3),
            provider("disk", ProviderType::LocalFs),
        ]);

        assert_eq!(registry.len(), 1);
        assert!(registry.get("mem").is_some());
        assert!(registry.get("s3").is_none());
        assert!(registry.get("disk").is_none());

        let names: Vec<_> = failures.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["s3", "disk"]);
        assert!(matches!(
            failures[0].error,
            BackendError::Unsupported(ProviderType::AwsS3)
        ));
        assert!(matches!(failures[1].error, BackendError::Misconfigured(_)));
    }

    #[test]
    fn local_fs_with_root_registers() {
        let mut disk = provider("disk", ProviderType::LocalFs);
        disk.root = Some("/tmp/smartstore-test".into());
        let (registry, failures) = ProviderRegistry::from_config(&[disk]);
        assert!(failures.is_empty());
        assert!(registry.get("disk").is_some());
    }

    #[test]
    fn register_replaces_existing_name() {
        let registry = ProviderRegistry::new();
        registry.register("mem", Arc::new(MemoryBackend::new()));
        registry.register("mem", Arc::new(MemoryBackend::new()));
        registry.register("other", Arc::new(MemoryBackend::new()));
        assert_eq!(registry.len(), 2);
        assert!(registry.get("mem").is_some());
        assert!(registry.get("missing").is_none());
    }
}
