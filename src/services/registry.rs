use crate::config::{DiskConfig, StorageConfig};
use crate::error::{Result, StorageError};
use crate::infrastructure::storage::setup_storage;
use crate::services::coordinator::StorageCoordinator;
use crate::services::formatter::{FormatterChoice, create_formatter};
use crate::services::hooks::HookBus;
use crate::utils::hash::HashAlgorithm;
use dashmap::DashMap;
use std::sync::Arc;

/// Named coordinators built from configuration on first use and cached.
///
/// Constructed explicitly and passed to whoever needs storage. All
/// coordinators it builds share one hook bus.
pub struct StorageRegistry {
    config: StorageConfig,
    hooks: HookBus,
    disks: DashMap<String, Arc<StorageCoordinator>>,
}

impl StorageRegistry {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            hooks: HookBus::new(),
            disks: DashMap::new(),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn hooks(&self) -> &HookBus {
        &self.hooks
    }

    pub async fn default_disk(&self) -> Result<Arc<StorageCoordinator>> {
        self.disk(&self.config.default_disk).await
    }

    /// Returns the coordinator for `name`, building it on first request.
    /// Unknown disks, adapters, formatters or hash algorithms fail here.
    pub async fn disk(&self, name: &str) -> Result<Arc<StorageCoordinator>> {
        if let Some(cached) = self.disks.get(name) {
            return Ok(cached.value().clone());
        }

        let disk = self.config.disk(name).ok_or_else(|| {
            StorageError::configuration(format!("Storage disk '{}' is not configured", name))
        })?;
        let coordinator = Arc::new(self.build(disk).await?);
        tracing::info!("Storage disk '{}' ready: {:?}", name, coordinator);

        // A concurrent first request may have finished first; keep that one.
        let entry = self
            .disks
            .entry(name.to_string())
            .or_insert(coordinator)
            .value()
            .clone();
        Ok(entry)
    }

    /// Registers a pre-built coordinator, e.g. one using a custom backend.
    pub fn extend(&self, name: impl Into<String>, coordinator: StorageCoordinator) {
        self.disks.insert(name.into(), Arc::new(coordinator));
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.disks.contains_key(name)
    }

    /// Forgets every cached coordinator. Listeners on the shared bus are kept.
    pub fn reset(&self) {
        self.disks.clear();
    }

    async fn build(&self, disk: &DiskConfig) -> Result<StorageCoordinator> {
        let algorithm: HashAlgorithm = disk.hash_algorithm.parse()?;
        // Surface unknown formatter names now rather than on the first upload.
        create_formatter(&disk.formatter)?;
        let backend = setup_storage(disk).await?;

        Ok(StorageCoordinator::new(backend)
            .with_formatter(FormatterChoice::named(disk.formatter.clone()))
            .with_hash_algorithm(algorithm)
            .with_hooks(self.hooks.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::MemoryStorageBackend;

    #[tokio::test]
    async fn test_disk_is_cached_until_reset() {
        let registry = StorageRegistry::new(StorageConfig::development());
        let first = registry.default_disk().await.unwrap();
        let second = registry.disk("memory").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(registry.is_cached("memory"));

        registry.reset();
        assert!(!registry.is_cached("memory"));
        let third = registry.disk("memory").await.unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[tokio::test]
    async fn test_disk_settings_are_applied() {
        let config = StorageConfig::development().with_disk(
            "records",
            DiskConfig::memory()
                .with_formatter("entity")
                .with_hash_algorithm("blake3"),
        );
        let registry = StorageRegistry::new(config);
        let disk = registry.disk("records").await.unwrap();
        assert_eq!(disk.hash_algorithm(), HashAlgorithm::Blake3);
        assert_eq!(disk.backend().name(), "memory");
    }

    #[tokio::test]
    async fn test_configuration_errors_surface_on_first_use() {
        let config = StorageConfig::development()
            .with_disk("typo", DiskConfig::memory().with_formatter("flat"))
            .with_disk("weak", DiskConfig::memory().with_hash_algorithm("crc32"));
        let registry = StorageRegistry::new(config);

        assert!(matches!(
            registry.disk("typo").await,
            Err(StorageError::Configuration(_))
        ));
        assert!(matches!(
            registry.disk("weak").await,
            Err(StorageError::Configuration(_))
        ));
        assert!(matches!(
            registry.disk("absent").await,
            Err(StorageError::Configuration(_))
        ));
        assert!(!registry.is_cached("typo"));
    }

    #[tokio::test]
    async fn test_extend_and_shared_hooks() {
        let registry = StorageRegistry::new(StorageConfig::development());
        let backend = MemoryStorageBackend::new();
        registry.extend(
            "custom",
            StorageCoordinator::new(Arc::new(backend)).with_hooks(registry.hooks().clone()),
        );
        let custom = registry.disk("custom").await.unwrap();
        assert_eq!(custom.backend().name(), "memory");

        let built = registry.default_disk().await.unwrap();
        registry
            .hooks()
            .observe(crate::services::hooks::HookEvent::AfterDelete, |_, _| {});
        assert_eq!(
            built
                .hooks()
                .listener_count(crate::services::hooks::HookEvent::AfterDelete),
            1
        );
    }
}
