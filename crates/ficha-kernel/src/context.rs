//! Wiring of the kernel services
//!
//! [`FichaContext`] owns the registry and every service built on it, so a
//! process holds one explicit container instead of globals.

use crate::config::KernelConfig;
use crate::error::ConfigError;
use crate::guard::StateGuard;
use crate::persistence::{
    InMemorySnapshotStore, InMemoryStorage, PersistenceLayer, SafePersist, SnapshotStore,
    StorageAdapter,
};
use crate::recovery::{Recovery, RecoveryManager};
use crate::registry::FichaRegistry;
use crate::reset::SafeReset;
use crate::schema::SchemaVersionManager;
use ficha_validate::FinalValidator;
use std::sync::Arc;

/// Kernel services for any number of fichas
#[derive(Debug, Clone)]
pub struct FichaContext {
    config: KernelConfig,
    registry: Arc<FichaRegistry>,
    validator: Arc<FinalValidator>,
    snapshots: Arc<InMemorySnapshotStore>,
    persist: Arc<SafePersist>,
    recovery: Arc<RecoveryManager>,
    guard: Arc<StateGuard>,
    reset: Arc<SafeReset>,
    schema: Arc<SchemaVersionManager>,
}

impl Default for FichaContext {
    fn default() -> Self {
        Self::with_storage(KernelConfig::default(), Arc::new(InMemoryStorage::new()))
    }
}

impl FichaContext {
    /// Create new context over in-memory storage
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an unusable configuration.
    pub fn new(config: KernelConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_storage(config, Arc::new(InMemoryStorage::new())))
    }

    /// Create new context over `storage`
    #[must_use]
    pub fn with_storage(config: KernelConfig, storage: Arc<dyn StorageAdapter>) -> Self {
        let registry = Arc::new(FichaRegistry::new(config));
        let validator = Arc::new(FinalValidator::new(config.validation));
        let snapshots = Arc::new(InMemorySnapshotStore::new(
            config.persistence.snapshot_store_capacity,
        ));
        let persist = Arc::new(SafePersist::new(
            storage,
            Arc::clone(&validator),
            Arc::clone(&registry),
        ));
        let recovery = Arc::new(RecoveryManager::new(
            Arc::clone(&persist) as Arc<dyn PersistenceLayer>,
            Arc::clone(&snapshots) as Arc<dyn SnapshotStore>,
            Arc::clone(&validator),
            Arc::clone(&registry),
        ));
        let guard = Arc::new(StateGuard::new(
            Arc::clone(&recovery) as Arc<dyn Recovery>,
            Arc::clone(&validator),
        ));
        let reset = Arc::new(SafeReset::new(Arc::clone(&persist), Arc::clone(&registry)));
        tracing::debug!(
            max_undo = config.history.max_undo,
            max_snapshots = config.history.max_snapshots,
            strict = config.validation.strict_mode,
            "ficha context created"
        );
        Self {
            config,
            registry,
            validator,
            snapshots,
            persist,
            recovery,
            guard,
            reset,
            schema: Arc::new(SchemaVersionManager::with_capacity(
                config.persistence.log_capacity,
            )),
        }
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Per-ficha manager registry
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<FichaRegistry> {
        &self.registry
    }

    /// Business validator
    #[inline]
    #[must_use]
    pub fn validator(&self) -> &Arc<FinalValidator> {
        &self.validator
    }

    /// Snapshot store consulted by recovery
    #[inline]
    #[must_use]
    pub fn snapshots(&self) -> &Arc<InMemorySnapshotStore> {
        &self.snapshots
    }

    /// Validated persistence
    #[inline]
    #[must_use]
    pub fn persist(&self) -> &Arc<SafePersist> {
        &self.persist
    }

    /// Recovery pipeline
    #[inline]
    #[must_use]
    pub fn recovery(&self) -> &Arc<RecoveryManager> {
        &self.recovery
    }

    /// Render and persistence guard
    #[inline]
    #[must_use]
    pub fn guard(&self) -> &Arc<StateGuard> {
        &self.guard
    }

    /// User-initiated reset
    #[inline]
    #[must_use]
    pub fn reset(&self) -> &Arc<SafeReset> {
        &self.reset
    }

    /// Schema migrator for externally supplied payloads
    #[inline]
    #[must_use]
    pub fn schema(&self) -> &Arc<SchemaVersionManager> {
        &self.schema
    }
}
