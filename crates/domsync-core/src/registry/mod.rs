//! Plugin-based adapter registry
//!
//! The registry allows provider adapters and task stores to be registered
//! dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use domsync_core::registry::AdapterRegistry;
//! use domsync_core::config::{ProviderConfig, SchedulerConfig};
//!
//! let registry = AdapterRegistry::with_builtin_stores();
//! domsync_provider_eurodns::register(&registry);
//!
//! let config = ProviderConfig::Eurodns { ... };
//! let (adapter, credentials) = registry.create_adapter(&config, &SchedulerConfig::default())?;
//! ```
//!
//! ## Registration
//!
//! Adapter crates expose a `register` function:
//!
//! ```rust,ignore
//! pub fn register(registry: &AdapterRegistry) {
//!     registry.register_adapter("eurodns", Box::new(EuroDnsFactory));
//! }
//! ```

use crate::config::{ProviderConfig, SchedulerConfig, TaskStoreConfig};
use crate::error::{Error, Result};
use crate::traits::{Credentials, ProviderAdapter, ProviderAdapterFactory, TaskStore, TaskStoreFactory};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Registry of adapter and task store factories
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: RwLock<HashMap<String, Box<dyn ProviderAdapterFactory>>>,
    task_stores: RwLock<HashMap<String, Arc<dyn TaskStoreFactory>>>,
}

// A panic while holding one of these locks cannot leave a map half-written
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl AdapterRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the memory, file and (if enabled) SQLite stores registered
    pub fn with_builtin_stores() -> Self {
        let registry = Self::new();
        registry.register_task_store("memory", Box::new(crate::state::MemoryTaskStoreFactory));
        registry.register_task_store("file", Box::new(crate::state::FileTaskStoreFactory));
        #[cfg(feature = "sqlite")]
        registry.register_task_store("sqlite", Box::new(crate::state::SqliteTaskStoreFactory));
        registry
    }

    /// Register an adapter factory
    ///
    /// # Parameters
    ///
    /// - `name`: Adapter type name (e.g., "eurodns", "directnic")
    /// - `factory`: Factory object for creating adapter instances
    pub fn register_adapter(&self, name: impl Into<String>, factory: Box<dyn ProviderAdapterFactory>) {
        write(&self.adapters).insert(name.into(), factory);
    }

    /// Register a task store factory
    pub fn register_task_store(&self, name: impl Into<String>, factory: Box<dyn TaskStoreFactory>) {
        write(&self.task_stores).insert(name.into(), Arc::from(factory));
    }

    /// Create an adapter and its credentials from configuration
    ///
    /// # Returns
    ///
    /// - `Ok((adapter, credentials))`: Created adapter instance
    /// - `Err(Error)`: If the adapter type is not registered or creation fails
    pub fn create_adapter(
        &self,
        config: &ProviderConfig,
        settings: &SchedulerConfig,
    ) -> Result<(Arc<dyn ProviderAdapter>, Credentials)> {
        let adapter_type = config.type_name();
        let adapters = read(&self.adapters);

        let factory = adapters
            .get(adapter_type)
            .ok_or_else(|| Error::config(format!("Unknown adapter type: {}", adapter_type)))?;

        factory.create(config, settings)
    }

    /// Create a task store from configuration
    pub async fn create_task_store(&self, config: &TaskStoreConfig) -> Result<Box<dyn TaskStore>> {
        let store_type = config.type_name();

        // Clone the factory so the lock is not held across the await
        let factory = read(&self.task_stores)
            .get(store_type)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown task store type: {}", store_type)))?;

        factory.create(config).await
    }

    /// List all registered adapter types
    pub fn list_adapters(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.adapters).keys().cloned().collect();
        names.sort();
        names
    }

    /// List all registered task store types
    pub fn list_task_stores(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.task_stores).keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if an adapter type is registered
    pub fn has_adapter(&self, name: &str) -> bool {
        read(&self.adapters).contains_key(name)
    }

    /// Check if a task store type is registered
    pub fn has_task_store(&self, name: &str) -> bool {
        read(&self.task_stores).contains_key(name)
    }
}
