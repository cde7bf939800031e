// # domsync-core
//
// Core library for registrar synchronization.
//
// ## Architecture Overview
//
// This library provides the core functionality for keeping domain data in
// step with registrars:
// - **ProviderAdapter**: Trait for fetching one registrar's domains and normalizing them
// - **normalize**: Shared parsing rules (dates, DNS lists, boolean flags)
// - **TaskStore**: Trait for durable task state with an atomic running flag
// - **TaskRegistry**: Typed front for the task store (leases, completion timing)
// - **Scheduler**: Runs due tasks against their adapters and records the outcome
// - **AdapterRegistry**: Plugin-based registry for adapters and task stores
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from registrar implementations
// 2. **Plugin-Based**: Adapters are registered dynamically, no hard-coded if-else
// 3. **Library-First**: All core functionality can be used as a library
// 4. **Typed at the core**: Legacy sentinels exist only at the storage edge (`legacy`)
// 5. **No stuck tasks**: Every acquired running flag is released

pub mod config;
pub mod error;
pub mod legacy;
pub mod normalize;
pub mod registry;
pub mod scheduler;
pub mod state;
pub mod task;
pub mod traits;

// Re-export core types for convenience
pub use config::{ProviderConfig, SchedulerConfig, SyncConfig, TaskConfig, TaskStoreConfig};
pub use error::{Error, Result};
pub use normalize::{DateFormat, FlagConvention};
pub use registry::AdapterRegistry;
pub use scheduler::{RunOutcome, Scheduler, SchedulerEvent, SkipReason, is_due};
pub use state::{FileTaskStore, MemoryTaskStore};
#[cfg(feature = "sqlite")]
pub use state::SqliteTaskStore;
pub use task::{Interval, Task, TaskId, TaskRegistry, format_duration, format_next_run};
pub use traits::{
    Credentials, DomainList, DomainRecord, DomainSink, MemoryDomainSink, ProviderAdapter,
    ProviderAdapterFactory, TaskStore,
};
