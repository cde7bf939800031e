//! Core traits for the domsync system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`ProviderAdapter`]: Fetch and normalize one registrar's domain data
//! - [`TaskStore`]: Durable task state with an atomic running flag
//! - [`DomainSink`]: Write path for normalized records

pub mod provider_adapter;
pub mod task_store;
pub mod domain_sink;

pub use provider_adapter::{
    Credentials, DomainList, DomainRecord, LegacyDomainFields, ProviderAdapter,
    ProviderAdapterFactory, obfuscate,
};
pub use task_store::{Completion, TaskStore, TaskStoreFactory};
pub use domain_sink::{DomainSink, MemoryDomainSink};
