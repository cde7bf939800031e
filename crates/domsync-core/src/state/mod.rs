// # Task Store Implementations
//
// This module provides implementations of the TaskStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::{FileTaskStore, FileTaskStoreFactory};
pub use memory::{MemoryTaskStore, MemoryTaskStoreFactory};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteTaskStore, SqliteTaskStoreFactory};
