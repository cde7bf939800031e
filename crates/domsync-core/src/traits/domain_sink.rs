// # Domain Sink Trait
//
// The write path for normalized domain records. The scheduler hands every
// successful run's records to a sink; what the sink does with them (update
// the domain table, queue a review, log) is outside this crate.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::task::TaskId;
use crate::traits::provider_adapter::DomainRecord;

/// Persistence collaborator for adapter output
#[async_trait]
pub trait DomainSink: Send + Sync {
    /// Persist the records produced by one task run
    async fn persist(
        &self,
        task_id: TaskId,
        provider: &str,
        records: &[DomainRecord],
    ) -> Result<(), crate::Error>;
}

/// Sink that keeps every batch in memory
///
/// Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryDomainSink {
    batches: Arc<Mutex<Vec<(TaskId, String, Vec<DomainRecord>)>>>,
}

impl MemoryDomainSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records received so far, in arrival order
    pub async fn records(&self) -> Vec<DomainRecord> {
        self.batches
            .lock()
            .await
            .iter()
            .flat_map(|(_, _, records)| records.iter().cloned())
            .collect()
    }

    /// Number of batches received
    pub async fn batch_count(&self) -> usize {
        self.batches.lock().await.len()
    }
}

#[async_trait]
impl DomainSink for MemoryDomainSink {
    async fn persist(
        &self,
        task_id: TaskId,
        provider: &str,
        records: &[DomainRecord],
    ) -> Result<(), crate::Error> {
        self.batches
            .lock()
            .await
            .push((task_id, provider.to_string(), records.to_vec()));
        Ok(())
    }
}
