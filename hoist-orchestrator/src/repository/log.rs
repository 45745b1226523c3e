//! Log Repository
//!
//! Keeps one log buffer per run. The worker writes into the buffer while the
//! run executes, so logs can be read before the run finishes.

use async_trait::async_trait;
use hoist_core::domain::log::LogEntry;
use hoist_runner::InMemoryLogBuffer;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[async_trait]
pub trait LogRepository: Send + Sync {
    /// Buffer collecting the logs of `run_id`, created on first use
    async fn buffer(&self, run_id: Uuid) -> InMemoryLogBuffer;

    /// Every entry recorded for `run_id`, oldest first
    async fn find_by_run(&self, run_id: Uuid) -> Vec<LogEntry>;

    async fn delete(&self, run_id: Uuid);
}

#[derive(Default)]
pub struct InMemoryLogRepository {
    buffers: RwLock<HashMap<Uuid, InMemoryLogBuffer>>,
}

impl InMemoryLogRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogRepository for InMemoryLogRepository {
    async fn buffer(&self, run_id: Uuid) -> InMemoryLogBuffer {
        self.buffers
            .write()
            .await
            .entry(run_id)
            .or_default()
            .clone()
    }

    async fn find_by_run(&self, run_id: Uuid) -> Vec<LogEntry> {
        match self.buffers.read().await.get(&run_id) {
            Some(buffer) => buffer.snapshot(),
            None => Vec::new(),
        }
    }

    async fn delete(&self, run_id: Uuid) {
        self.buffers.write().await.remove(&run_id);
    }
}
