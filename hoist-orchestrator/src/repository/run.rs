//! Run Repository
//!
//! Stores deploy run records.

use async_trait::async_trait;
use hoist_core::domain::run::DeployRun;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("run {0} not found")]
    NotFound(Uuid),
}

/// Persistence for [`DeployRun`] records
#[async_trait]
pub trait RunRepository: Send + Sync {
    async fn insert(&self, run: DeployRun);

    async fn find_by_id(&self, id: Uuid) -> Option<DeployRun>;

    /// Every run, most recently requested first
    async fn list(&self) -> Vec<DeployRun>;

    /// Replaces a stored run with `run`
    async fn update(&self, run: DeployRun) -> Result<(), RepositoryError>;

    async fn delete(&self, id: Uuid) -> Option<DeployRun>;
}

#[derive(Default)]
pub struct InMemoryRunRepository {
    runs: RwLock<HashMap<Uuid, DeployRun>>,
}

impl InMemoryRunRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunRepository for InMemoryRunRepository {
    async fn insert(&self, run: DeployRun) {
        self.runs.write().await.insert(run.id, run);
    }

    async fn find_by_id(&self, id: Uuid) -> Option<DeployRun> {
        self.runs.read().await.get(&id).cloned()
    }

    async fn list(&self) -> Vec<DeployRun> {
        let mut runs: Vec<DeployRun> = self.runs.read().await.values().cloned().collect();
        runs.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        runs
    }

    async fn update(&self, run: DeployRun) -> Result<(), RepositoryError> {
        let mut runs = self.runs.write().await;
        match runs.get_mut(&run.id) {
            Some(existing) => {
                *existing = run;
                Ok(())
            }
            None => Err(RepositoryError::NotFound(run.id)),
        }
    }

    async fn delete(&self, id: Uuid) -> Option<DeployRun> {
        self.runs.write().await.remove(&id)
    }
}
