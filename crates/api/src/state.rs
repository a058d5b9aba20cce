use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use trendreel_core::error::CoreError;
use trendreel_pipeline::cache::InitOnce;
use trendreel_pipeline::{PipelineConfig, PipelineOrchestrator};
use trendreel_providers::{AvatarCatalog, ProviderSet};
use uuid::Uuid;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Provider clients every run submits and polls through.
    pub providers: ProviderSet,
    /// Pipeline runs, in memory only.
    pub runs: Arc<RunRegistry>,
    /// Avatar/voice catalog, fetched once per process.
    pub catalog: Arc<InitOnce<AvatarCatalog>>,
}

impl AppState {
    pub fn new(config: ServerConfig, providers: ProviderSet) -> Self {
        Self {
            config: Arc::new(config),
            providers,
            runs: Arc::new(RunRegistry::default()),
            catalog: Arc::new(InitOnce::new()),
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        self.config.pipeline.clone()
    }
}

/// In-memory map of live pipeline runs keyed by UUID.
#[derive(Default)]
pub struct RunRegistry {
    runs: RwLock<HashMap<Uuid, Arc<PipelineOrchestrator>>>,
}

impl RunRegistry {
    pub async fn insert(&self, orchestrator: PipelineOrchestrator) -> Uuid {
        let id = Uuid::new_v4();
        self.runs.write().await.insert(id, Arc::new(orchestrator));
        id
    }

    pub async fn get(&self, id: Uuid) -> Result<Arc<PipelineOrchestrator>, CoreError> {
        self.runs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    /// Remove a run and stop its pollers.
    pub async fn remove(&self, id: Uuid) -> Result<(), CoreError> {
        let run = self.runs.write().await.remove(&id).ok_or_else(|| not_found(id))?;
        run.shutdown().await;
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.runs.read().await.len()
    }

    /// Stop every run's pollers and drop the runs.
    pub async fn shutdown_all(&self) {
        let runs: Vec<_> = self.runs.write().await.drain().map(|(_, r)| r).collect();
        for run in &runs {
            run.shutdown().await;
        }
        tracing::info!(count = runs.len(), "Pipeline runs shut down");
    }
}

fn not_found(id: Uuid) -> CoreError {
    CoreError::NotFound {
        entity: "Pipeline",
        id: id.to_string(),
    }
}
