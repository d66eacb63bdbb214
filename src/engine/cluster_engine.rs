//! Cluster-pipeline execution backend.
//!
//! Composes the session manager, the completion watcher, and the report
//! retriever into a single run operation. The session is closed on every
//! path, success or failure, after the run body finishes.

use std::sync::Arc;

use async_trait::async_trait;

use crate::cluster::ClusterClient;
use crate::config::{EngineConfig, RetryBudgets};
use crate::engine::session::{Session, SessionManager};
use crate::engine::watcher::{watch_for_output, ProgressTick};
use crate::engine::{output, DataSource, ProcessorModule, ValidationBackend};
use crate::error::EngineError;
use crate::pipeline::PipelineDefinition;

/// Branch staged files are committed to.
const STAGING_BRANCH: &str = "master";

/// Executes validation runs on the pipeline cluster.
pub struct ClusterEngine {
    client: Arc<dyn ClusterClient>,
    sessions: SessionManager,
    budgets: RetryBudgets,
    progress: ProgressTick,
}

impl ClusterEngine {
    /// Creates an engine from configuration, loading the process-wide
    /// pipeline definition on first use.
    pub fn new(client: Arc<dyn ClusterClient>, config: &EngineConfig) -> Result<Self, EngineError> {
        let definition = PipelineDefinition::global(config.template_path.as_deref())?.clone();
        Ok(Self::with_definition(client, config, definition))
    }

    /// Creates an engine with an explicit definition, bypassing the
    /// process-wide cache. Used by tests and embedding callers.
    pub fn with_definition(
        client: Arc<dyn ClusterClient>,
        config: &EngineConfig,
        definition: PipelineDefinition,
    ) -> Self {
        Self {
            sessions: SessionManager::new(Arc::clone(&client), definition),
            client,
            budgets: config.budgets.clone(),
            progress: Arc::new(|| {}),
        }
    }

    /// Sets a progress callback fired once per job-state poll attempt.
    pub fn with_progress(mut self, progress: ProgressTick) -> Self {
        self.progress = progress;
        self
    }

    /// Stages the processor module and the dataset into the session's
    /// repositories. Remote datasets are fetched by the cluster itself.
    async fn stage(
        &self,
        session: &Session,
        dataset: &DataSource,
        module: &ProcessorModule,
    ) -> Result<(), EngineError> {
        session
            .processors()
            .put_file_bytes(STAGING_BRANCH, &rooted(&module.name), &module.content)
            .await?;

        match dataset {
            DataSource::Inline { content, .. } => {
                session
                    .data()
                    .put_file_bytes(STAGING_BRANCH, &rooted(dataset.filename()), content)
                    .await?;
            }
            DataSource::Remote { bucket, key } => {
                let url = format!("s3://{bucket}/{key}");
                session
                    .data()
                    .put_file_url(STAGING_BRANCH, &rooted(dataset.filename()), &url)
                    .await?;
            }
        }

        Ok(())
    }

    /// The run body between session open and close.
    async fn run_in_session(
        &self,
        session: &Session,
        dataset: DataSource,
        module: ProcessorModule,
    ) -> Result<String, EngineError> {
        self.stage(session, &dataset, &module).await?;

        let commit = watch_for_output(
            Arc::clone(&self.client),
            session,
            &self.budgets,
            Arc::clone(&self.progress),
        )
        .await?;

        tracing::info!(session = %session.name(), commit = %commit.full_name(), "output commit accepted");

        output::retrieve_report(&commit).await
    }
}

#[async_trait]
impl ValidationBackend for ClusterEngine {
    async fn run(
        &self,
        dataset: DataSource,
        module: ProcessorModule,
    ) -> Result<String, EngineError> {
        let session = self.sessions.open().await?;
        tracing::info!(session = %session.name(), dataset = %dataset.filename(), "validation run started");

        let result = self.run_in_session(&session, dataset, module).await;

        // Teardown runs on success and failure alike and never overrides
        // the primary result.
        self.sessions.close(session).await;

        result
    }
}

/// Staged files live at the repository root.
fn rooted(name: &str) -> String {
    format!("/{name}")
}
