//! Bound pipeline control: job-state polling and log retrieval.
//!
//! A `BoundPipeline` is a definition instantiated against one session's
//! repositories. The wait runs in two phases with independent budgets,
//! modeling cold-start latency separately from processing latency.

use std::sync::Arc;
use std::time::Duration;

use crate::cluster::client::{ClusterClient, JobState};
use crate::error::{ClusterError, EngineError};
use crate::pipeline::definition::PipelineDefinition;

/// Which phase of the two-phase wait is running; carried in retry errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPhase {
    /// Waiting for the job to get scheduled (leave `Pending`).
    Start,
    /// Waiting for a scheduled job to finish (leave `Starting`/`Running`).
    Finish,
}

impl std::fmt::Display for WaitPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitPhase::Start => write!(f, "start"),
            WaitPhase::Finish => write!(f, "finish"),
        }
    }
}

/// A running pipeline instance bound to a session's repositories.
///
/// The pipeline name doubles as its output repository name, which is where
/// the completion watcher subscribes.
#[derive(Clone)]
pub struct BoundPipeline {
    client: Arc<dyn ClusterClient>,
    name: String,
}

impl BoundPipeline {
    /// Instantiates a definition against the session's two repositories and
    /// returns a live handle.
    pub async fn bind(
        client: Arc<dyn ClusterClient>,
        definition: &PipelineDefinition,
        pipeline_name: &str,
        data_repo: &str,
        processors_repo: &str,
    ) -> Result<Self, EngineError> {
        let spec = definition.bind(pipeline_name, data_repo, processors_repo)?;
        client.create_pipeline(&spec).await?;
        Ok(Self {
            client,
            name: pipeline_name.to_string(),
        })
    }

    /// Pipeline name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the repository the pipeline writes its output commits to.
    pub fn output_repo(&self) -> &str {
        &self.name
    }

    /// Polls job state until it leaves `pending_states`.
    ///
    /// `on_tick` fires once per attempt for progress signaling only; it must
    /// not affect control flow. Sleeps `delay` between attempts and fails
    /// with a retry-exhausted error after `max_retries` attempts.
    pub async fn wait_while(
        &self,
        phase: WaitPhase,
        pending_states: &[JobState],
        max_retries: u32,
        delay: Duration,
        on_tick: &(dyn Fn() + Send + Sync),
    ) -> Result<JobState, EngineError> {
        for _ in 0..max_retries {
            on_tick();

            let state = self.client.job_state(&self.name).await?;
            if !pending_states.contains(&state) {
                return Ok(state);
            }

            tokio::time::sleep(delay).await;
        }

        Err(EngineError::RetryExhausted {
            phase: phase.to_string(),
            attempts: max_retries,
        })
    }

    /// Runs the two-phase wait to completion.
    ///
    /// Phase one waits for the job to leave `Pending` with the larger
    /// budget; failing it means the job never got scheduled. Phase two waits
    /// for the job to leave `Starting`/`Running`. A `Failed` terminal state
    /// is raised as a job-failed error carrying the job's ordered log lines.
    pub async fn wait_for_completion(
        &self,
        budgets: &crate::config::RetryBudgets,
        on_tick: &(dyn Fn() + Send + Sync),
    ) -> Result<JobState, EngineError> {
        self.wait_while(
            WaitPhase::Start,
            &[JobState::Pending],
            budgets.start_retries,
            budgets.delay,
            on_tick,
        )
        .await?;

        let state = self
            .wait_while(
                WaitPhase::Finish,
                &[JobState::Starting, JobState::Running],
                budgets.finish_retries,
                budgets.delay,
                on_tick,
            )
            .await?;

        if state == JobState::Failed {
            // Log retrieval is best-effort; a transport error here must not
            // replace the job failure itself.
            let logs = match self.logs().await {
                Ok(logs) => logs,
                Err(err) => {
                    tracing::warn!(pipeline = %self.name, error = %err, "failed to fetch job logs");
                    Vec::new()
                }
            };
            return Err(EngineError::JobFailed { logs });
        }

        Ok(state)
    }

    /// Retrieves the ordered log lines of the pipeline's current job.
    pub async fn logs(&self) -> Result<Vec<String>, ClusterError> {
        self.client.job_logs(&self.name).await
    }

    /// Deletes the pipeline from the cluster.
    pub async fn delete(&self) -> Result<(), ClusterError> {
        self.client.delete_pipeline(&self.name).await
    }
}

impl std::fmt::Debug for BoundPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundPipeline").field("name", &self.name).finish()
    }
}
