//! Cluster client trait and wire types.
//!
//! Everything the engine needs from the cluster goes through this trait:
//! repository lifecycle, file staging, file retrieval, pipeline lifecycle,
//! job observation, and the live commit subscription.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::error::ClusterError;
use crate::pipeline::PipelineSpec;

/// Observable lifecycle state of a pipeline job.
///
/// The engine never creates jobs; it only watches them move through
/// `Pending -> Starting -> Running -> {Succeeded, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
    Pending,
    Starting,
    Running,
    Succeeded,
    Failed,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Pending => write!(f, "pending"),
            JobState::Starting => write!(f, "starting"),
            JobState::Running => write!(f, "running"),
            JobState::Succeeded => write!(f, "succeeded"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

impl JobState {
    /// Whether the job has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

/// A single entry in a commit's provenance listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceRef {
    /// Repository whose commit contributed to this one.
    pub repo: String,
    /// Contributing commit id.
    pub id: String,
}

/// Raw commit metadata as reported by the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitMeta {
    /// Repository the commit was written to.
    pub repo: String,
    /// Commit id, unique within the repository.
    pub id: String,
    /// Provenance listing; absent when the cluster reports none.
    #[serde(default)]
    pub provenance: Vec<ProvenanceRef>,
}

/// A live subscription to a repository's commit stream.
///
/// The producer task is signalled to stop on `close()` and on drop, so the
/// losing side of a completion race never leaves a subscription running.
#[derive(Debug)]
pub struct CommitStream {
    rx: mpsc::Receiver<CommitMeta>,
    stop: Option<oneshot::Sender<()>>,
}

impl CommitStream {
    /// Creates a stream from a receiving channel and a stop signal for the
    /// producer task.
    pub fn new(rx: mpsc::Receiver<CommitMeta>, stop: oneshot::Sender<()>) -> Self {
        Self {
            rx,
            stop: Some(stop),
        }
    }

    /// Awaits the next commit event; `None` once the producer has stopped.
    pub async fn next(&mut self) -> Option<CommitMeta> {
        self.rx.recv().await
    }

    /// Closes the subscription, releasing the cluster-side resources.
    pub fn close(mut self) {
        self.signal_stop();
    }

    fn signal_stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            // Producer may already be gone; nothing to release then.
            let _ = stop.send(());
        }
    }
}

impl Drop for CommitStream {
    fn drop(&mut self) {
        self.signal_stop();
    }
}

/// Client operations against the pipeline cluster.
///
/// Implementations must be cheap to share behind an `Arc`; the engine clones
/// the handle into every concurrent task that needs it.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Creates a named repository.
    async fn create_repo(&self, name: &str) -> Result<(), ClusterError>;

    /// Deletes a repository and all of its commits.
    async fn delete_repo(&self, name: &str) -> Result<(), ClusterError>;

    /// Writes a file into a new commit on the given branch.
    async fn put_file_bytes(
        &self,
        repo: &str,
        branch: &str,
        path: &str,
        content: &[u8],
    ) -> Result<(), ClusterError>;

    /// Instructs the cluster to fetch a remote resource into a new commit,
    /// avoiding a local round-trip when the source is already remote.
    async fn put_file_url(
        &self,
        repo: &str,
        branch: &str,
        path: &str,
        url: &str,
    ) -> Result<(), ClusterError>;

    /// Reads a file out of a specific commit.
    async fn get_file(
        &self,
        repo: &str,
        commit: &str,
        path: &str,
    ) -> Result<Vec<u8>, ClusterError>;

    /// Creates a pipeline from a bound specification.
    async fn create_pipeline(&self, spec: &PipelineSpec) -> Result<(), ClusterError>;

    /// Deletes a pipeline.
    async fn delete_pipeline(&self, name: &str) -> Result<(), ClusterError>;

    /// Reports the state of the pipeline's current job. A job the cluster
    /// has not yet materialized reports as `Pending`.
    async fn job_state(&self, pipeline: &str) -> Result<JobState, ClusterError>;

    /// Retrieves the ordered log lines of the pipeline's current job.
    async fn job_logs(&self, pipeline: &str) -> Result<Vec<String>, ClusterError>;

    /// Opens a live subscription to a repository's commit stream.
    async fn subscribe_commits(&self, repo: &str) -> Result<CommitStream, ClusterError>;
}
