//! In-memory cluster double for tests.
//!
//! Tracks every resource the engine creates so tests can assert that runs
//! leak nothing: repositories, pipelines, and open commit subscriptions.
//! Job state can be scripted per poll, and commit events can be queued
//! ahead of a subscription or published when a given poll count is reached.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::cluster::client::{ClusterClient, CommitMeta, CommitStream, JobState};
use crate::error::ClusterError;
use crate::pipeline::PipelineSpec;

/// A file staged into the fake cluster, byte or URL mode.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub repo: String,
    pub branch: String,
    pub path: String,
    pub content: Option<Vec<u8>>,
    pub url: Option<String>,
}

struct Subscriber {
    id: u64,
    repo: String,
    tx: mpsc::Sender<CommitMeta>,
}

#[derive(Default)]
struct FakeState {
    repos: HashSet<String>,
    pipelines: HashMap<String, PipelineSpec>,
    files: HashMap<(String, String, String), Vec<u8>>,
    staged: Vec<StagedFile>,
    job_script: VecDeque<JobState>,
    job_state: Option<JobState>,
    job_logs: Vec<String>,
    poll_count: u32,
    publish_on_poll: Option<(u32, CommitMeta)>,
    queued: HashMap<String, Vec<CommitMeta>>,
    subscribers: Vec<Subscriber>,
    active_subscriptions: usize,
    next_subscriber_id: u64,
    fail_pipeline_create: bool,
    fail_repo_suffix: Option<String>,
}

/// Shared-handle fake cluster; clones observe the same state.
#[derive(Clone, Default)]
pub struct FakeCluster {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repo_count(&self) -> usize {
        self.lock().repos.len()
    }

    pub fn pipeline_count(&self) -> usize {
        self.lock().pipelines.len()
    }

    pub fn active_subscriptions(&self) -> usize {
        self.lock().active_subscriptions
    }

    pub fn staged_files(&self) -> Vec<StagedFile> {
        self.lock().staged.clone()
    }

    /// Fixes the job state reported once any scripted states run out.
    pub fn set_job_state(&self, state: JobState) {
        self.lock().job_state = Some(state);
    }

    /// Scripts job states returned on successive polls; the last scripted
    /// state repeats once the script is exhausted.
    pub fn script_job_states(&self, states: Vec<JobState>) {
        self.lock().job_script = states.into();
    }

    pub fn set_job_logs(&self, lines: Vec<String>) {
        self.lock().job_logs = lines;
    }

    /// Stores a file readable through `get_file`.
    pub fn put_commit_file(&self, repo: &str, commit: &str, path: &str, content: &[u8]) {
        let _ = self.lock().files.insert(
            (repo.to_string(), commit.to_string(), path.to_string()),
            content.to_vec(),
        );
    }

    /// Queues a commit event delivered as soon as `repo` is subscribed to.
    pub fn queue_commit(&self, repo: &str, meta: CommitMeta) {
        let mut state = self.lock();
        deliver(&mut state, repo, meta);
    }

    /// Publishes a commit event to current subscribers of `meta.repo`.
    pub fn publish_commit(&self, meta: CommitMeta) {
        let mut state = self.lock();
        let repo = meta.repo.clone();
        deliver(&mut state, &repo, meta);
    }

    /// Publishes a commit event once `job_state` has been polled `polls`
    /// times, modeling a cluster that produces output after some ticks.
    pub fn publish_commit_after_polls(&self, polls: u32, meta: CommitMeta) {
        self.lock().publish_on_poll = Some((polls, meta));
    }

    /// Returns the only pipeline and its input repositories, if exactly one
    /// exists. Lets tests discover randomly named session resources.
    pub fn single_pipeline(&self) -> Option<(String, Vec<String>)> {
        let state = self.lock();
        if state.pipelines.len() == 1 {
            state
                .pipelines
                .iter()
                .next()
                .map(|(name, spec)| (name.clone(), spec.inputs.clone()))
        } else {
            None
        }
    }

    /// Makes the next pipeline creation fail.
    pub fn fail_pipeline_create(&self) {
        self.lock().fail_pipeline_create = true;
    }

    /// Makes creation of any repository whose name ends with `suffix` fail.
    pub fn fail_repo_with_suffix(&self, suffix: &str) {
        self.lock().fail_repo_suffix = Some(suffix.to_string());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.inner.lock().expect("fake cluster lock poisoned")
    }
}

/// Sends to live subscribers of `repo`, or queues when none are listening.
fn deliver(state: &mut FakeState, repo: &str, meta: CommitMeta) {
    let mut sent = false;
    for subscriber in state.subscribers.iter().filter(|s| s.repo == repo) {
        if subscriber.tx.try_send(meta.clone()).is_ok() {
            sent = true;
        }
    }
    if !sent {
        state.queued.entry(repo.to_string()).or_default().push(meta);
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn create_repo(&self, name: &str) -> Result<(), ClusterError> {
        let mut state = self.lock();
        if let Some(suffix) = &state.fail_repo_suffix {
            if name.ends_with(suffix.as_str()) {
                return Err(ClusterError::Api {
                    status: 500,
                    message: format!("injected failure creating repo '{name}'"),
                });
            }
        }
        let _ = state.repos.insert(name.to_string());
        Ok(())
    }

    async fn delete_repo(&self, name: &str) -> Result<(), ClusterError> {
        let mut state = self.lock();
        if state.repos.remove(name) {
            Ok(())
        } else {
            Err(ClusterError::Api {
                status: 404,
                message: format!("repo '{name}' not found"),
            })
        }
    }

    async fn put_file_bytes(
        &self,
        repo: &str,
        branch: &str,
        path: &str,
        content: &[u8],
    ) -> Result<(), ClusterError> {
        let mut state = self.lock();
        state.staged.push(StagedFile {
            repo: repo.to_string(),
            branch: branch.to_string(),
            path: path.to_string(),
            content: Some(content.to_vec()),
            url: None,
        });
        Ok(())
    }

    async fn put_file_url(
        &self,
        repo: &str,
        branch: &str,
        path: &str,
        url: &str,
    ) -> Result<(), ClusterError> {
        let mut state = self.lock();
        state.staged.push(StagedFile {
            repo: repo.to_string(),
            branch: branch.to_string(),
            path: path.to_string(),
            content: None,
            url: Some(url.to_string()),
        });
        Ok(())
    }

    async fn get_file(
        &self,
        repo: &str,
        commit: &str,
        path: &str,
    ) -> Result<Vec<u8>, ClusterError> {
        let state = self.lock();
        state
            .files
            .get(&(repo.to_string(), commit.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| ClusterError::FileNotFound {
                repo: repo.to_string(),
                commit: commit.to_string(),
                path: path.to_string(),
            })
    }

    async fn create_pipeline(&self, spec: &PipelineSpec) -> Result<(), ClusterError> {
        let mut state = self.lock();
        if state.fail_pipeline_create {
            return Err(ClusterError::Api {
                status: 500,
                message: "injected pipeline creation failure".to_string(),
            });
        }
        let _ = state.pipelines.insert(spec.name.clone(), spec.clone());
        Ok(())
    }

    async fn delete_pipeline(&self, name: &str) -> Result<(), ClusterError> {
        let mut state = self.lock();
        if state.pipelines.remove(name).is_some() {
            Ok(())
        } else {
            Err(ClusterError::Api {
                status: 404,
                message: format!("pipeline '{name}' not found"),
            })
        }
    }

    async fn job_state(&self, _pipeline: &str) -> Result<JobState, ClusterError> {
        let mut state = self.lock();
        state.poll_count += 1;

        let due = matches!(&state.publish_on_poll, Some((polls, _)) if state.poll_count >= *polls);
        if due {
            if let Some((_, meta)) = state.publish_on_poll.take() {
                let repo = meta.repo.clone();
                deliver(&mut state, &repo, meta);
            }
        }

        let next = if state.job_script.len() > 1 {
            state.job_script.pop_front()
        } else {
            state.job_script.front().copied()
        };
        Ok(next.or(state.job_state).unwrap_or(JobState::Pending))
    }

    async fn job_logs(&self, _pipeline: &str) -> Result<Vec<String>, ClusterError> {
        Ok(self.lock().job_logs.clone())
    }

    async fn subscribe_commits(&self, repo: &str) -> Result<CommitStream, ClusterError> {
        let (tx, rx) = mpsc::channel(64);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let id = {
            let mut state = self.lock();
            let id = state.next_subscriber_id;
            state.next_subscriber_id += 1;
            state.active_subscriptions += 1;

            if let Some(queued) = state.queued.remove(repo) {
                for meta in queued {
                    let _ = tx.try_send(meta);
                }
            }

            state.subscribers.push(Subscriber {
                id,
                repo: repo.to_string(),
                tx,
            });
            id
        };

        let inner = Arc::clone(&self.inner);
        let _ = tokio::spawn(async move {
            // Resolves on explicit close and on stream drop alike.
            let _ = stop_rx.await;
            let mut state = inner.lock().expect("fake cluster lock poisoned");
            state.active_subscriptions -= 1;
            state.subscribers.retain(|s| s.id != id);
        });

        Ok(CommitStream::new(rx, stop_tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(repo: &str, id: &str) -> CommitMeta {
        CommitMeta {
            repo: repo.to_string(),
            id: id.to_string(),
            provenance: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_queued_commits_flow_to_late_subscriber() {
        let fake = FakeCluster::new();
        fake.queue_commit("run-out", meta("run-out", "c1"));
        fake.queue_commit("run-out", meta("run-out", "c2"));

        let mut stream = fake.subscribe_commits("run-out").await.expect("subscribe");
        assert_eq!(stream.next().await.expect("c1").id, "c1");
        assert_eq!(stream.next().await.expect("c2").id, "c2");
    }

    #[tokio::test]
    async fn test_subscription_close_is_tracked() {
        let fake = FakeCluster::new();
        let stream = fake.subscribe_commits("run-out").await.expect("subscribe");
        assert_eq!(fake.active_subscriptions(), 1);

        stream.close();
        // Let the stop listener run.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(fake.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_scripted_job_states_repeat_last() {
        let fake = FakeCluster::new();
        fake.script_job_states(vec![JobState::Pending, JobState::Running]);

        assert_eq!(fake.job_state("p").await.expect("s"), JobState::Pending);
        assert_eq!(fake.job_state("p").await.expect("s"), JobState::Running);
        assert_eq!(fake.job_state("p").await.expect("s"), JobState::Running);
    }

    #[tokio::test]
    async fn test_publish_after_polls() {
        let fake = FakeCluster::new();
        fake.set_job_state(JobState::Running);
        fake.publish_commit_after_polls(2, meta("run-out", "c9"));

        let mut stream = fake.subscribe_commits("run-out").await.expect("subscribe");
        let _ = fake.job_state("p").await.expect("poll 1");
        // Not published yet after a single poll.
        assert!(fake.lock().publish_on_poll.is_some());
        let _ = fake.job_state("p").await.expect("poll 2");
        assert!(fake.lock().publish_on_poll.is_none());
        assert_eq!(stream.next().await.expect("commit").id, "c9");
    }
}
