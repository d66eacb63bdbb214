//! HTTP implementation of the cluster client.
//!
//! Talks to the cluster's REST gateway. Unary calls get a per-request
//! timeout; the commit subscription is a long-lived streaming request and
//! deliberately runs without one.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};

use crate::cluster::client::{ClusterClient, CommitMeta, CommitStream, JobState};
use crate::error::ClusterError;
use crate::pipeline::PipelineSpec;

/// Buffered commit events per subscription before backpressure applies.
const SUBSCRIPTION_BUFFER: usize = 16;

/// Cluster client over the REST gateway.
pub struct HttpClusterClient {
    /// Base URL of the cluster API.
    base_url: String,
    /// Timeout for unary requests.
    request_timeout: Duration,
    /// HTTP client; no global timeout so subscriptions can stream freely.
    http_client: Client,
}

#[derive(Debug, Deserialize)]
struct JobInfo {
    state: JobState,
}

#[derive(Debug, Deserialize)]
struct JobLogs {
    lines: Vec<String>,
}

impl HttpClusterClient {
    /// Creates a new client against the given cluster address.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout,
            http_client: Client::new(),
        }
    }

    fn repo_url(&self, repo: &str) -> String {
        format!("{}/repos/{}", self.base_url, urlencoding::encode(repo))
    }

    fn pipeline_url(&self, pipeline: &str) -> String {
        format!("{}/pipelines/{}", self.base_url, urlencoding::encode(pipeline))
    }

    /// Maps non-success responses to API errors.
    async fn check(response: Response) -> Result<Response, ClusterError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(ClusterError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ClusterClient for HttpClusterClient {
    async fn create_repo(&self, name: &str) -> Result<(), ClusterError> {
        let response = self
            .http_client
            .put(self.repo_url(name))
            .timeout(self.request_timeout)
            .send()
            .await?;
        let _ = Self::check(response).await?;
        Ok(())
    }

    async fn delete_repo(&self, name: &str) -> Result<(), ClusterError> {
        let response = self
            .http_client
            .delete(self.repo_url(name))
            .timeout(self.request_timeout)
            .send()
            .await?;
        let _ = Self::check(response).await?;
        Ok(())
    }

    async fn put_file_bytes(
        &self,
        repo: &str,
        branch: &str,
        path: &str,
        content: &[u8],
    ) -> Result<(), ClusterError> {
        let url = format!(
            "{}/branches/{}/files?path={}",
            self.repo_url(repo),
            urlencoding::encode(branch),
            urlencoding::encode(path),
        );
        let response = self
            .http_client
            .post(url)
            .timeout(self.request_timeout)
            .body(content.to_vec())
            .send()
            .await?;
        let _ = Self::check(response).await?;
        Ok(())
    }

    async fn put_file_url(
        &self,
        repo: &str,
        branch: &str,
        path: &str,
        source_url: &str,
    ) -> Result<(), ClusterError> {
        let url = format!(
            "{}/branches/{}/files?path={}&url={}",
            self.repo_url(repo),
            urlencoding::encode(branch),
            urlencoding::encode(path),
            urlencoding::encode(source_url),
        );
        let response = self
            .http_client
            .post(url)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let _ = Self::check(response).await?;
        Ok(())
    }

    async fn get_file(
        &self,
        repo: &str,
        commit: &str,
        path: &str,
    ) -> Result<Vec<u8>, ClusterError> {
        let url = format!(
            "{}/commits/{}/files?path={}",
            self.repo_url(repo),
            urlencoding::encode(commit),
            urlencoding::encode(path),
        );
        let response = self
            .http_client
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClusterError::FileNotFound {
                repo: repo.to_string(),
                commit: commit.to_string(),
                path: path.to_string(),
            });
        }

        let response = Self::check(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn create_pipeline(&self, spec: &PipelineSpec) -> Result<(), ClusterError> {
        let response = self
            .http_client
            .post(format!("{}/pipelines", self.base_url))
            .timeout(self.request_timeout)
            .json(spec)
            .send()
            .await?;
        let _ = Self::check(response).await?;
        Ok(())
    }

    async fn delete_pipeline(&self, name: &str) -> Result<(), ClusterError> {
        let response = self
            .http_client
            .delete(self.pipeline_url(name))
            .timeout(self.request_timeout)
            .send()
            .await?;
        let _ = Self::check(response).await?;
        Ok(())
    }

    async fn job_state(&self, pipeline: &str) -> Result<JobState, ClusterError> {
        let response = self
            .http_client
            .get(format!("{}/job", self.pipeline_url(pipeline)))
            .timeout(self.request_timeout)
            .send()
            .await?;

        // The cluster materializes the job lazily; until then there is
        // nothing to report and the job counts as pending.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(JobState::Pending);
        }

        let response = Self::check(response).await?;
        let info: JobInfo = response.json().await?;
        Ok(info.state)
    }

    async fn job_logs(&self, pipeline: &str) -> Result<Vec<String>, ClusterError> {
        let response = self
            .http_client
            .get(format!("{}/logs", self.pipeline_url(pipeline)))
            .timeout(self.request_timeout)
            .send()
            .await?;
        let response = Self::check(response).await?;
        let logs: JobLogs = response.json().await?;
        Ok(logs.lines)
    }

    async fn subscribe_commits(&self, repo: &str) -> Result<CommitStream, ClusterError> {
        let url = format!("{}/commits?subscribe=true", self.repo_url(repo));
        let response = self.http_client.get(url).send().await?;
        let response = Self::check(response).await?;

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let repo = repo.to_string();

        tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    chunk = body.next() => match chunk {
                        Some(Ok(bytes)) => {
                            buffer.extend_from_slice(&bytes);
                            if !drain_events(&mut buffer, &tx).await {
                                return;
                            }
                        }
                        Some(Err(err)) => {
                            tracing::warn!(repo = %repo, error = %err, "commit subscription transport error");
                            break;
                        }
                        None => break,
                    },
                }
            }
        });

        Ok(CommitStream::new(rx, stop_tx))
    }
}

/// Parses complete newline-delimited JSON events out of the buffer and
/// forwards them. Returns false once the receiver is gone.
async fn drain_events(buffer: &mut Vec<u8>, tx: &mpsc::Sender<CommitMeta>) -> bool {
    while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=pos).collect();
        let line = &line[..line.len() - 1];
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            continue;
        }

        match serde_json::from_slice::<CommitMeta>(line) {
            Ok(meta) => {
                if tx.send(meta).await.is_err() {
                    return false;
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "skipping malformed commit event");
            }
        }
    }
    true
}
