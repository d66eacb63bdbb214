//! Task-graph execution backend.
//!
//! The simpler of the two backends: no session resources live in the
//! scheduler, so there is nothing to watch or clean up. The dataset and
//! processor module are submitted together as one task and the report comes
//! back in the response.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::engine::{DataSource, ProcessorModule, ValidationBackend};
use crate::error::{ClusterError, EngineError};

/// A single validation task submitted to the scheduler.
#[derive(Debug, Serialize)]
struct TaskSubmission<'a> {
    module_name: &'a str,
    module_source: &'a str,
    dataset_name: &'a str,
    dataset_content: &'a str,
}

#[derive(Debug, Deserialize)]
struct TaskResult {
    report: String,
}

/// Executes validation runs by submitting directly to a task-graph
/// scheduler.
pub struct TaskGraphEngine {
    scheduler_url: String,
    request_timeout: Duration,
    http_client: Client,
}

impl TaskGraphEngine {
    /// Creates an engine against the configured scheduler address.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            scheduler_url: config.scheduler_address.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout,
            http_client: Client::new(),
        }
    }
}

#[async_trait]
impl ValidationBackend for TaskGraphEngine {
    async fn run(
        &self,
        dataset: DataSource,
        module: ProcessorModule,
    ) -> Result<String, EngineError> {
        let (dataset_name, content) = match dataset {
            DataSource::Inline { filename, content } => (filename, content),
            // The scheduler has no cluster-side fetch; remote datasets are a
            // cluster-backend capability.
            DataSource::Remote { .. } => {
                return Err(EngineError::Internal(
                    "task-graph backend requires an inline dataset".to_string(),
                ))
            }
        };

        let module_source = String::from_utf8(module.content)?;
        let dataset_content = String::from_utf8(content)?;

        let submission = TaskSubmission {
            module_name: &module.name,
            module_source: &module_source,
            dataset_name: &dataset_name,
            dataset_content: &dataset_content,
        };

        tracing::info!(module = %module.name, dataset = %dataset_name, "submitting validation task");

        let response = self
            .http_client
            .post(format!("{}/tasks", self.scheduler_url))
            .timeout(self.request_timeout)
            .json(&submission)
            .send()
            .await
            .map_err(ClusterError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EngineError::Cluster(ClusterError::Api {
                status: status.as_u16(),
                message,
            }));
        }

        let result: TaskResult = response.json().await.map_err(ClusterError::Http)?;
        Ok(result.report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_remote_dataset_is_rejected() {
        let engine = TaskGraphEngine::new(&EngineConfig::default());
        let result = engine
            .run(
                DataSource::Remote {
                    bucket: "datasets".to_string(),
                    key: "survey.csv".to_string(),
                },
                ProcessorModule::new("processor.py", &b"# p"[..]),
            )
            .await;
        assert!(matches!(result, Err(EngineError::Internal(_))));
    }

    #[test]
    fn test_scheduler_url_is_normalized() {
        let config = EngineConfig::default().with_scheduler_address("http://scheduler:8786/");
        let engine = TaskGraphEngine::new(&config);
        assert_eq!(engine.scheduler_url, "http://scheduler:8786");
    }

    #[test]
    fn test_submission_serializes_flat() {
        let submission = TaskSubmission {
            module_name: "processor.py",
            module_source: "def run(): pass",
            dataset_name: "data.csv",
            dataset_content: "a,b\n",
        };
        let json = serde_json::to_value(&submission).expect("serialize");
        assert_eq!(json["module_name"], "processor.py");
        assert_eq!(json["dataset_name"], "data.csv");
    }
}
