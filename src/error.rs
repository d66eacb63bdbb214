//! Error types for veriflow operations.
//!
//! Defines error types for the two major subsystems:
//! - Cluster transport (repository/commit/pipeline API calls)
//! - Engine orchestration (provisioning, job waits, output retrieval)

use thiserror::Error;

/// Errors that can occur while talking to the cluster API.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("Cluster API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to decode cluster response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File '{path}' not found in commit {repo}/{commit}")]
    FileNotFound {
        repo: String,
        commit: String,
        path: String,
    },
}

/// Errors that can occur during a validation run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Repository or pipeline creation failed; the run aborts before staging.
    #[error("Failed to provision {resource}: {source}")]
    Provisioning {
        resource: String,
        #[source]
        source: ClusterError,
    },

    /// A wait phase exceeded its retry budget without reaching a target state.
    #[error("Gave up waiting for the job {phase} after {attempts} attempts")]
    RetryExhausted { phase: String, attempts: u32 },

    /// The validation job reached the failed state. Log lines are kept in
    /// cluster order; the first one is surfaced in the message.
    #[error("Validation job failed: {}", first_log(.logs))]
    JobFailed { logs: Vec<String> },

    /// The output artifact never materialized in the accepted commit.
    #[error("Output artifact missing from the pipeline's output commit")]
    OutputMissing,

    /// The output artifact could not be decoded as UTF-8 text.
    #[error("Output artifact is not valid UTF-8: {0}")]
    OutputDecode(#[from] std::string::FromUtf8Error),

    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("Pipeline definition error: {0}")]
    Definition(#[from] crate::pipeline::DefinitionError),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// First log line of a failed job, for one-line error display.
fn first_log(logs: &[String]) -> &str {
    logs.first().map_or("(no logs available)", String::as_str)
}
