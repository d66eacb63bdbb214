//! Validation execution backends.
//!
//! Two backends share one capability surface: the cluster-pipeline engine,
//! which carries all of the session/watch/cleanup coordination, and the
//! task-graph engine, which submits the work as a single scheduler task.

pub mod cluster_engine;
pub mod output;
pub mod session;
pub mod taskgraph;
pub mod watcher;

use async_trait::async_trait;

use crate::error::EngineError;

pub use cluster_engine::ClusterEngine;
pub use session::{Session, SessionManager};
pub use taskgraph::TaskGraphEngine;

/// The dataset input to a validation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// In-memory dataset content staged bytewise.
    Inline { filename: String, content: Vec<u8> },
    /// An object key in a remote bucket; the cluster fetches it directly.
    Remote { bucket: String, key: String },
}

impl DataSource {
    /// Basename the dataset is staged under inside its repository.
    pub fn filename(&self) -> &str {
        match self {
            DataSource::Inline { filename, .. } => filename,
            DataSource::Remote { key, .. } => key.rsplit('/').next().unwrap_or(key),
        }
    }
}

/// The validation logic pushed into the cluster job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorModule {
    /// Human-readable module identifier; used as the staged file name.
    pub name: String,
    /// Module source bytes.
    pub content: Vec<u8>,
}

impl ProcessorModule {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Shared capability surface of the execution backends.
#[async_trait]
pub trait ValidationBackend: Send + Sync {
    /// Runs one validation: stages the dataset and processor module,
    /// executes the workflow, and returns the report text.
    async fn run(&self, dataset: DataSource, module: ProcessorModule)
        -> Result<String, EngineError>;
}
