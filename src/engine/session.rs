//! Run-scoped session lifecycle.
//!
//! A session is the self-contained set of cluster constructs backing one
//! validation run: a data repository, a processors repository, and a
//! pipeline bound to both. The manager guarantees teardown on every exit
//! path; cleanup failures are logged and never override a primary result.

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use crate::cluster::{ClusterClient, Repository};
use crate::error::{ClusterError, EngineError};
use crate::pipeline::{BoundPipeline, PipelineDefinition};

/// Correlation context for one validation run.
///
/// Owned exclusively by the run that created it; never shared across runs.
pub struct Session {
    name: String,
    data: Repository,
    processors: Repository,
    pipeline: BoundPipeline,
}

impl Session {
    /// Unique session name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Repository the dataset is staged into.
    pub fn data(&self) -> &Repository {
        &self.data
    }

    /// Repository the processor module is staged into.
    pub fn processors(&self) -> &Repository {
        &self.processors
    }

    /// The pipeline bound to this session's repositories.
    pub fn pipeline(&self) -> &BoundPipeline {
        &self.pipeline
    }

    /// The provenance set identifying this session's output commit: exactly
    /// the two input repository names.
    pub fn provenance_target(&self) -> HashSet<String> {
        [
            self.data.name().to_string(),
            self.processors.name().to_string(),
        ]
        .into_iter()
        .collect()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("name", &self.name).finish()
    }
}

/// Creates and tears down sessions against one cluster.
pub struct SessionManager {
    client: Arc<dyn ClusterClient>,
    definition: PipelineDefinition,
}

impl SessionManager {
    pub fn new(client: Arc<dyn ClusterClient>, definition: PipelineDefinition) -> Self {
        Self { client, definition }
    }

    /// Creates the two repositories and binds the pipeline definition to
    /// them. Partially provisioned resources are rolled back before a
    /// provisioning error is returned.
    pub async fn open(&self) -> Result<Session, EngineError> {
        let name = format!("validate-{}", Uuid::new_v4());
        let data_name = format!("{name}-data");
        let processors_name = format!("{name}-processors");

        let data = Repository::create(Arc::clone(&self.client), data_name.clone())
            .await
            .map_err(|source| provisioning(&data_name, source))?;

        let processors =
            match Repository::create(Arc::clone(&self.client), processors_name.clone()).await {
                Ok(repo) => repo,
                Err(source) => {
                    delete_repo_quietly(&data).await;
                    return Err(provisioning(&processors_name, source));
                }
            };

        let pipeline = match BoundPipeline::bind(
            Arc::clone(&self.client),
            &self.definition,
            &name,
            data.name(),
            processors.name(),
        )
        .await
        {
            Ok(pipeline) => pipeline,
            Err(err) => {
                delete_repo_quietly(&processors).await;
                delete_repo_quietly(&data).await;
                // A cluster refusal here is a provisioning failure like any
                // other; definition errors pass through unchanged.
                return Err(match err {
                    EngineError::Cluster(source) => provisioning(&name, source),
                    other => other,
                });
            }
        };

        tracing::debug!(session = %name, "session opened");

        Ok(Session {
            name,
            data,
            processors,
            pipeline,
        })
    }

    /// Deletes the session's pipeline, then its repositories in reverse
    /// creation order. Best-effort: failures are logged and swallowed so a
    /// cleanup failure never masks the run's primary outcome.
    pub async fn close(&self, session: Session) {
        if let Err(err) = session.pipeline.delete().await {
            warn_cleanup(&session.name, "pipeline", &err);
        }
        if let Err(err) = session.processors.delete().await {
            warn_cleanup(&session.name, "processors repository", &err);
        }
        if let Err(err) = session.data.delete().await {
            warn_cleanup(&session.name, "data repository", &err);
        }

        tracing::debug!(session = %session.name, "session closed");
    }
}

fn provisioning(resource: &str, source: ClusterError) -> EngineError {
    EngineError::Provisioning {
        resource: resource.to_string(),
        source,
    }
}

async fn delete_repo_quietly(repo: &Repository) {
    if let Err(err) = repo.delete().await {
        tracing::warn!(repo = %repo.name(), error = %err, "rollback deletion failed");
    }
}

fn warn_cleanup(session: &str, resource: &str, err: &ClusterError) {
    tracing::warn!(session = %session, resource = %resource, error = %err, "session cleanup failed");
}
