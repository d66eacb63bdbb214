//! Typed proxy for a cluster commit.

use std::collections::HashSet;
use std::sync::Arc;

use crate::cluster::client::{ClusterClient, CommitMeta};
use crate::error::ClusterError;

/// An immutable snapshot on a repository branch, identified by
/// `(repository, commit-id)` and carrying its provenance set.
#[derive(Clone)]
pub struct Commit {
    client: Arc<dyn ClusterClient>,
    repo: String,
    id: String,
    provenance: HashSet<String>,
}

impl Commit {
    /// Reconstructs a commit from raw cluster metadata.
    ///
    /// The provenance set is rebuilt from the cluster's provenance listing
    /// and defaults to empty when the cluster reports none.
    pub fn from_meta(client: Arc<dyn ClusterClient>, meta: CommitMeta) -> Self {
        let provenance = meta.provenance.into_iter().map(|p| p.repo).collect();
        Self {
            client,
            repo: meta.repo,
            id: meta.id,
            provenance,
        }
    }

    /// Repository this commit belongs to.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Commit id within the repository.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Full `repo/commit` name.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.repo, self.id)
    }

    /// Set of repository names whose commits causally contributed to this one.
    pub fn provenance(&self) -> &HashSet<String> {
        &self.provenance
    }

    /// Whether this commit's provenance equals the target set exactly.
    /// Comparison is set equality, never order-sensitive.
    pub fn provenance_matches(&self, target: &HashSet<String>) -> bool {
        self.provenance == *target
    }

    /// Retrieves a file from this commit.
    pub async fn pull_file(&self, path: &str) -> Result<Vec<u8>, ClusterError> {
        self.client.get_file(&self.repo, &self.id, path).await
    }
}

impl std::fmt::Debug for Commit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Commit")
            .field("repo", &self.repo)
            .field("id", &self.id)
            .field("provenance", &self.provenance)
            .finish()
    }
}
