//! Typed proxy for a cluster repository.

use std::sync::Arc;

use crate::cluster::client::ClusterClient;
use crate::error::ClusterError;

/// A named append-only store of commits in the cluster.
///
/// Created when a session starts and deleted at session teardown; the handle
/// itself performs no cleanup on drop, the session manager owns that.
#[derive(Clone)]
pub struct Repository {
    client: Arc<dyn ClusterClient>,
    name: String,
}

impl Repository {
    /// Creates the repository in the cluster and returns a handle to it.
    pub async fn create(
        client: Arc<dyn ClusterClient>,
        name: impl Into<String>,
    ) -> Result<Self, ClusterError> {
        let name = name.into();
        client.create_repo(&name).await?;
        Ok(Self { client, name })
    }

    /// Repository name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Writes a file into a new commit on the given branch.
    pub async fn put_file_bytes(
        &self,
        branch: &str,
        path: &str,
        content: &[u8],
    ) -> Result<(), ClusterError> {
        self.client
            .put_file_bytes(&self.name, branch, path, content)
            .await
    }

    /// Instructs the cluster to fetch a remote resource into a new commit.
    pub async fn put_file_url(
        &self,
        branch: &str,
        path: &str,
        url: &str,
    ) -> Result<(), ClusterError> {
        self.client.put_file_url(&self.name, branch, path, url).await
    }

    /// Deletes the repository and all of its commits.
    pub async fn delete(&self) -> Result<(), ClusterError> {
        self.client.delete_repo(&self.name).await
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository").field("name", &self.name).finish()
    }
}
