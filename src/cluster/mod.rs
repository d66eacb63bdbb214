//! Typed proxy over the cluster's repository/commit/pipeline API.
//!
//! The `ClusterClient` trait is the seam between the orchestration engine
//! and the cluster transport; `HttpClusterClient` is the production
//! implementation and a fake lives behind `#[cfg(test)]`.

pub mod client;
pub mod commit;
pub mod http;
pub mod repo;

#[cfg(test)]
pub mod fake;

pub use client::{ClusterClient, CommitMeta, CommitStream, JobState, ProvenanceRef};
pub use commit::Commit;
pub use http::HttpClusterClient;
pub use repo::Repository;
