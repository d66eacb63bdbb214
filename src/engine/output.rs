//! Report retrieval from the accepted output commit.

use crate::cluster::Commit;
use crate::error::{ClusterError, EngineError};

/// Fixed path convention the pipeline writes its report to.
pub const OUTPUT_PATH: &str = "/report.out";

/// Pulls the output artifact from the accepted commit and decodes it into
/// the report text: split on line boundaries, decode each line as UTF-8,
/// join with newlines.
///
/// Missing output should not occur once the completion watcher has
/// resolved, but it is handled defensively as a not-found error.
pub async fn retrieve_report(commit: &Commit) -> Result<String, EngineError> {
    let bytes = commit.pull_file(OUTPUT_PATH).await.map_err(|err| match err {
        ClusterError::FileNotFound { .. } => EngineError::OutputMissing,
        other => EngineError::Cluster(other),
    })?;

    let text = String::from_utf8(bytes)?;
    Ok(text.lines().collect::<Vec<_>>().join("\n"))
}
