//! Completion detection for one session.
//!
//! Two concurrent tasks race: a subscription to the pipeline's output
//! commit stream, and the two-phase job-state wait. The subscription is the
//! actual "output ready" signal; the job wait exists to bound total wall
//! time and to surface job failure. Whichever resolves first wins and the
//! loser is cancelled with its resources released.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::cluster::{ClusterClient, Commit};
use crate::config::RetryBudgets;
use crate::engine::session::Session;
use crate::error::EngineError;

/// Shared progress callback fired once per poll attempt.
pub type ProgressTick = Arc<dyn Fn() + Send + Sync>;

/// Delay units granted to an in-flight commit event after the job has
/// already finished cleanly.
const FINISH_GRACE_TICKS: u32 = 5;

/// Races the commit subscription against the job wait and returns the
/// accepted output commit.
///
/// The accepted commit is the first one whose provenance set equals exactly
/// the session's two input repository names; non-matching commits are
/// discarded without stopping the subscription. If the job wait errors
/// first (retry exhaustion or job failure), that error propagates and the
/// subscription is torn down before returning.
pub async fn watch_for_output(
    client: Arc<dyn ClusterClient>,
    session: &Session,
    budgets: &RetryBudgets,
    on_tick: ProgressTick,
) -> Result<Commit, EngineError> {
    let mut stream = client.subscribe_commits(session.pipeline().output_repo()).await?;
    let target = session.provenance_target();

    let (found_tx, mut found_rx) = oneshot::channel::<Commit>();
    let subscription_client = Arc::clone(&client);
    let subscription = tokio::spawn(async move {
        let mut slot = Some(found_tx);
        while let Some(meta) = stream.next().await {
            let commit = Commit::from_meta(Arc::clone(&subscription_client), meta);
            if commit.provenance_matches(&target) {
                if let Some(slot) = slot.take() {
                    let _ = slot.send(commit);
                }
                break;
            }
        }
        // Reached on match, on a closed stream, and on task abort (via the
        // stream's drop signal); the cluster-side subscription always ends.
        stream.close();
    });

    let pipeline = session.pipeline().clone();
    let wait_budgets = budgets.clone();
    let mut wait = tokio::spawn(async move {
        pipeline
            .wait_for_completion(&wait_budgets, on_tick.as_ref())
            .await
    });

    tokio::select! {
        commit = &mut found_rx => {
            // Output observed; the poller is pure bookkeeping now.
            wait.abort();
            commit.map_err(|_| EngineError::Internal("subscription task dropped its result slot".to_string()))
        }
        result = &mut wait => {
            match result {
                // The job finished cleanly before we saw the commit event;
                // the matching commit may be in flight, so keep listening for
                // a bounded grace window instead of indefinitely.
                Ok(Ok(state)) => {
                    tracing::debug!(state = %state, "job finished before output event arrived");
                    let grace = budgets.delay.saturating_mul(FINISH_GRACE_TICKS);
                    match tokio::time::timeout(grace, found_rx).await {
                        Ok(Ok(commit)) => Ok(commit),
                        Ok(Err(_)) => Err(EngineError::OutputMissing),
                        Err(_) => {
                            subscription.abort();
                            Err(EngineError::OutputMissing)
                        }
                    }
                }
                Ok(Err(err)) => {
                    subscription.abort();
                    Err(err)
                }
                Err(join_err) => {
                    subscription.abort();
                    Err(EngineError::Internal(format!("job wait task failed: {join_err}")))
                }
            }
        }
    }
}
