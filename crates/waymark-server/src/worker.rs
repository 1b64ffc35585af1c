//! Deferred reconciliation worker.
//!
//! Mutation handlers never reconcile inline: they enqueue
//! [`ReconcileScope`]s on an unbounded channel and return. A single
//! consumer task drains the channel and runs each scope on the blocking
//! pool, so runs never interleave and a slow full pass only delays later
//! passes, not requests. Failures are logged and dropped; the next
//! relevant event triggers a fresh recompute.

use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;
use waymark_db::DbPool;
use waymark_tracker::{reconcile, ReconcileScope};

/// Spawns the reconciliation worker task.
///
/// Returns the sending half handlers enqueue on, and the task handle. The
/// task ends when every sender is dropped and the queue is drained.
pub fn spawn_reconcile_worker(
    pool: DbPool,
) -> (mpsc::UnboundedSender<ReconcileScope>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<ReconcileScope>();

    let handle = tokio::spawn(async move {
        while let Some(scope) = rx.recv().await {
            let run_id = Uuid::new_v4();
            let started = Instant::now();

            let pool = pool.clone();
            let result = tokio::task::spawn_blocking(move || {
                let conn = pool.get().map_err(|e| e.to_string())?;
                reconcile(&conn, scope).map_err(|e| e.to_string())
            })
            .await;

            let elapsed_ms = started.elapsed().as_millis() as u64;
            match result {
                Ok(Ok(outcome)) => {
                    if outcome.is_noop() {
                        tracing::debug!(
                            %run_id,
                            %scope,
                            elapsed_ms,
                            "reconciliation run changed nothing"
                        );
                    } else {
                        tracing::info!(
                            %run_id,
                            %scope,
                            elapsed_ms,
                            topics_written = outcome.topics_written,
                            topics_cleared = outcome.topics_cleared,
                            posts_written = outcome.posts_written,
                            posts_cleared = outcome.posts_cleared,
                            "reconciliation run applied"
                        );
                    }
                }
                Ok(Err(e)) => {
                    tracing::error!(%run_id, %scope, elapsed_ms, "reconciliation run failed: {e}");
                }
                Err(e) => {
                    tracing::error!(%run_id, %scope, "reconciliation task join error: {e}");
                }
            }
        }

        tracing::info!("reconciliation worker stopped");
    });

    (tx, handle)
}

/// Enqueues scopes on the worker channel, logging when the worker is gone.
///
/// Send failure means the process is shutting down; the scopes are dropped
/// and a later run recomputes whatever they covered.
pub fn enqueue_scopes(tx: &mpsc::UnboundedSender<ReconcileScope>, scopes: Vec<ReconcileScope>) {
    for scope in scopes {
        if tx.send(scope).is_err() {
            tracing::warn!(%scope, "reconciliation worker gone, dropping scope");
        }
    }
}
