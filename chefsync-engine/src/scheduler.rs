//! Fan the staged workspace out to every replica.
//!
//! One tokio task per replica, bounded by a semaphore. Tasks share nothing
//! but the read-only workspace path; a failure (or panic) in one task is
//! recorded for that replica and never reaches the others.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;

use crate::replica::ReplicaTarget;
use crate::report::{ReplicaOutcome, ReplicaReport};

#[derive(Debug, Clone)]
pub struct DistributionScheduler {
    max_parallel: usize,
}

impl DistributionScheduler {
    /// `max_parallel` is clamped to at least one; one means sequential.
    pub fn new(max_parallel: usize) -> Self {
        Self {
            max_parallel: max_parallel.max(1),
        }
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Transfer and apply on every replica. Reports come back in the order
    /// of `replicas`, whatever order the tasks finished in.
    pub async fn distribute(
        &self,
        workspace: &Path,
        replicas: &[Arc<dyn ReplicaTarget>],
    ) -> Vec<ReplicaReport> {
        let permits = Arc::new(Semaphore::new(self.max_parallel));
        let mut handles = Vec::with_capacity(replicas.len());

        for replica in replicas {
            let replica = Arc::clone(replica);
            let permits = Arc::clone(&permits);
            let workspace = workspace.to_path_buf();
            let name = replica.name().clone();
            let handle = tokio::spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return (
                        ReplicaOutcome::Aborted {
                            reason: "scheduler shut down".to_string(),
                        },
                        0,
                    );
                };
                let started = Instant::now();
                let outcome = distribute_one(replica.as_ref(), &workspace).await;
                (outcome, started.elapsed().as_millis())
            });
            handles.push((name, handle));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for (replica, handle) in handles {
            let (outcome, duration_ms) = match handle.await {
                Ok(result) => result,
                Err(err) => {
                    tracing::error!("distribution task for {replica} aborted: {err}");
                    (
                        ReplicaOutcome::Aborted {
                            reason: err.to_string(),
                        },
                        0,
                    )
                }
            };
            reports.push(ReplicaReport {
                replica,
                outcome,
                duration_ms,
            });
        }
        reports
    }
}

impl Default for DistributionScheduler {
    fn default() -> Self {
        Self::new(4)
    }
}

async fn distribute_one(replica: &dyn ReplicaTarget, workspace: &Path) -> ReplicaOutcome {
    let name = replica.name();
    tracing::info!("uploading to replica {name}");

    if let Err(err) = replica.transfer(workspace).await {
        tracing::error!("replica {name}: {err}");
        return ReplicaOutcome::TransferFailed {
            reason: err.to_string(),
        };
    }
    if let Err(err) = replica.apply().await {
        tracing::error!("replica {name}: {err}");
        return ReplicaOutcome::ApplyFailed {
            reason: err.to_string(),
        };
    }

    tracing::info!("replica {name} applied");
    ReplicaOutcome::Success
}
