use std::sync::Arc;

use tracing::info;

use crate::{
    application::services::{job_queue::BroadcastQueue, job_state::JobStateStore},
    domain::{errors::BroadcastError, value_objects::JobId},
};

/// Sentinel accepted by the cancel surface in place of a job id.
pub const CANCEL_ALL: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelTarget {
    Job(JobId),
    /// Every queued job that has not started yet. Running jobs are untouched.
    All,
}

impl CancelTarget {
    pub fn parse(raw: &str) -> Result<Self, BroadcastError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(BroadcastError::Validation("jobId is required".to_string()));
        }
        if raw == CANCEL_ALL {
            Ok(CancelTarget::All)
        } else {
            Ok(CancelTarget::Job(JobId::from(raw)))
        }
    }
}

pub struct CancelBroadcastUseCase {
    queue: Arc<dyn BroadcastQueue>,
    state: JobStateStore,
}

impl CancelBroadcastUseCase {
    pub fn new(queue: Arc<dyn BroadcastQueue>, state: JobStateStore) -> Self {
        Self { queue, state }
    }

    /// Returns the ids whose cancelled flag was written.
    pub async fn execute(&self, target: CancelTarget) -> Result<Vec<JobId>, BroadcastError> {
        match target {
            CancelTarget::Job(job_id) => {
                self.state.mark_cancelled(&job_id).await?;
                info!(job_id = %job_id, "broadcast cancellation requested");
                Ok(vec![job_id])
            }
            CancelTarget::All => {
                let removed = self.queue.remove_waiting().await?;
                for job_id in &removed {
                    self.state.mark_cancelled(job_id).await?;
                }
                info!(removed = removed.len(), "queued broadcasts cancelled");
                Ok(removed)
            }
        }
    }
}
