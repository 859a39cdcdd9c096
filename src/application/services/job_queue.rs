use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{models::BroadcastJob, value_objects::JobId};

/// How long a claim stays valid without renewal.
pub const DEFAULT_LEASE: Duration = Duration::from_secs(30);

/// Queue of broadcast jobs. A claimed job belongs to exactly one worker while its lease is alive.
#[async_trait]
pub trait BroadcastQueue: Send + Sync {
    async fn enqueue(&self, job: &BroadcastJob, delay: Option<Duration>) -> anyhow::Result<()>;

    /// Takes the next job whose delay has elapsed and leases it to `owner`.
    async fn claim_ready(
        &self,
        owner: &str,
        lease: Duration,
    ) -> anyhow::Result<Option<BroadcastJob>>;

    /// Extends the lease. Returns `false` once `owner` no longer holds the job.
    async fn renew_lease(
        &self,
        job_id: &JobId,
        owner: &str,
        lease: Duration,
    ) -> anyhow::Result<bool>;

    /// Hands a leased job back to the ready set so another worker can resume it.
    async fn release(&self, job_id: &JobId, owner: &str) -> anyhow::Result<bool>;

    /// Drops an active job once its run reached a terminal outcome.
    async fn complete(&self, job_id: &JobId) -> anyhow::Result<()>;

    /// Removes every job that is waiting and not yet claimed.
    async fn remove_waiting(&self) -> anyhow::Result<Vec<JobId>>;

    /// Moves active jobs whose lease ran out (their worker died) back to the ready set.
    async fn requeue_expired(&self) -> anyhow::Result<Vec<JobId>>;
}
