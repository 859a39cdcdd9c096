use std::sync::Arc;
use std::time::Duration;

use tokio::{
    task::{JoinHandle, JoinSet},
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    application::{
        handlers::broadcast_dispatcher::BroadcastDispatcher,
        services::job_queue::{BroadcastQueue, DEFAULT_LEASE},
    },
    domain::models::{BroadcastJob, RunOutcome},
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Pulls ready jobs off the queue and runs each one on its own task.
///
/// Every claim is leased to this worker and renewed while the run is alive.
/// Jobs whose lease ran out belonged to a dead worker and are put back in the queue.
pub struct QueueWorker {
    queue: Arc<dyn BroadcastQueue>,
    dispatcher: Arc<BroadcastDispatcher>,
    poll_interval: Duration,
    lease: Duration,
    worker_id: String,
}

impl QueueWorker {
    pub fn new(
        queue: Arc<dyn BroadcastQueue>,
        dispatcher: Arc<BroadcastDispatcher>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            dispatcher,
            poll_interval,
            lease: DEFAULT_LEASE,
            worker_id: format!("worker-{}", Uuid::new_v4()),
        }
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, shutdown: CancellationToken) {
        info!(worker_id = %self.worker_id, lease_ms = self.lease.as_millis() as u64, "queue worker started");

        let mut running = JoinSet::new();
        let mut next_recovery = Instant::now();
        while !shutdown.is_cancelled() {
            while let Some(joined) = running.try_join_next() {
                if let Err(err) = joined {
                    error!(error = %err, "broadcast task panicked");
                }
            }

            if Instant::now() >= next_recovery {
                self.recover_expired().await;
                next_recovery = Instant::now() + self.lease;
            }

            match self.queue.claim_ready(&self.worker_id, self.lease).await {
                Ok(Some(job)) => {
                    info!(job_id = %job.id, worker_id = %self.worker_id, "claimed broadcast job");
                    running.spawn(Self::run_job(
                        self.queue.clone(),
                        self.dispatcher.clone(),
                        job,
                        self.worker_id.clone(),
                        self.lease,
                        shutdown.clone(),
                    ));
                    continue;
                }
                Ok(None) => {}
                Err(err) => warn!(error = %err, "failed to poll broadcast queue"),
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!(running = running.len(), "queue worker draining");
        while let Some(joined) = running.join_next().await {
            if let Err(err) = joined {
                error!(error = %err, "broadcast task panicked");
            }
        }
    }

    async fn recover_expired(&self) {
        match self.queue.requeue_expired().await {
            Ok(recovered) if !recovered.is_empty() => {
                info!(jobs = ?recovered, "requeued broadcasts with expired leases");
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "failed to requeue expired broadcasts"),
        }
    }

    async fn run_job(
        queue: Arc<dyn BroadcastQueue>,
        dispatcher: Arc<BroadcastDispatcher>,
        job: BroadcastJob,
        worker_id: String,
        lease: Duration,
        shutdown: CancellationToken,
    ) {
        // Cancelled by shutdown, or by losing the lease to another worker.
        let stop = shutdown.child_token();
        let run = dispatcher.run(&job, &stop);
        tokio::pin!(run);

        let mut renew = tokio::time::interval((lease / 3).max(Duration::from_millis(10)));
        renew.tick().await;
        let mut lease_lost = false;
        let outcome = loop {
            tokio::select! {
                outcome = &mut run => break outcome,
                _ = renew.tick(), if !lease_lost => {
                    match queue.renew_lease(&job.id, &worker_id, lease).await {
                        Ok(true) => {}
                        Ok(false) => {
                            warn!(job_id = %job.id, "broadcast lease lost, stopping run");
                            lease_lost = true;
                            stop.cancel();
                        }
                        Err(err) => warn!(job_id = %job.id, error = %err, "failed to renew broadcast lease"),
                    }
                }
            }
        };

        if let RunOutcome::Failed(reason) = &outcome {
            warn!(job_id = %job.id, reason = %reason, "broadcast ended as failed");
        }
        if outcome.is_terminal() {
            if let Err(err) = queue.complete(&job.id).await {
                warn!(job_id = %job.id, error = %err, "failed to release broadcast job");
            }
        } else if !lease_lost {
            // Interrupted by shutdown: hand the job back so any live worker resumes it.
            match queue.release(&job.id, &worker_id).await {
                Ok(true) => info!(job_id = %job.id, "returned interrupted broadcast to the queue"),
                Ok(false) => {}
                Err(err) => warn!(job_id = %job.id, error = %err, "failed to return interrupted broadcast"),
            }
        }
    }
}
