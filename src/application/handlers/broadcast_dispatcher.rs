use std::sync::Arc;

use futures::future::join_all;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    application::{
        handlers::reporter::{ReportSinks, ReportTicker, Reporter},
        services::{job_state::JobStateStore, transport::MessageTransport},
    },
    domain::{
        errors::BroadcastError,
        models::{BroadcastJob, JobRunState, RunOutcome},
        repositories::RecipientSource,
        value_objects::Recipient,
    },
};

pub const DEFAULT_PAGE_SIZE: usize = 500;
pub const DEFAULT_BATCH_SIZE: usize = 30;

/// What a failed page fetch means for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchFailurePolicy {
    /// Same as an empty page: mark the job completed.
    #[default]
    TreatAsExhausted,
    /// End the run as failed and leave the job resumable.
    Fail,
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub page_size: usize,
    pub batch_size: usize,
    pub fetch_failure: FetchFailurePolicy,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            fetch_failure: FetchFailurePolicy::default(),
        }
    }
}

/// Drives one broadcast job from its durable cursor to completion or cancellation.
///
/// Assumes a single concurrent run per job id; the queue guarantees that.
pub struct BroadcastDispatcher {
    state: JobStateStore,
    recipients: Arc<dyn RecipientSource>,
    transport: Arc<dyn MessageTransport>,
    sinks: ReportSinks,
    settings: DispatchSettings,
}

impl BroadcastDispatcher {
    pub fn new(
        state: JobStateStore,
        recipients: Arc<dyn RecipientSource>,
        transport: Arc<dyn MessageTransport>,
        sinks: ReportSinks,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            state,
            recipients,
            transport,
            sinks,
            settings,
        }
    }

    pub async fn run(&self, job: &BroadcastJob, shutdown: &CancellationToken) -> RunOutcome {
        // A job that already ended gets no reports. Load errors surface from `drive`.
        if let Ok(state) = self.state.load(&job.id).await {
            if state.completed {
                info!(job_id = %job.id, "broadcast already completed");
                return RunOutcome::Completed;
            }
            if state.cancelled {
                info!(job_id = %job.id, "broadcast cancelled before start");
                return RunOutcome::Cancelled;
            }
        }

        let started = Instant::now();
        info!(job_id = %job.id, estimated_recipients = ?job.estimated_recipient_count, "broadcast started");

        let reporter = Arc::new(Reporter::new(
            job.clone(),
            self.state.clone(),
            self.sinks.clone(),
            started,
        ));
        reporter.emit().await;
        let ticker = ReportTicker::spawn(reporter.clone(), job.report_interval());

        let outcome = match self.drive(job, shutdown).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(job_id = %job.id, error = %err, "broadcast run failed");
                RunOutcome::Failed(err.to_string())
            }
        };

        ticker.stop().await;
        if job.report.is_configured() {
            reporter.emit().await;
        }

        info!(
            job_id = %job.id,
            outcome = ?outcome,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "broadcast finished"
        );
        outcome
    }

    async fn drive(
        &self,
        job: &BroadcastJob,
        shutdown: &CancellationToken,
    ) -> Result<RunOutcome, BroadcastError> {
        let mut state = self.state.load(&job.id).await?;
        if state.completed {
            info!(job_id = %job.id, "broadcast already completed");
            return Ok(RunOutcome::Completed);
        }
        if state.attempts() > 0 {
            info!(
                job_id = %job.id,
                messages_sent = state.messages_sent,
                error_count = state.error_count,
                cursor = ?state.resume_cursor,
                "resuming broadcast"
            );
        }

        if let Some(page) = job.test_page() {
            if let Some(outcome) = self.checkpoint(job, shutdown).await? {
                return Ok(outcome);
            }
            if let Some(outcome) = self.process_page(job, &mut state, &page, shutdown).await? {
                return Ok(outcome);
            }
            self.state.mark_completed(&job.id).await?;
            return Ok(RunOutcome::Completed);
        }

        loop {
            if let Some(outcome) = self.checkpoint(job, shutdown).await? {
                return Ok(outcome);
            }

            let page = match self
                .recipients
                .fetch_page(state.resume_cursor.as_ref(), self.settings.page_size)
                .await
            {
                Ok(page) if page.is_empty() => {
                    info!(job_id = %job.id, "recipient source exhausted");
                    self.state.mark_completed(&job.id).await?;
                    return Ok(RunOutcome::Completed);
                }
                Ok(page) => page,
                Err(err) => match self.settings.fetch_failure {
                    FetchFailurePolicy::TreatAsExhausted => {
                        warn!(job_id = %job.id, error = %err, "recipient fetch failed, treating source as exhausted");
                        self.state.mark_completed(&job.id).await?;
                        return Ok(RunOutcome::Completed);
                    }
                    FetchFailurePolicy::Fail => {
                        warn!(job_id = %job.id, error = %err, "recipient fetch failed");
                        return Ok(RunOutcome::Failed(format!("recipient fetch failed: {err}")));
                    }
                },
            };

            debug!(job_id = %job.id, recipients = page.len(), cursor = ?state.resume_cursor, "fetched recipient page");
            let before = state.resume_cursor.clone();
            if let Some(outcome) = self.process_page(job, &mut state, &page, shutdown).await? {
                return Ok(outcome);
            }
            if state.resume_cursor == before {
                return Err(anyhow::anyhow!(
                    "recipient source returned a page that does not advance the cursor"
                )
                .into());
            }
        }
    }

    /// Sends a page batch by batch. Returns early with an outcome when a check-point stops the run.
    async fn process_page(
        &self,
        job: &BroadcastJob,
        state: &mut JobRunState,
        page: &[Recipient],
        shutdown: &CancellationToken,
    ) -> Result<Option<RunOutcome>, BroadcastError> {
        let delay = job.inter_batch_delay();

        for (index, batch) in page.chunks(self.settings.batch_size.max(1)).enumerate() {
            // The page-level check-point already covered the first batch.
            if index > 0 {
                if let Some(outcome) = self.checkpoint(job, shutdown).await? {
                    return Ok(Some(outcome));
                }
            }

            self.send_batch(job, state, batch).await?;

            if !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.cancelled() => {}
                }
            }
        }

        Ok(None)
    }

    /// Attempts every recipient of the batch concurrently, then persists counters and cursor.
    async fn send_batch(
        &self,
        job: &BroadcastJob,
        state: &mut JobRunState,
        batch: &[Recipient],
    ) -> Result<(), BroadcastError> {
        let attempts = batch
            .iter()
            .map(|recipient| self.transport.send(&recipient.chat_id, &job.payload));
        let results = join_all(attempts).await;

        for (recipient, result) in batch.iter().zip(results) {
            match result {
                Ok(()) => state.messages_sent += 1,
                Err(err) => {
                    state.error_count += 1;
                    warn!(job_id = %job.id, chat_id = %recipient.chat_id, error = %err, "delivery failed");
                }
            }
        }

        if let Some(cursor) = batch.last().and_then(|recipient| recipient.cursor.clone()) {
            state.resume_cursor = Some(cursor);
        }

        self.state.save_progress(&job.id, state).await
    }

    async fn checkpoint(
        &self,
        job: &BroadcastJob,
        shutdown: &CancellationToken,
    ) -> Result<Option<RunOutcome>, BroadcastError> {
        if shutdown.is_cancelled() {
            info!(job_id = %job.id, "shutdown requested, pausing broadcast");
            return Ok(Some(RunOutcome::Interrupted));
        }
        if self.state.is_cancelled(&job.id).await? {
            info!(job_id = %job.id, "broadcast cancelled");
            return Ok(Some(RunOutcome::Cancelled));
        }
        Ok(None)
    }
}
