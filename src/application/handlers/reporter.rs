use std::sync::Arc;
use std::time::Duration;

use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tokio_stream::{StreamExt, wrappers::IntervalStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    application::services::{
        job_state::JobStateStore,
        transport::{ChatSink, MessageHandle, WebhookSink},
    },
    domain::{
        models::{BroadcastJob, JobRunState, ReportSnapshot},
        value_objects::JobId,
    },
};

#[derive(Clone, Default)]
pub struct ReportSinks {
    pub chat: Option<Arc<dyn ChatSink>>,
    pub webhook: Option<Arc<dyn WebhookSink>>,
}

/// Emits progress snapshots of one job run to its configured destinations.
pub struct Reporter {
    job: BroadcastJob,
    state: JobStateStore,
    sinks: ReportSinks,
    started: Instant,
    chat_message: Mutex<Option<MessageHandle>>,
}

impl Reporter {
    pub fn new(job: BroadcastJob, state: JobStateStore, sinks: ReportSinks, started: Instant) -> Self {
        Self {
            job,
            state,
            sinks,
            started,
            chat_message: Mutex::new(None),
        }
    }

    /// Reads the durable counters and pushes a snapshot to every sink.
    /// Never fails: sink and store errors are logged.
    pub async fn emit(&self) {
        if !self.job.report.is_configured() {
            return;
        }

        let state = match self.state.load(&self.job.id).await {
            Ok(state) => state,
            Err(err) => {
                warn!(job_id = %self.job.id, error = %err, "failed to load job state for report");
                return;
            }
        };

        let snapshot = build_snapshot(
            &self.job.id,
            &state,
            self.job.estimated_recipient_count,
            self.started.elapsed(),
        );
        debug!(
            job_id = %self.job.id,
            messages_sent = snapshot.messages_sent,
            error_count = snapshot.error_count,
            "emitting progress report"
        );

        if let Some(url) = &self.job.report.webhook_url {
            if let Some(webhook) = &self.sinks.webhook {
                if let Err(err) = webhook.post(url, &snapshot).await {
                    warn!(job_id = %self.job.id, error = %err, "failed to post report to webhook");
                }
            }
        }

        if let Some(chat_id) = &self.job.report.chat_id {
            if let Some(chat) = &self.sinks.chat {
                self.publish_to_chat(chat.as_ref(), chat_id, &snapshot.report_text)
                    .await;
            }
        }
    }

    async fn publish_to_chat(&self, chat: &dyn ChatSink, chat_id: &str, text: &str) {
        let mut current = self.chat_message.lock().await;

        if let Some(handle) = *current {
            match chat.edit_message(chat_id, handle, text).await {
                Ok(()) => return,
                Err(err) => {
                    debug!(job_id = %self.job.id, error = %err, "report edit failed, sending a new message");
                }
            }
        }

        match chat.send_message(chat_id, text).await {
            Ok(handle) => *current = Some(handle),
            Err(err) => {
                warn!(job_id = %self.job.id, error = %err, "failed to send report to chat");
            }
        }
    }
}

/// Periodic report task of one run. Stopped explicitly or, failing that, on drop.
pub struct ReportTicker {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ReportTicker {
    /// First tick fires one `period` from now; the immediate report is the caller's.
    pub fn spawn(reporter: Arc<Reporter>, period: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut ticks = IntervalStream::new(interval);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    tick = ticks.next() => {
                        if tick.is_none() {
                            break;
                        }
                        reporter.emit().await;
                    }
                }
            }
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Waits for an in-progress emission so it cannot race the final report.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ReportTicker {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

pub fn build_snapshot(
    job_id: &JobId,
    state: &JobRunState,
    estimated_recipient_count: Option<u64>,
    elapsed: Duration,
) -> ReportSnapshot {
    let (progress_percent, eta) = match estimated_recipient_count {
        Some(total) if total > 0 && state.messages_sent > 0 => {
            let sent = state.messages_sent as f64;
            let remaining = total.saturating_sub(state.messages_sent) as f64;
            let progress = sent * 100.0 / total as f64;
            let eta_secs = elapsed.as_secs_f64() * remaining / sent;
            (
                Some(progress),
                Duration::try_from_secs_f64(eta_secs).ok(),
            )
        }
        _ => (None, None),
    };

    let elapsed_friendly = humanize(elapsed);
    let eta_friendly = eta.map(humanize);

    let mut lines = vec![
        format!("Broadcast {job_id}"),
        format!("- Messages sent: {}", state.messages_sent),
        format!("- Errors: {}", state.error_count),
        format!("- Elapsed: {elapsed_friendly}"),
    ];
    if let Some(progress) = progress_percent {
        lines.push(format!("- Progress: {progress:.2}%"));
    }
    if let Some(eta) = &eta_friendly {
        lines.push(format!("- Estimated time remaining: {eta}"));
    }

    ReportSnapshot {
        job_id: job_id.clone(),
        messages_sent: state.messages_sent,
        error_count: state.error_count,
        elapsed_seconds: elapsed.as_secs(),
        elapsed: elapsed_friendly,
        progress_percent,
        eta_seconds: eta.map(|eta| eta.as_secs_f64().round() as u64),
        eta_friendly,
        report_text: lines.join("\n"),
        eta,
    }
}

/// Coarse, human-friendly rendering of a duration ("a few seconds", "3 minutes", "a day").
pub fn humanize(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    let seconds = secs.round();
    let minutes = (secs / 60.0).round();
    let hours = (secs / 3_600.0).round();
    let days_exact = secs / 86_400.0;
    let days = days_exact.round();
    let months = (days_exact * 4_800.0 / 146_097.0).round();
    let years = (days_exact * 400.0 / 146_097.0).round();

    let plural = |count: f64, unit: &str| format!("{} {unit}", count as u64);

    if seconds < 45.0 {
        "a few seconds".to_string()
    } else if minutes <= 1.0 {
        "a minute".to_string()
    } else if minutes < 45.0 {
        plural(minutes, "minutes")
    } else if hours <= 1.0 {
        "an hour".to_string()
    } else if hours < 22.0 {
        plural(hours, "hours")
    } else if days <= 1.0 {
        "a day".to_string()
    } else if days < 26.0 {
        plural(days, "days")
    } else if months <= 1.0 {
        "a month".to_string()
    } else if months < 11.0 {
        plural(months, "months")
    } else if years <= 1.0 {
        "a year".to_string()
    } else {
        plural(years, "years")
    }
}
