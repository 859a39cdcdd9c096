use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{info, warn};

use crate::{
    application::services::{job_queue::BroadcastQueue, schedule::resolve_schedule},
    domain::{
        errors::BroadcastError,
        models::{BroadcastJob, Button, MessagePayload, ReportTargets},
        repositories::CountEstimator,
        value_objects::JobId,
    },
};

pub const DEFAULT_REPORT_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_INTER_BATCH_DELAY_SECS: f64 = 1.0;

pub struct StartBroadcastConfig {
    pub source_timezone: Tz,
}

pub struct StartBroadcastUseCase {
    queue: Arc<dyn BroadcastQueue>,
    estimator: Arc<dyn CountEstimator>,
    config: StartBroadcastConfig,
}

#[derive(Debug, Clone, Default)]
pub struct StartBroadcastRequest {
    pub message_text: Option<String>,
    pub image_url: Option<String>,
    pub buttons: Option<Vec<Button>>,
    pub report_chat_id: Option<String>,
    pub webhook_url: Option<String>,
    pub report_interval_seconds: Option<u64>,
    pub scheduled_at: Option<String>,
    pub test_recipients: Option<Vec<String>>,
    pub inter_batch_delay_seconds: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartBroadcastResponse {
    pub job_id: JobId,
    /// The submitted schedule string, or `None` for an immediate run.
    pub scheduled_at: Option<String>,
}

impl StartBroadcastUseCase {
    pub fn new(
        queue: Arc<dyn BroadcastQueue>,
        estimator: Arc<dyn CountEstimator>,
        config: StartBroadcastConfig,
    ) -> Self {
        Self {
            queue,
            estimator,
            config,
        }
    }

    pub async fn execute(
        &self,
        request: StartBroadcastRequest,
    ) -> Result<StartBroadcastResponse, BroadcastError> {
        self.execute_at(request, Utc::now()).await
    }

    /// Validates, resolves defaults and enqueues exactly one job. Nothing is written on error.
    pub async fn execute_at(
        &self,
        request: StartBroadcastRequest,
        now: DateTime<Utc>,
    ) -> Result<StartBroadcastResponse, BroadcastError> {
        let text = request
            .message_text
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| BroadcastError::Validation("messageText is required".to_string()))?;

        let inter_batch_delay_secs = request
            .inter_batch_delay_seconds
            .unwrap_or(DEFAULT_INTER_BATCH_DELAY_SECS);
        if !inter_batch_delay_secs.is_finite() || inter_batch_delay_secs < 0.0 {
            return Err(BroadcastError::Validation(
                "interBatchDelaySeconds must be a non-negative number".to_string(),
            ));
        }

        let schedule = request
            .scheduled_at
            .as_deref()
            .map(|raw| resolve_schedule(raw, self.config.source_timezone, now))
            .transpose()?;

        let estimated_recipient_count = self.estimate().await;

        let job = BroadcastJob {
            id: JobId::generate(),
            payload: MessagePayload {
                text,
                image_url: request.image_url,
                buttons: request.buttons.unwrap_or_default(),
            },
            estimated_recipient_count,
            report: ReportTargets {
                chat_id: request.report_chat_id,
                webhook_url: request.webhook_url,
            },
            report_interval_secs: request
                .report_interval_seconds
                .unwrap_or(DEFAULT_REPORT_INTERVAL_SECS)
                .max(1),
            inter_batch_delay_secs,
            test_recipients: request.test_recipients.filter(|list| !list.is_empty()),
            scheduled_at: schedule.as_ref().map(|s| s.run_at),
            created_at: now,
        };

        self.queue
            .enqueue(&job, schedule.as_ref().map(|s| s.delay))
            .await?;

        info!(
            job_id = %job.id,
            run_at = ?job.scheduled_at,
            estimated_recipients = ?job.estimated_recipient_count,
            test_run = job.test_recipients.is_some(),
            "broadcast queued"
        );

        Ok(StartBroadcastResponse {
            job_id: job.id,
            scheduled_at: request.scheduled_at,
        })
    }

    async fn estimate(&self) -> Option<u64> {
        match self.estimator.estimate_count().await {
            Ok(Some(count)) => Some(count),
            Ok(None) => {
                warn!("recipient count unavailable, progress and ETA disabled");
                None
            }
            Err(err) => {
                warn!(error = %err, "recipient count query failed, progress and ETA disabled");
                None
            }
        }
    }
}
