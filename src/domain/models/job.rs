use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{JobId, Recipient};

/// One inline-keyboard button. All buttons of a job render as a single row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
}

/// What gets delivered to every recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    /// Message body, or the caption when `image_url` is set.
    pub text: String,
    pub image_url: Option<String>,
    #[serde(default)]
    pub buttons: Vec<Button>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportTargets {
    pub chat_id: Option<String>,
    pub webhook_url: Option<String>,
}

impl ReportTargets {
    pub fn is_configured(&self) -> bool {
        self.chat_id.is_some() || self.webhook_url.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastJob {
    pub id: JobId,
    pub payload: MessagePayload,
    /// Snapshot taken at intake; only feeds progress and ETA.
    pub estimated_recipient_count: Option<u64>,
    pub report: ReportTargets,
    pub report_interval_secs: u64,
    pub inter_batch_delay_secs: f64,
    /// Replaces paginated enumeration with a single one-shot page.
    pub test_recipients: Option<Vec<String>>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl BroadcastJob {
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs.max(1))
    }

    pub fn inter_batch_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.inter_batch_delay_secs).unwrap_or_default()
    }

    pub fn test_page(&self) -> Option<Vec<Recipient>> {
        self.test_recipients
            .as_ref()
            .filter(|list| !list.is_empty())
            .map(|list| list.iter().map(Recipient::fixed).collect())
    }
}
