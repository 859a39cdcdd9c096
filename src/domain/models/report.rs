use std::time::Duration;

use serde::Serialize;

use crate::domain::value_objects::JobId;

/// Point-in-time view of a job's progress. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSnapshot {
    pub job_id: JobId,
    pub messages_sent: u64,
    pub error_count: u64,
    pub elapsed_seconds: u64,
    pub elapsed: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_friendly: Option<String>,
    pub report_text: String,
    #[serde(skip)]
    pub eta: Option<Duration>,
}
