use poem_openapi::Object;

use crate::presentation::models::ButtonDto;

#[derive(Object, Debug)]
pub struct StartBroadcastRequestDto {
    /// Required. Optional here so a missing value gets the intake error message.
    pub message_text: Option<String>,
    pub image_url: Option<String>,
    pub buttons: Option<Vec<ButtonDto>>,
    pub report_chat_id: Option<String>,
    pub webhook_url: Option<String>,
    pub report_interval_seconds: Option<u64>,
    /// `DD.MM.YYYY HH:mm` in the service's source timezone.
    pub scheduled_at: Option<String>,
    pub test_recipients: Option<Vec<String>>,
    pub inter_batch_delay_seconds: Option<f64>,
}

#[derive(Object, Debug)]
pub struct CancelBroadcastRequestDto {
    /// A job id, or `all` for every job not started yet.
    pub job_id: Option<String>,
}
