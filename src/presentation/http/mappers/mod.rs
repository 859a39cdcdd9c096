use poem::http::StatusCode;

use crate::{
    application::usecases::start_broadcast::{StartBroadcastRequest, StartBroadcastResponse},
    domain::errors::BroadcastError,
    presentation::http::{
        requests::StartBroadcastRequestDto, responses::StartBroadcastResponseDto,
    },
};

const IMMEDIATE: &str = "immediate";

pub fn map_start_request(dto: StartBroadcastRequestDto) -> StartBroadcastRequest {
    StartBroadcastRequest {
        message_text: dto.message_text,
        image_url: dto.image_url,
        buttons: dto
            .buttons
            .map(|buttons| buttons.into_iter().map(Into::into).collect()),
        report_chat_id: dto.report_chat_id,
        webhook_url: dto.webhook_url,
        report_interval_seconds: dto.report_interval_seconds,
        scheduled_at: dto.scheduled_at,
        test_recipients: dto.test_recipients,
        inter_batch_delay_seconds: dto.inter_batch_delay_seconds,
    }
}

pub fn map_start_response(response: StartBroadcastResponse) -> StartBroadcastResponseDto {
    StartBroadcastResponseDto {
        message: "Broadcast queued".to_string(),
        job_id: response.job_id.to_string(),
        scheduled_at: response
            .scheduled_at
            .unwrap_or_else(|| IMMEDIATE.to_string()),
    }
}

pub fn map_error(err: BroadcastError) -> poem::Error {
    let status = match &err {
        BroadcastError::Validation(_)
        | BroadcastError::ScheduledInPast(_)
        | BroadcastError::InvalidSchedule { .. } => StatusCode::BAD_REQUEST,
        BroadcastError::Forbidden(_) => StatusCode::FORBIDDEN,
        BroadcastError::CorruptState { .. } | BroadcastError::Other(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    poem::Error::from_string(err.to_string(), status)
}
