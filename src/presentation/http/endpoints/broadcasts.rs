use std::sync::Arc;

use poem::Result as PoemResult;
use poem_openapi::{OpenApi, payload::Json};

use crate::{
    application::usecases::cancel_broadcast::CancelTarget,
    presentation::http::{
        endpoints::root::{ApiState, EndpointsTags},
        mappers::{map_error, map_start_request, map_start_response},
        requests::{CancelBroadcastRequestDto, StartBroadcastRequestDto},
        responses::{CancelBroadcastResponseDto, StartBroadcastResponseDto},
        security::ApiKeyAuth,
    },
};

pub struct BroadcastEndpoints {
    state: Arc<ApiState>,
}

impl BroadcastEndpoints {
    pub fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }
}

#[OpenApi]
impl BroadcastEndpoints {
    #[oai(
        path = "/start-broadcast",
        method = "post",
        tag = EndpointsTags::Broadcasts
    )]
    pub async fn start_broadcast(
        &self,
        auth: ApiKeyAuth,
        request: Json<StartBroadcastRequestDto>,
    ) -> PoemResult<Json<StartBroadcastResponseDto>> {
        auth.verify(&self.state.api_key)?;

        let response = self
            .state
            .start_broadcast_usecase
            .execute(map_start_request(request.0))
            .await
            .map_err(map_error)?;

        Ok(Json(map_start_response(response)))
    }

    #[oai(
        path = "/cancel-broadcast",
        method = "post",
        tag = EndpointsTags::Broadcasts
    )]
    pub async fn cancel_broadcast(
        &self,
        auth: ApiKeyAuth,
        request: Json<CancelBroadcastRequestDto>,
    ) -> PoemResult<Json<CancelBroadcastResponseDto>> {
        auth.verify(&self.state.api_key)?;

        let target = CancelTarget::parse(request.0.job_id.as_deref().unwrap_or_default())
            .map_err(map_error)?;
        let message = match &target {
            CancelTarget::All => "All queued broadcasts cancelled".to_string(),
            CancelTarget::Job(job_id) => format!("Broadcast {job_id} cancelled"),
        };

        let cancelled = self
            .state
            .cancel_broadcast_usecase
            .execute(target)
            .await
            .map_err(map_error)?;

        Ok(Json(CancelBroadcastResponseDto {
            message,
            cancelled_jobs: cancelled.iter().map(ToString::to_string).collect(),
        }))
    }
}
