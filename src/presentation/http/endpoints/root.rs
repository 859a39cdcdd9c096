use std::sync::Arc;

use poem_openapi::{OpenApiService, Tags};

use crate::{
    application::usecases::{
        cancel_broadcast::CancelBroadcastUseCase, start_broadcast::StartBroadcastUseCase,
    },
    presentation::http::endpoints::{broadcasts::BroadcastEndpoints, health::HealthEndpoints},
};

pub struct ApiState {
    pub start_broadcast_usecase: Arc<StartBroadcastUseCase>,
    pub cancel_broadcast_usecase: Arc<CancelBroadcastUseCase>,
    pub api_key: String,
}

/// Enum of API sections (tags)
#[derive(Tags)]
pub enum EndpointsTags {
    Health,
    Broadcasts,
}

pub type Endpoints = (HealthEndpoints, BroadcastEndpoints);

pub fn api_service(state: Arc<ApiState>, server_url: &str) -> OpenApiService<Endpoints, ()> {
    OpenApiService::new(
        (HealthEndpoints, BroadcastEndpoints::new(state)),
        "Broadcast API",
        env!("CARGO_PKG_VERSION"),
    )
    .server(format!("{server_url}/api"))
}
