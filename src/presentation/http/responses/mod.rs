use poem_openapi::Object;

#[derive(Object)]
pub struct StartBroadcastResponseDto {
    pub message: String,
    pub job_id: String,
    /// Echo of the submitted time, or `immediate`.
    pub scheduled_at: String,
}

#[derive(Object)]
pub struct CancelBroadcastResponseDto {
    pub message: String,
    pub cancelled_jobs: Vec<String>,
}
