use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;

use crate::{
    application::services::transport::WebhookSink, domain::models::ReportSnapshot,
};

pub struct HttpWebhookSink {
    http: Client,
}

impl HttpWebhookSink {
    pub fn new() -> anyhow::Result<Arc<Self>> {
        let http = Client::builder()
            .user_agent("broadcaster/webhook")
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build webhook client")?;
        Ok(Arc::new(Self { http }))
    }
}

#[async_trait]
impl WebhookSink for HttpWebhookSink {
    async fn post(&self, url: &str, snapshot: &ReportSnapshot) -> anyhow::Result<()> {
        self.http
            .post(url)
            .json(snapshot)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
