use async_trait::async_trait;

use crate::domain::models::{MessagePayload, ReportSnapshot};

/// Delivers one message to one recipient. A failure is per-recipient and never retried.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send(&self, chat_id: &str, payload: &MessagePayload) -> anyhow::Result<()>;
}

/// Identifier of a report message that can later be edited in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHandle(pub i64);

#[async_trait]
pub trait ChatSink: Send + Sync {
    async fn send_message(&self, chat_id: &str, text: &str) -> anyhow::Result<MessageHandle>;
    async fn edit_message(
        &self,
        chat_id: &str,
        handle: MessageHandle,
        text: &str,
    ) -> anyhow::Result<()>;
}

#[async_trait]
pub trait WebhookSink: Send + Sync {
    async fn post(&self, url: &str, snapshot: &ReportSnapshot) -> anyhow::Result<()>;
}
