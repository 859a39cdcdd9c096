use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    application::services::transport::{ChatSink, MessageHandle, MessageTransport},
    domain::models::{Button, MessagePayload},
};

pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Bot API client: broadcast transport and report chat sink in one.
pub struct TelegramClient {
    http: Client,
    base_url: String,
    token: String,
}

impl TelegramClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> anyhow::Result<Arc<Self>> {
        let http = Client::builder()
            .user_agent("broadcaster/telegram")
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build telegram client")?;

        Ok(Arc::new(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }))
    }

    fn build_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> anyhow::Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        // reqwest errors carry the URL, which embeds the bot token.
        let response = self
            .http
            .post(self.build_url(method))
            .json(body)
            .send()
            .await
            .map_err(|err| anyhow::anyhow!("telegram {method} failed: {}", err.without_url()))?;

        let payload: TelegramResponse<T> = response
            .json()
            .await
            .map_err(|err| anyhow::anyhow!("telegram {method} returned malformed body: {}", err.without_url()))?;

        if !payload.ok {
            anyhow::bail!(
                "telegram api returned error: {}",
                payload
                    .description
                    .unwrap_or_else(|| "unknown error".to_string())
            );
        }

        payload
            .result
            .ok_or_else(|| anyhow::anyhow!("telegram {method} returned no result"))
    }

    fn keyboard(buttons: &[Button]) -> Option<InlineKeyboard<'_>> {
        if buttons.is_empty() {
            None
        } else {
            Some(InlineKeyboard {
                inline_keyboard: [buttons],
            })
        }
    }
}

#[async_trait]
impl MessageTransport for TelegramClient {
    async fn send(&self, chat_id: &str, payload: &MessagePayload) -> anyhow::Result<()> {
        let reply_markup = Self::keyboard(&payload.buttons);

        match &payload.image_url {
            Some(photo) => {
                let body = SendPhotoBody {
                    chat_id,
                    photo,
                    caption: &payload.text,
                    parse_mode: MARKDOWN,
                    reply_markup,
                };
                let _: serde_json::Value = self.call("sendPhoto", &body).await?;
            }
            None => {
                let body = SendMessageBody {
                    chat_id,
                    text: &payload.text,
                    parse_mode: Some(MARKDOWN),
                    reply_markup,
                };
                let _: serde_json::Value = self.call("sendMessage", &body).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ChatSink for TelegramClient {
    async fn send_message(&self, chat_id: &str, text: &str) -> anyhow::Result<MessageHandle> {
        let body = SendMessageBody {
            chat_id,
            text,
            parse_mode: None,
            reply_markup: None,
        };
        let message: TelegramMessage = self.call("sendMessage", &body).await?;
        Ok(MessageHandle(message.message_id))
    }

    async fn edit_message(
        &self,
        chat_id: &str,
        handle: MessageHandle,
        text: &str,
    ) -> anyhow::Result<()> {
        let body = EditMessageTextBody {
            chat_id,
            message_id: handle.0,
            text,
        };
        let _: serde_json::Value = self.call("editMessageText", &body).await?;
        Ok(())
    }
}

const MARKDOWN: &str = "Markdown";

#[derive(Debug, Serialize)]
struct InlineKeyboard<'a> {
    inline_keyboard: [&'a [Button]; 1],
}

#[derive(Debug, Serialize)]
struct SendMessageBody<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboard<'a>>,
}

#[derive(Debug, Serialize)]
struct SendPhotoBody<'a> {
    chat_id: &'a str,
    photo: &'a str,
    caption: &'a str,
    parse_mode: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboard<'a>>,
}

#[derive(Debug, Serialize)]
struct EditMessageTextBody<'a> {
    chat_id: &'a str,
    message_id: i64,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    message_id: i64,
}

#[cfg(test)]
mod tests {
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    use super::*;

    fn payload(image_url: Option<&str>, buttons: Vec<Button>) -> MessagePayload {
        MessagePayload {
            text: "*Sale* today".to_string(),
            image_url: image_url.map(str::to_string),
            buttons,
        }
    }

    #[tokio::test]
    async fn test_text_message_carries_markdown_and_button_row() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/botTEST/sendMessage")
                    .json_body(json!({
                        "chat_id": "1001",
                        "text": "*Sale* today",
                        "parse_mode": "Markdown",
                        "reply_markup": {
                            "inline_keyboard": [[
                                { "text": "Open", "url": "https://shop.example" },
                                { "text": "Later", "callback_data": "later" }
                            ]]
                        }
                    }));
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"ok":true,"result":{"message_id":5}}"#);
            })
            .await;

        let client = TelegramClient::new(server.base_url(), "TEST").unwrap();
        let buttons = vec![
            Button {
                text: "Open".to_string(),
                url: Some("https://shop.example".to_string()),
                callback_data: None,
            },
            Button {
                text: "Later".to_string(),
                url: None,
                callback_data: Some("later".to_string()),
            },
        ];
        client.send("1001", &payload(None, buttons)).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_image_message_uses_send_photo_with_caption() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/botTEST/sendPhoto").json_body(json!({
                    "chat_id": "1001",
                    "photo": "https://cdn.example/banner.png",
                    "caption": "*Sale* today",
                    "parse_mode": "Markdown"
                }));
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"ok":true,"result":{"message_id":6}}"#);
            })
            .await;

        let client = TelegramClient::new(server.base_url(), "TEST").unwrap();
        client
            .send("1001", &payload(Some("https://cdn.example/banner.png"), Vec::new()))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_blocked_recipient_is_an_error_with_description() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/botTEST/sendMessage");
                then.status(403)
                    .header("content-type", "application/json")
                    .body(r#"{"ok":false,"error_code":403,"description":"Forbidden: bot was blocked by the user"}"#);
            })
            .await;

        let client = TelegramClient::new(server.base_url(), "TEST").unwrap();
        let err = client.send("1001", &payload(None, Vec::new())).await.unwrap_err();
        assert!(err.to_string().contains("bot was blocked"));
        assert!(!err.to_string().contains("TEST"));
    }

    #[tokio::test]
    async fn test_report_message_is_sent_then_edited() {
        let server = MockServer::start_async().await;
        let sent = server
            .mock_async(|when, then| {
                when.method(POST).path("/botTEST/sendMessage").json_body(json!({
                    "chat_id": "ops",
                    "text": "Broadcast j"
                }));
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"ok":true,"result":{"message_id":42}}"#);
            })
            .await;
        let edited = server
            .mock_async(|when, then| {
                when.method(POST).path("/botTEST/editMessageText").json_body(json!({
                    "chat_id": "ops",
                    "message_id": 42,
                    "text": "Broadcast j, updated"
                }));
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"ok":true,"result":{"message_id":42}}"#);
            })
            .await;

        let client = TelegramClient::new(server.base_url(), "TEST").unwrap();
        let handle = client.send_message("ops", "Broadcast j").await.unwrap();
        assert_eq!(handle, MessageHandle(42));
        client
            .edit_message("ops", handle, "Broadcast j, updated")
            .await
            .unwrap();

        sent.assert_async().await;
        edited.assert_async().await;
    }
}
