use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::domain::{
    repositories::{CountEstimator, RecipientSource},
    value_objects::{Cursor, Recipient},
};

/// Recipient store exposed over HTTP: `POST /broadcast/get-users` and
/// `GET /broadcast/get-total-user-count`, both guarded by `x-api-key`.
pub struct HttpRecipientApi {
    http: Client,
    base_url: String,
    api_key: String,
}

impl HttpRecipientApi {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> anyhow::Result<Arc<Self>> {
        let http = Client::builder()
            .user_agent("broadcaster/recipients")
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build recipients client")?;

        Ok(Arc::new(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }))
    }
}

#[async_trait]
impl RecipientSource for HttpRecipientApi {
    async fn fetch_page(
        &self,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> anyhow::Result<Vec<Recipient>> {
        let last_id = match cursor {
            None => UserId::Number(0),
            Some(cursor) => UserId::parse(cursor.as_str()),
        };

        let response = self
            .http
            .post(format!("{}/broadcast/get-users", self.base_url))
            .header("x-api-key", &self.api_key)
            .json(&GetUsersRequest { last_id, limit })
            .send()
            .await?
            .error_for_status()?;

        let payload: GetUsersResponse = response.json().await?;
        if payload.status != "success" {
            anyhow::bail!("recipient api returned status '{}'", payload.status);
        }

        Ok(payload
            .users
            .into_iter()
            .map(|user| {
                let id = user.user_id.to_string();
                Recipient::paged(id.clone(), Cursor::new(id))
            })
            .collect())
    }
}

#[async_trait]
impl CountEstimator for HttpRecipientApi {
    async fn estimate_count(&self) -> anyhow::Result<Option<u64>> {
        let response = self
            .http
            .get(format!("{}/broadcast/get-total-user-count", self.base_url))
            .header("x-api-key", &self.api_key)
            .send()
            .await?
            .error_for_status()?;

        let payload: UserCountResponse = response.json().await?;
        if payload.status != "success" {
            return Ok(None);
        }
        Ok(payload.total_user_count)
    }
}

/// Telegram user ids arrive as numbers, but strings are tolerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum UserId {
    Number(i64),
    Text(String),
}

impl UserId {
    fn parse(raw: &str) -> Self {
        raw.parse::<i64>()
            .map(UserId::Number)
            .unwrap_or_else(|_| UserId::Text(raw.to_string()))
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserId::Number(id) => write!(f, "{id}"),
            UserId::Text(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GetUsersRequest {
    last_id: UserId,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct GetUsersResponse {
    status: String,
    #[serde(default)]
    users: Vec<UserRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserRecord {
    user_id: UserId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserCountResponse {
    status: String,
    total_user_count: Option<u64>,
}

#[cfg(test)]
mod tests {
    use httpmock::{
        Method::{GET, POST},
        MockServer,
    };
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_fetch_page_sends_cursor_and_maps_users() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/broadcast/get-users")
                    .header("x-api-key", "secret")
                    .json_body(json!({ "lastId": 1500, "limit": 500 }));
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"status":"success","users":[{"userId":1501,"firstName":"Ann"},{"userId":1502}]}"#);
            })
            .await;

        let api = HttpRecipientApi::new(server.base_url(), "secret").unwrap();
        let page = api.fetch_page(Some(&Cursor::new("1500")), 500).await.unwrap();

        mock.assert_async().await;
        assert_eq!(
            page,
            vec![
                Recipient::paged("1501", Cursor::new("1501")),
                Recipient::paged("1502", Cursor::new("1502")),
            ]
        );
    }

    #[tokio::test]
    async fn test_first_page_starts_from_zero() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/broadcast/get-users")
                    .json_body(json!({ "lastId": 0, "limit": 30 }));
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"status":"success","users":[]}"#);
            })
            .await;

        let api = HttpRecipientApi::new(server.base_url(), "secret").unwrap();
        assert!(api.fetch_page(None, 30).await.unwrap().is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_a_fetch_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/broadcast/get-users");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"status":"error","message":"db down"}"#);
            })
            .await;

        let api = HttpRecipientApi::new(server.base_url(), "secret").unwrap();
        assert!(api.fetch_page(None, 500).await.is_err());
    }

    #[tokio::test]
    async fn test_estimate_count() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/broadcast/get-total-user-count")
                    .header("x-api-key", "secret");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"status":"success","totalUserCount":1234}"#);
            })
            .await;

        let api = HttpRecipientApi::new(server.base_url(), "secret").unwrap();
        assert_eq!(api.estimate_count().await.unwrap(), Some(1234));
    }

    #[tokio::test]
    async fn test_estimate_count_unknown_on_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/broadcast/get-total-user-count");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"status":"error"}"#);
            })
            .await;

        let api = HttpRecipientApi::new(server.base_url(), "secret").unwrap();
        assert_eq!(api.estimate_count().await.unwrap(), None);
    }
}
