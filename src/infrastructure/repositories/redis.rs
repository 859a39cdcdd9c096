use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};

use crate::domain::repositories::StateStore;

#[derive(Clone)]
pub struct RedisStateStore {
    conn: ConnectionManager,
}

impl RedisStateStore {
    pub async fn connect(url: &str) -> anyhow::Result<Arc<Self>> {
        let client = redis::Client::open(url).context("invalid redis url")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("failed to connect to redis")?;
        Ok(Arc::new(Self { conn }))
    }

    pub fn from_connection(conn: ConnectionManager) -> Arc<Self> {
        Arc::new(Self { conn })
    }
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn set_many(&self, entries: &[(String, String)]) -> anyhow::Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = conn.mset(entries).await?;
        Ok(())
    }
}
