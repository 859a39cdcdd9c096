use async_trait::async_trait;

use crate::domain::value_objects::{Cursor, Recipient};

/// Durable string key-value storage for job state.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;

    /// Writes several keys. Backends that can do this atomically should override it.
    async fn set_many(&self, entries: &[(String, String)]) -> anyhow::Result<()> {
        for (key, value) in entries {
            self.set(key, value).await?;
        }
        Ok(())
    }
}

/// Cursor-paginated enumeration of recipients, ordered by cursor.
#[async_trait]
pub trait RecipientSource: Send + Sync {
    /// Returns up to `limit` recipients strictly after `cursor` (`None` = from the start).
    async fn fetch_page(
        &self,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> anyhow::Result<Vec<Recipient>>;
}

#[async_trait]
pub trait CountEstimator: Send + Sync {
    /// `Ok(None)` when the total is unknown.
    async fn estimate_count(&self) -> anyhow::Result<Option<u64>>;
}
