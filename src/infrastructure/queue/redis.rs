use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use redis::{Script, aio::ConnectionManager};
use tracing::warn;

use crate::{
    application::services::job_queue::BroadcastQueue,
    domain::{models::BroadcastJob, value_objects::JobId},
};

pub const DEFAULT_QUEUE_PREFIX: &str = "broadcast:queue";

// KEYS: waiting zset, active zset, payload hash, owner hash. ARGV: now, lease expiry (ms), owner.
const CLAIM_SCRIPT: &str = r#"
local ids = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, 1)
if #ids == 0 then
    return false
end
local id = ids[1]
redis.call('ZREM', KEYS[1], id)
local payload = redis.call('HGET', KEYS[3], id)
if not payload then
    return false
end
redis.call('ZADD', KEYS[2], ARGV[2], id)
redis.call('HSET', KEYS[4], id, ARGV[3])
return {id, payload}
"#;

// KEYS: active zset, owner hash. ARGV: id, owner, lease expiry (ms).
const RENEW_SCRIPT: &str = r#"
if redis.call('HGET', KEYS[2], ARGV[1]) ~= ARGV[2] then
    return 0
end
redis.call('ZADD', KEYS[1], 'XX', ARGV[3], ARGV[1])
return 1
"#;

// KEYS: active zset, owner hash, waiting zset. ARGV: id, owner, now (ms).
const RELEASE_SCRIPT: &str = r#"
if redis.call('HGET', KEYS[2], ARGV[1]) ~= ARGV[2] then
    return 0
end
redis.call('ZREM', KEYS[1], ARGV[1])
redis.call('HDEL', KEYS[2], ARGV[1])
redis.call('ZADD', KEYS[3], ARGV[3], ARGV[1])
return 1
"#;

// KEYS: waiting zset, payload hash.
const REMOVE_WAITING_SCRIPT: &str = r#"
local ids = redis.call('ZRANGE', KEYS[1], 0, -1)
for _, id in ipairs(ids) do
    redis.call('HDEL', KEYS[2], id)
end
redis.call('DEL', KEYS[1])
return ids
"#;

// KEYS: active zset, owner hash, waiting zset. ARGV: now (ms).
const REQUEUE_EXPIRED_SCRIPT: &str = r#"
local ids = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1])
for _, id in ipairs(ids) do
    redis.call('ZREM', KEYS[1], id)
    redis.call('HDEL', KEYS[2], id)
    redis.call('ZADD', KEYS[3], ARGV[1], id)
end
return ids
"#;

/// Delayed job queue: ready-time scored sorted set, payload hash, and an active
/// sorted set scored by lease expiry with the owning worker in a side hash.
/// Every transition runs as a Lua script so a job is leased to one worker at a time.
#[derive(Clone)]
pub struct RedisBroadcastQueue {
    conn: ConnectionManager,
    waiting_key: String,
    active_key: String,
    jobs_key: String,
    owners_key: String,
}

impl RedisBroadcastQueue {
    pub async fn connect(url: &str, prefix: &str) -> anyhow::Result<Arc<Self>> {
        let client = redis::Client::open(url).context("invalid redis url")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("failed to connect to redis")?;
        Ok(Self::from_connection(conn, prefix))
    }

    pub fn from_connection(conn: ConnectionManager, prefix: &str) -> Arc<Self> {
        Arc::new(Self {
            conn,
            waiting_key: format!("{prefix}:waiting"),
            active_key: format!("{prefix}:active"),
            jobs_key: format!("{prefix}:jobs"),
            owners_key: format!("{prefix}:owners"),
        })
    }

    fn now_ms() -> i64 {
        Utc::now().timestamp_millis()
    }

    fn expiry_ms(lease: Duration) -> i64 {
        Self::now_ms() + lease.as_millis() as i64
    }
}

#[async_trait]
impl BroadcastQueue for RedisBroadcastQueue {
    async fn enqueue(&self, job: &BroadcastJob, delay: Option<Duration>) -> anyhow::Result<()> {
        let payload = serde_json::to_string(job)?;
        let delay_ms = delay.map(|d| d.as_millis() as i64).unwrap_or(0);
        let ready_at = Self::now_ms() + delay_ms;

        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .hset(&self.jobs_key, job.id.as_str(), payload)
            .ignore()
            .zadd(&self.waiting_key, job.id.as_str(), ready_at)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn claim_ready(
        &self,
        owner: &str,
        lease: Duration,
    ) -> anyhow::Result<Option<BroadcastJob>> {
        let mut conn = self.conn.clone();
        let claimed: Option<(String, String)> = Script::new(CLAIM_SCRIPT)
            .key(&self.waiting_key)
            .key(&self.active_key)
            .key(&self.jobs_key)
            .key(&self.owners_key)
            .arg(Self::now_ms())
            .arg(Self::expiry_ms(lease))
            .arg(owner)
            .invoke_async(&mut conn)
            .await?;

        let Some((id, payload)) = claimed else {
            return Ok(None);
        };
        match serde_json::from_str::<BroadcastJob>(&payload) {
            Ok(job) => Ok(Some(job)),
            Err(err) => {
                warn!(job_id = %id, error = %err, "dropping unreadable broadcast job payload");
                self.complete(&JobId::from(id)).await?;
                Ok(None)
            }
        }
    }

    async fn renew_lease(
        &self,
        job_id: &JobId,
        owner: &str,
        lease: Duration,
    ) -> anyhow::Result<bool> {
        let mut conn = self.conn.clone();
        let renewed: i64 = Script::new(RENEW_SCRIPT)
            .key(&self.active_key)
            .key(&self.owners_key)
            .arg(job_id.as_str())
            .arg(owner)
            .arg(Self::expiry_ms(lease))
            .invoke_async(&mut conn)
            .await?;
        Ok(renewed == 1)
    }

    async fn release(&self, job_id: &JobId, owner: &str) -> anyhow::Result<bool> {
        let mut conn = self.conn.clone();
        let released: i64 = Script::new(RELEASE_SCRIPT)
            .key(&self.active_key)
            .key(&self.owners_key)
            .key(&self.waiting_key)
            .arg(job_id.as_str())
            .arg(owner)
            .arg(Self::now_ms())
            .invoke_async(&mut conn)
            .await?;
        Ok(released == 1)
    }

    async fn complete(&self, job_id: &JobId) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .zrem(&self.active_key, job_id.as_str())
            .ignore()
            .hdel(&self.owners_key, job_id.as_str())
            .ignore()
            .hdel(&self.jobs_key, job_id.as_str())
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn remove_waiting(&self) -> anyhow::Result<Vec<JobId>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = Script::new(REMOVE_WAITING_SCRIPT)
            .key(&self.waiting_key)
            .key(&self.jobs_key)
            .invoke_async(&mut conn)
            .await?;
        Ok(ids.into_iter().map(JobId::from).collect())
    }

    async fn requeue_expired(&self) -> anyhow::Result<Vec<JobId>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = Script::new(REQUEUE_EXPIRED_SCRIPT)
            .key(&self.active_key)
            .key(&self.owners_key)
            .key(&self.waiting_key)
            .arg(Self::now_ms())
            .invoke_async(&mut conn)
            .await?;
        Ok(ids.into_iter().map(JobId::from).collect())
    }
}
