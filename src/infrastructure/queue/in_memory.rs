use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::{sync::Mutex, time::Instant};

use crate::{
    application::services::job_queue::BroadcastQueue,
    domain::{models::BroadcastJob, value_objects::JobId},
};

struct Lease {
    job: BroadcastJob,
    owner: String,
    expires_at: Instant,
}

#[derive(Default)]
struct QueueState {
    seq: u64,
    /// Ordered by ready time, then insertion order.
    waiting: BTreeMap<(Instant, u64), BroadcastJob>,
    active: HashMap<JobId, Lease>,
}

impl QueueState {
    fn push_ready(&mut self, job: BroadcastJob, ready_at: Instant) {
        self.seq += 1;
        let seq = self.seq;
        self.waiting.insert((ready_at, seq), job);
    }
}

#[derive(Default)]
pub struct InMemoryBroadcastQueue {
    state: Arc<Mutex<QueueState>>,
}

impl InMemoryBroadcastQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BroadcastQueue for InMemoryBroadcastQueue {
    async fn enqueue(&self, job: &BroadcastJob, delay: Option<Duration>) -> anyhow::Result<()> {
        let ready_at = Instant::now() + delay.unwrap_or_default();
        self.state.lock().await.push_ready(job.clone(), ready_at);
        Ok(())
    }

    async fn claim_ready(
        &self,
        owner: &str,
        lease: Duration,
    ) -> anyhow::Result<Option<BroadcastJob>> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let ready = match state.waiting.first_key_value() {
            Some((&(ready_at, seq), _)) if ready_at <= now => (ready_at, seq),
            _ => return Ok(None),
        };
        let Some(job) = state.waiting.remove(&ready) else {
            return Ok(None);
        };
        state.active.insert(
            job.id.clone(),
            Lease {
                job: job.clone(),
                owner: owner.to_string(),
                expires_at: now + lease,
            },
        );
        Ok(Some(job))
    }

    async fn renew_lease(
        &self,
        job_id: &JobId,
        owner: &str,
        lease: Duration,
    ) -> anyhow::Result<bool> {
        let mut state = self.state.lock().await;
        match state.active.get_mut(job_id) {
            Some(held) if held.owner == owner => {
                held.expires_at = Instant::now() + lease;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, job_id: &JobId, owner: &str) -> anyhow::Result<bool> {
        let mut state = self.state.lock().await;
        if !state
            .active
            .get(job_id)
            .is_some_and(|held| held.owner == owner)
        {
            return Ok(false);
        }
        let Some(held) = state.active.remove(job_id) else {
            return Ok(false);
        };
        state.push_ready(held.job, Instant::now());
        Ok(true)
    }

    async fn complete(&self, job_id: &JobId) -> anyhow::Result<()> {
        self.state.lock().await.active.remove(job_id);
        Ok(())
    }

    async fn remove_waiting(&self) -> anyhow::Result<Vec<JobId>> {
        let mut state = self.state.lock().await;
        let removed = std::mem::take(&mut state.waiting);
        Ok(removed.into_values().map(|job| job.id).collect())
    }

    async fn requeue_expired(&self) -> anyhow::Result<Vec<JobId>> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let expired: Vec<JobId> = state
            .active
            .iter()
            .filter(|(_, held)| held.expires_at <= now)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            if let Some(held) = state.active.remove(id) {
                state.push_ready(held.job, now);
            }
        }
        Ok(expired)
    }
}
