use std::sync::Arc;

use crate::domain::{
    errors::BroadcastError,
    models::JobRunState,
    repositories::StateStore,
    value_objects::{Cursor, JobId},
};

const MESSAGES_SENT: &str = "messagesSent";
const ERROR_COUNT: &str = "errorCount";
const RESUME_CURSOR: &str = "resumeCursor";
const CANCELLED: &str = "cancelled";
const COMPLETED: &str = "completed";

/// Typed view over the `{jobId}:{field}` keys of a [`StateStore`].
#[derive(Clone)]
pub struct JobStateStore {
    store: Arc<dyn StateStore>,
}

impl JobStateStore {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    pub fn key(job_id: &JobId, field: &str) -> String {
        format!("{job_id}:{field}")
    }

    /// Loads the stored state, or a zeroed one for a job that never ran.
    pub async fn load(&self, job_id: &JobId) -> Result<JobRunState, BroadcastError> {
        let resume_cursor = self
            .get(job_id, RESUME_CURSOR)
            .await?
            .map(Cursor::new)
            .filter(|cursor| !cursor.is_start());

        Ok(JobRunState {
            messages_sent: self.counter(job_id, MESSAGES_SENT).await?,
            error_count: self.counter(job_id, ERROR_COUNT).await?,
            resume_cursor,
            cancelled: self.flag(job_id, CANCELLED).await?,
            completed: self.flag(job_id, COMPLETED).await?,
        })
    }

    /// Persists counters and, when present, the resume cursor in one write.
    pub async fn save_progress(
        &self,
        job_id: &JobId,
        state: &JobRunState,
    ) -> Result<(), BroadcastError> {
        let mut entries = vec![
            (Self::key(job_id, MESSAGES_SENT), state.messages_sent.to_string()),
            (Self::key(job_id, ERROR_COUNT), state.error_count.to_string()),
        ];
        if let Some(cursor) = &state.resume_cursor {
            entries.push((Self::key(job_id, RESUME_CURSOR), cursor.to_string()));
        }
        self.store.set_many(&entries).await?;
        Ok(())
    }

    pub async fn is_cancelled(&self, job_id: &JobId) -> Result<bool, BroadcastError> {
        self.flag(job_id, CANCELLED).await
    }

    pub async fn mark_cancelled(&self, job_id: &JobId) -> Result<(), BroadcastError> {
        self.store.set(&Self::key(job_id, CANCELLED), "1").await?;
        Ok(())
    }

    pub async fn mark_completed(&self, job_id: &JobId) -> Result<(), BroadcastError> {
        self.store.set(&Self::key(job_id, COMPLETED), "1").await?;
        Ok(())
    }

    async fn get(&self, job_id: &JobId, field: &str) -> Result<Option<String>, BroadcastError> {
        Ok(self.store.get(&Self::key(job_id, field)).await?)
    }

    async fn counter(&self, job_id: &JobId, field: &str) -> Result<u64, BroadcastError> {
        match self.get(job_id, field).await? {
            None => Ok(0),
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| BroadcastError::CorruptState {
                key: Self::key(job_id, field),
                value: raw,
            }),
        }
    }

    async fn flag(&self, job_id: &JobId, field: &str) -> Result<bool, BroadcastError> {
        Ok(matches!(
            self.get(job_id, field).await?.as_deref().map(str::trim),
            Some(value) if !value.is_empty() && value != "0" && value != "false"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::in_memory::InMemoryStateStore;

    fn store() -> (Arc<InMemoryStateStore>, JobStateStore) {
        let raw = Arc::new(InMemoryStateStore::new());
        let jobs = JobStateStore::new(raw.clone());
        (raw, jobs)
    }

    #[tokio::test]
    async fn test_missing_state_loads_as_zero() {
        let (_, jobs) = store();
        let state = jobs.load(&JobId::from("fresh")).await.unwrap();
        assert_eq!(state, JobRunState::default());
    }

    #[tokio::test]
    async fn test_progress_uses_namespaced_keys() {
        let (raw, jobs) = store();
        let job_id = JobId::from("job-7");
        let state = JobRunState {
            messages_sent: 12,
            error_count: 3,
            resume_cursor: Some(Cursor::new("450")),
            ..Default::default()
        };
        jobs.save_progress(&job_id, &state).await.unwrap();
        jobs.mark_completed(&job_id).await.unwrap();

        assert_eq!(raw.get("job-7:messagesSent").await.unwrap().as_deref(), Some("12"));
        assert_eq!(raw.get("job-7:errorCount").await.unwrap().as_deref(), Some("3"));
        assert_eq!(raw.get("job-7:resumeCursor").await.unwrap().as_deref(), Some("450"));
        assert_eq!(raw.get("job-7:completed").await.unwrap().as_deref(), Some("1"));

        let loaded = jobs.load(&job_id).await.unwrap();
        assert_eq!(loaded.messages_sent, 12);
        assert_eq!(loaded.error_count, 3);
        assert_eq!(loaded.resume_cursor, Some(Cursor::new("450")));
        assert!(loaded.completed);
        assert!(!loaded.cancelled);
    }

    #[tokio::test]
    async fn test_zero_cursor_means_start() {
        let (raw, jobs) = store();
        raw.set("j:resumeCursor", "0").await.unwrap();
        let state = jobs.load(&JobId::from("j")).await.unwrap();
        assert!(state.resume_cursor.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_counter_is_reported() {
        let (raw, jobs) = store();
        raw.set("j:messagesSent", "lots").await.unwrap();
        let err = jobs.load(&JobId::from("j")).await.unwrap_err();
        assert!(matches!(err, BroadcastError::CorruptState { .. }));
    }

    #[tokio::test]
    async fn test_cancel_flag_round_trip() {
        let (_, jobs) = store();
        let job_id = JobId::from("j");
        assert!(!jobs.is_cancelled(&job_id).await.unwrap());
        jobs.mark_cancelled(&job_id).await.unwrap();
        assert!(jobs.is_cancelled(&job_id).await.unwrap());
    }
}
