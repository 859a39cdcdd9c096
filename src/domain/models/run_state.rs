use serde::{Deserialize, Serialize};

use crate::domain::value_objects::Cursor;

/// Durable progress of one job. Written only by the dispatch engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRunState {
    pub messages_sent: u64,
    pub error_count: u64,
    pub resume_cursor: Option<Cursor>,
    pub cancelled: bool,
    pub completed: bool,
}

impl JobRunState {
    pub fn attempts(&self) -> u64 {
        self.messages_sent + self.error_count
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Cancelled,
    /// The process is shutting down; the job stays resumable.
    Interrupted,
    Failed(String),
}

impl RunOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunOutcome::Interrupted)
    }
}
