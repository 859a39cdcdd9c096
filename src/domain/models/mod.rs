pub mod job;
pub mod report;
pub mod run_state;

pub use job::{BroadcastJob, Button, MessagePayload, ReportTargets};
pub use report::ReportSnapshot;
pub use run_state::{JobRunState, RunOutcome};
