pub mod job_queue;
pub mod job_state;
pub mod schedule;
pub mod transport;
