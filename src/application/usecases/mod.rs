pub mod cancel_broadcast;
pub mod start_broadcast;
