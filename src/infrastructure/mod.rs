pub mod messaging;
pub mod queue;
pub mod recipients;
pub mod repositories;
