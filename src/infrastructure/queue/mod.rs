pub mod in_memory;
pub mod redis;
pub mod worker;
