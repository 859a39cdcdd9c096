pub mod broadcast_dispatcher;
pub mod reporter;
