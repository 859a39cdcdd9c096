pub mod broadcasts;
pub mod health;
pub mod root;
