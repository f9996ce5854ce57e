pub mod app;
pub mod content;
pub mod gameplay;
pub mod persistence;
pub mod tuning;
