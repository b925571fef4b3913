pub mod agent;
pub mod api;
pub mod config;
pub mod error;
pub mod generator;
pub mod media;
pub mod outbox;
pub mod speech;
pub mod state;
