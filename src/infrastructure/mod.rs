pub mod config;
pub mod kafka;
pub mod retry;
pub mod stream;
pub mod telemetry;
