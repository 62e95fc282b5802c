pub mod entity;
pub mod error;
pub mod service;

pub use error::IngestionError;
