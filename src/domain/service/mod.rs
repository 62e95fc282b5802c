pub mod status_listener;
pub mod stream_source;

pub use status_listener::StatusListener;
pub use stream_source::StreamSource;

#[cfg(test)]
pub use status_listener::MockStatusListener;
