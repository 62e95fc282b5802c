pub mod start_stream;

pub use start_stream::{StartStreamUseCase, StreamTaskHandle};
