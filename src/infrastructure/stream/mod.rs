pub mod factory;
pub mod mock;
pub mod twitter_v2;

pub use factory::build_stream_source;
pub use mock::MockStreamSource;
pub use twitter_v2::TwitterV2StreamSource;
