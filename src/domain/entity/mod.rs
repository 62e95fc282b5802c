pub mod source_kind;
pub mod status_event;
pub mod stream_rule;

pub use source_kind::SourceKind;
pub use status_event::StatusEvent;
pub use stream_rule::StreamRule;
