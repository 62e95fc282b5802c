use std::time::Duration;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// IngestionError はストリーム取り込みから Kafka 発行までのエラーを表す。
///
/// Configuration / StreamConnection / InterruptedWait / ShutdownTimeout / TaskAborted は
/// ソースを停止させる致命的エラー、Publish はメッセージ単位で回復するエラー。
#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("stream connection error: {message}")]
    StreamConnection {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("interrupted while waiting for the next status: {0}")]
    InterruptedWait(String),

    #[error("failed to publish message with key {key}: {message}")]
    Publish { key: String, message: String },

    #[error("stream source did not stop within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("stream task aborted: {0}")]
    TaskAborted(String),
}

impl IngestionError {
    /// 原因エラーを持つ StreamConnection エラーを作成する。
    pub fn stream_connection<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::StreamConnection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// 原因エラーを持たない StreamConnection エラーを作成する。
    pub fn stream_closed(message: impl Into<String>) -> Self {
        Self::StreamConnection {
            message: message.into(),
            source: None,
        }
    }

    /// Publish エラーを作成する。
    pub fn publish(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Publish {
            key: key.into(),
            message: message.into(),
        }
    }

    /// ソースを停止させる致命的エラーかどうかを返す。
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Publish { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_configuration_error_display() {
        let err = IngestionError::Configuration("bearer token is missing".to_string());
        assert_eq!(err.to_string(), "configuration error: bearer token is missing");
        assert!(err.is_fatal());
    }

    #[test]
    fn test_stream_connection_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = IngestionError::stream_connection("failed to read stream", io);
        assert!(err.to_string().contains("failed to read stream"));
        assert!(err.source().unwrap().to_string().contains("reset by peer"));
    }

    #[test]
    fn test_stream_closed_has_no_source() {
        let err = IngestionError::stream_closed("stream closed by provider");
        assert!(err.source().is_none());
        assert!(err.is_fatal());
    }

    #[test]
    fn test_publish_error_is_not_fatal() {
        let err = IngestionError::publish("12345", "Message production error: QueueFull");
        assert!(err.to_string().contains("12345"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_shutdown_timeout_display() {
        let err = IngestionError::ShutdownTimeout(Duration::from_secs(5));
        assert!(err.to_string().contains("5s"));
    }
}
