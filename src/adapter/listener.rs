use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::entity::StatusEvent;
use crate::domain::service::StatusListener;
use crate::infrastructure::kafka::producer::{MessagePublisher, OutboundMessage};

/// KafkaStatusListener は受信したステータスを Kafka メッセージに変換して発行する。
///
/// キーはユーザー ID、値は StatusEvent の JSON。発行エラーはログに記録し、呼び出し元へは返さない。
pub struct KafkaStatusListener {
    publisher: Arc<dyn MessagePublisher>,
    topic: String,
}

impl KafkaStatusListener {
    pub fn new(publisher: Arc<dyn MessagePublisher>, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl StatusListener for KafkaStatusListener {
    async fn on_status(&self, event: StatusEvent) {
        let key = event.message_key();
        let value = match serde_json::to_vec(&event) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "failed to serialize status event");
                return;
            }
        };

        tracing::debug!(
            topic = %self.topic,
            key = %key,
            id = event.id,
            "received status, sending to kafka"
        );
        let message = OutboundMessage {
            topic: self.topic.clone(),
            key,
            value,
        };
        if let Err(e) = self.publisher.send(message).await {
            tracing::error!(
                topic = %self.topic,
                error = %e,
                "failed to send status to kafka"
            );
        }
    }
}
