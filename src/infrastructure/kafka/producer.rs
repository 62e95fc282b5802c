use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};

use super::delivery::{DeliveryCallback, DeliveryTracker};
use super::KafkaConfig;
use crate::domain::error::IngestionError;
use crate::infrastructure::retry::{with_retry, RetryConfig};

/// OutboundMessage は Kafka へ送信する 1 件のメッセージ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub key: String,
    pub value: Vec<u8>,
}

/// MessagePublisher は Kafka へのメッセージ発行インターフェース。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// メッセージを送信キューへ投入する。配信完了は待たずに戻り、結果は配信コールバックへ通知される。
    async fn send(&self, message: OutboundMessage) -> Result<(), IngestionError>;

    /// 新規送信の受付を停止し、送信中の全メッセージの配信完了を待ってから戻る。
    async fn close(&self) -> Result<(), IngestionError>;
}

/// KafkaMessagePublisher は rdkafka FutureProducer を使った Kafka プロデューサー。
///
/// ローカルの送信キューが満杯の場合は指数バックオフで再投入し、
/// 試行回数を使い切ったら Publish エラーを返す。
pub struct KafkaMessagePublisher {
    producer: FutureProducer,
    deliveries: DeliveryTracker,
    retry: RetryConfig,
    flush_timeout: Duration,
}

impl KafkaMessagePublisher {
    /// 新しい KafkaMessagePublisher を作成する。
    pub fn new(
        config: &KafkaConfig,
        callback: Arc<dyn DeliveryCallback>,
    ) -> Result<Self, IngestionError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", config.bootstrap_servers())
            .set("security.protocol", &config.security_protocol)
            .set("acks", &config.acks)
            .set("message.timeout.ms", config.message_timeout_ms.to_string())
            .create()
            .map_err(|e| {
                IngestionError::Configuration(format!("failed to create kafka producer: {e}"))
            })?;

        Ok(Self {
            producer,
            deliveries: DeliveryTracker::new(callback),
            retry: RetryConfig::from(&config.queue_full_retry),
            flush_timeout: config.flush_timeout(),
        })
    }

    /// 配信待ちのメッセージ数を返す。
    pub fn in_flight(&self) -> usize {
        self.deliveries.in_flight()
    }
}

fn is_queue_full(err: &KafkaError) -> bool {
    matches!(
        err,
        KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull)
    )
}

#[async_trait]
impl MessagePublisher for KafkaMessagePublisher {
    async fn send(&self, message: OutboundMessage) -> Result<(), IngestionError> {
        if self.deliveries.is_closed() {
            return Err(IngestionError::publish(
                message.key,
                "publisher is closed",
            ));
        }

        // 投入中に close されても、この配信を待ってから close が完了するようにする
        let _reservation = self.deliveries.reserve();
        let delivery = with_retry(&self.retry, is_queue_full, || {
            let record = FutureRecord::to(&message.topic)
                .key(&message.key)
                .payload(&message.value);
            std::future::ready(self.producer.send_result(record).map_err(|(err, _)| err))
        })
        .await
        .map_err(|e| IngestionError::publish(message.key.clone(), e.to_string()))?;

        let key = message.key.clone();
        self.deliveries
            .track(message.topic, message.key, async move {
                match delivery.await {
                    Ok(Ok((partition, offset))) => Ok((partition, offset)),
                    Ok(Err((err, _))) => Err(IngestionError::publish(key, err.to_string())),
                    Err(_) => Err(IngestionError::publish(
                        key,
                        "delivery result was dropped by the producer",
                    )),
                }
            });
        Ok(())
    }

    async fn close(&self) -> Result<(), IngestionError> {
        if !self.deliveries.close() {
            return Ok(());
        }
        tracing::info!(
            in_flight = self.deliveries.in_flight(),
            "closing kafka publisher, flushing in-flight messages"
        );

        let producer = self.producer.clone();
        let timeout = self.flush_timeout;
        let flushed = tokio::task::spawn_blocking(move || producer.flush(timeout))
            .await
            .map_err(|e| IngestionError::TaskAborted(format!("kafka flush task failed: {e}")))?;

        // flush がタイムアウトしても、残りの配信結果は message.timeout.ms 以内に確定する
        self.deliveries.wait().await;

        flushed.map_err(|e| IngestionError::publish("", format!("failed to flush producer: {e}")))?;
        tracing::info!("kafka publisher closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::kafka::delivery::{DeliveryStats, LoggingDeliveryCallback};
    use crate::infrastructure::kafka::QueueFullRetryConfig;
    use std::sync::Mutex;

    /// 到達不能なブローカーを指す設定。メッセージは message.timeout.ms 経過後に失敗する。
    fn unreachable_config() -> KafkaConfig {
        KafkaConfig {
            brokers: vec!["127.0.0.1:1".to_string()],
            security_protocol: "PLAINTEXT".to_string(),
            topic_name: "twitter-topic".to_string(),
            acks: "all".to_string(),
            message_timeout_ms: 300,
            flush_timeout_ms: 5000,
            queue_full_retry: QueueFullRetryConfig::default(),
        }
    }

    #[derive(Default)]
    struct RecordingCallback {
        failures: Mutex<Vec<(String, String)>>,
    }

    impl DeliveryCallback for RecordingCallback {
        fn on_success(&self, _topic: &str, _key: &str, _partition: i32, _offset: i64) {}

        fn on_failure(&self, _topic: &str, key: &str, error: &IngestionError) {
            self.failures
                .lock()
                .unwrap()
                .push((key.to_string(), error.to_string()));
        }
    }

    fn make_message(key: &str) -> OutboundMessage {
        OutboundMessage {
            topic: "twitter-topic".to_string(),
            key: key.to_string(),
            value: br#"{"userId":1}"#.to_vec(),
        }
    }

    #[test]
    fn test_is_queue_full() {
        assert!(is_queue_full(&KafkaError::MessageProduction(
            RDKafkaErrorCode::QueueFull
        )));
        assert!(!is_queue_full(&KafkaError::MessageProduction(
            RDKafkaErrorCode::MessageTimedOut
        )));
    }

    #[tokio::test]
    async fn test_broker_timeout_is_reported_to_callback() {
        let callback = Arc::new(RecordingCallback::default());
        let publisher = KafkaMessagePublisher::new(&unreachable_config(), callback.clone()).unwrap();

        publisher.send(make_message("12345")).await.unwrap();
        publisher.close().await.unwrap();

        let failures = callback.failures.lock().unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "12345");
        assert!(!failures[0].1.is_empty());
    }

    #[tokio::test]
    async fn test_send_after_close_is_rejected() {
        let stats = Arc::new(DeliveryStats::default());
        let callback = Arc::new(LoggingDeliveryCallback::new(stats.clone()));
        let publisher = KafkaMessagePublisher::new(&unreachable_config(), callback).unwrap();

        publisher.close().await.unwrap();
        let err = publisher.send(make_message("7")).await.unwrap_err();
        assert!(matches!(err, IngestionError::Publish { ref key, .. } if key == "7"));
        assert!(err.to_string().contains("closed"));
        assert_eq!(stats.snapshot().delivered, 0);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let callback = Arc::new(RecordingCallback::default());
        let publisher = KafkaMessagePublisher::new(&unreachable_config(), callback).unwrap();
        assert!(publisher.close().await.is_ok());
        assert!(publisher.close().await.is_ok());
        assert_eq!(publisher.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_close_waits_for_send_in_progress() {
        let callback = Arc::new(RecordingCallback::default());
        let publisher = Arc::new(
            KafkaMessagePublisher::new(&unreachable_config(), callback.clone()).unwrap(),
        );

        let reservation = publisher.deliveries.reserve();
        let closer = {
            let publisher = publisher.clone();
            tokio::spawn(async move { publisher.close().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!closer.is_finished());

        drop(reservation);
        tokio::time::timeout(Duration::from_secs(10), closer)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
