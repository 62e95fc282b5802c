pub mod delivery;
pub mod producer;

use std::time::Duration;

use serde::Deserialize;

use crate::domain::error::IngestionError;
use crate::infrastructure::retry::RetryConfig;

/// KafkaConfig は Kafka ブローカー接続とプロデューサーの設定を表す。
#[derive(Debug, Clone, Deserialize)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    #[serde(default = "default_security_protocol")]
    pub security_protocol: String,
    /// Producer topic: ステータスイベントの発行先
    pub topic_name: String,
    #[serde(default = "default_acks")]
    pub acks: String,
    /// ブローカーへの配信完了を待つ上限（ミリ秒）
    #[serde(default = "default_message_timeout_ms")]
    pub message_timeout_ms: u64,
    /// クローズ時の flush 待ち上限（ミリ秒）
    #[serde(default = "default_flush_timeout_ms")]
    pub flush_timeout_ms: u64,
    /// ローカル送信キューが満杯のときの再試行設定
    #[serde(default)]
    pub queue_full_retry: QueueFullRetryConfig,
}

fn default_security_protocol() -> String {
    "PLAINTEXT".to_string()
}

fn default_acks() -> String {
    "all".to_string()
}

fn default_message_timeout_ms() -> u64 {
    5000
}

fn default_flush_timeout_ms() -> u64 {
    10_000
}

impl KafkaConfig {
    /// ブローカーアドレスをカンマ区切り文字列で返す（rdkafka の bootstrap.servers 用）。
    pub fn bootstrap_servers(&self) -> String {
        self.brokers.join(",")
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), IngestionError> {
        if self.brokers.iter().all(|b| b.trim().is_empty()) {
            return Err(IngestionError::Configuration(
                "at least one kafka broker must be specified".to_string(),
            ));
        }
        if self.topic_name.trim().is_empty() {
            return Err(IngestionError::Configuration(
                "kafka topic_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// QueueFullRetryConfig はキュー満杯時の指数バックオフ設定を表す。
#[derive(Debug, Clone, Deserialize)]
pub struct QueueFullRetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

impl Default for QueueFullRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter: default_jitter(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    3000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> bool {
    true
}

impl From<&QueueFullRetryConfig> for RetryConfig {
    fn from(cfg: &QueueFullRetryConfig) -> Self {
        RetryConfig {
            max_attempts: cfg.max_attempts,
            initial_delay: Duration::from_millis(cfg.initial_delay_ms),
            max_delay: Duration::from_millis(cfg.max_delay_ms),
            multiplier: cfg.multiplier,
            jitter: cfg.jitter,
        }
    }
}
