use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::domain::entity::SourceKind;
use crate::domain::error::IngestionError;
use crate::infrastructure::kafka::KafkaConfig;

/// Bearer トークンを上書きする環境変数名。
pub const BEARER_TOKEN_ENV: &str = "TWITTER_BEARER_TOKEN";

/// Application configuration for twitter-to-kafka service.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    #[serde(default)]
    pub log: LogConfig,
    pub kafka: KafkaConfig,
    pub twitter_to_kafka_service: TwitterToKafkaServiceConfig,
    /// シャットダウン時にストリームソースの停止を待つ猶予（ミリ秒）
    #[serde(default = "default_shutdown_grace_period_ms")]
    pub shutdown_grace_period_ms: u64,
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut cfg: Config = serde_yaml::from_str(&content)?;
        if let Ok(token) = std::env::var(BEARER_TOKEN_ENV) {
            cfg.twitter_to_kafka_service.twitter_v2_bearer_token = Some(SecretString::new(token));
        }
        Ok(cfg)
    }

    /// 設定値の整合性を検証する。バックグラウンド処理の開始前に呼び出すこと。
    pub fn validate(&self) -> Result<(), IngestionError> {
        self.kafka.validate()?;
        self.twitter_to_kafka_service.validate()
    }

    pub fn shutdown_grace_period(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.shutdown_grace_period_ms)
    }
}

fn default_shutdown_grace_period_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_environment() -> String {
    "dev".to_string()
}

/// LogConfig はログ出力の設定を表す。
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "text" の場合はプレーンテキスト、それ以外は JSON
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// TwitterToKafkaServiceConfig はストリームソースの設定を表す。
#[derive(Debug, Clone, Deserialize)]
pub struct TwitterToKafkaServiceConfig {
    #[serde(default)]
    pub enable_mock_tweets: bool,
    #[serde(default)]
    pub enable_v2_tweets: bool,
    pub twitter_keywords: Vec<String>,
    #[serde(default = "default_mock_min_tweet_length")]
    pub mock_min_tweet_length: usize,
    #[serde(default = "default_mock_max_tweet_length")]
    pub mock_max_tweet_length: usize,
    #[serde(default = "default_mock_sleep_ms")]
    pub mock_sleep_ms: u64,
    /// 未設定の場合は TWITTER_BEARER_TOKEN 環境変数を参照する
    #[serde(default)]
    pub twitter_v2_bearer_token: Option<SecretString>,
    #[serde(default = "default_twitter_v2_base_url")]
    pub twitter_v2_base_url: String,
    #[serde(default = "default_twitter_v2_rules_base_url")]
    pub twitter_v2_rules_base_url: String,
}

fn default_mock_min_tweet_length() -> usize {
    5
}

fn default_mock_max_tweet_length() -> usize {
    15
}

fn default_mock_sleep_ms() -> u64 {
    10_000
}

fn default_twitter_v2_base_url() -> String {
    "https://api.twitter.com/2/tweets/search/stream?tweet.fields=created_at&expansions=author_id"
        .to_string()
}

fn default_twitter_v2_rules_base_url() -> String {
    "https://api.twitter.com/2/tweets/search/stream/rules".to_string()
}

impl TwitterToKafkaServiceConfig {
    /// 有効化フラグからソース種別を決定する。
    pub fn source_kind(&self) -> Result<SourceKind, IngestionError> {
        SourceKind::from_flags(self.enable_mock_tweets, self.enable_v2_tweets)
    }

    /// 空白のみのトークンは未設定として扱う。
    pub fn bearer_token(&self) -> Option<&str> {
        self.twitter_v2_bearer_token
            .as_ref()
            .map(|token| token.expose_secret().as_str())
            .filter(|token| !token.trim().is_empty())
    }

    pub fn validate(&self) -> Result<(), IngestionError> {
        let kind = self.source_kind()?;
        if self.twitter_keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(IngestionError::Configuration(
                "twitter_keywords must contain at least one keyword".to_string(),
            ));
        }
        if kind == SourceKind::Mock {
            if self.mock_min_tweet_length == 0 {
                return Err(IngestionError::Configuration(
                    "mock_min_tweet_length must be at least 1".to_string(),
                ));
            }
            if self.mock_min_tweet_length > self.mock_max_tweet_length {
                return Err(IngestionError::Configuration(format!(
                    "mock_min_tweet_length ({}) must not exceed mock_max_tweet_length ({})",
                    self.mock_min_tweet_length, self.mock_max_tweet_length
                )));
            }
        }
        if kind == SourceKind::Live && self.bearer_token().is_none() {
            return Err(IngestionError::Configuration(format!(
                "twitter_v2_bearer_token or {BEARER_TOKEN_ENV} must be set for the v2 stream"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
app:
  name: "twitter-to-kafka-service"
kafka:
  brokers:
    - "localhost:9092"
  topic_name: "twitter-topic"
twitter_to_kafka_service:
  enable_mock_tweets: true
  twitter_keywords:
    - "Java"
    - "Kafka"
  mock_min_tweet_length: 4
  mock_max_tweet_length: 8
  mock_sleep_ms: 500
"#;

    fn make_service_config() -> TwitterToKafkaServiceConfig {
        let cfg: Config = serde_yaml::from_str(YAML).unwrap();
        cfg.twitter_to_kafka_service
    }

    #[test]
    fn test_config_deserialization() {
        let cfg: Config = serde_yaml::from_str(YAML).unwrap();
        assert_eq!(cfg.app.name, "twitter-to-kafka-service");
        assert_eq!(cfg.app.environment, "dev");
        assert_eq!(cfg.kafka.topic_name, "twitter-topic");
        assert_eq!(cfg.twitter_to_kafka_service.twitter_keywords.len(), 2);
        assert_eq!(cfg.twitter_to_kafka_service.mock_sleep_ms, 500);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_config_defaults() {
        let cfg: Config = serde_yaml::from_str(YAML).unwrap();
        assert_eq!(cfg.log.level, "info");
        assert_eq!(cfg.log.format, "json");
        assert_eq!(cfg.shutdown_grace_period_ms, 10_000);
        assert!(!cfg.twitter_to_kafka_service.enable_v2_tweets);
        assert!(cfg
            .twitter_to_kafka_service
            .twitter_v2_rules_base_url
            .ends_with("/2/tweets/search/stream/rules"));
    }

    #[test]
    fn test_bearer_token_hidden_in_debug() {
        let mut svc = make_service_config();
        svc.twitter_v2_bearer_token = Some(SecretString::new("super-secret".to_string()));
        assert_eq!(svc.bearer_token(), Some("super-secret"));
        assert!(!format!("{svc:?}").contains("super-secret"));
    }

    #[test]
    fn test_blank_bearer_token_is_missing() {
        let mut svc = make_service_config();
        svc.twitter_v2_bearer_token = Some(SecretString::new("   ".to_string()));
        assert!(svc.bearer_token().is_none());
    }

    #[test]
    fn test_validate_rejects_both_flags() {
        let mut svc = make_service_config();
        svc.enable_v2_tweets = true;
        assert!(matches!(
            svc.validate(),
            Err(IngestionError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_keywords() {
        let mut svc = make_service_config();
        svc.twitter_keywords.clear();
        let err = svc.validate().unwrap_err();
        assert!(err.to_string().contains("twitter_keywords"));
    }

    #[test]
    fn test_validate_rejects_inverted_lengths() {
        let mut svc = make_service_config();
        svc.mock_min_tweet_length = 10;
        svc.mock_max_tweet_length = 3;
        let err = svc.validate().unwrap_err();
        assert!(err.to_string().contains("must not exceed"));
    }

    #[test]
    fn test_validate_ignores_mock_lengths_in_live_mode() {
        let mut svc = make_service_config();
        svc.enable_mock_tweets = false;
        svc.enable_v2_tweets = true;
        svc.mock_min_tweet_length = 0;
        svc.twitter_v2_bearer_token = Some(SecretString::new("token".to_string()));
        assert!(svc.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_token_in_live_mode() {
        let mut svc = make_service_config();
        svc.enable_mock_tweets = false;
        svc.enable_v2_tweets = true;
        let err = svc.validate().unwrap_err();
        assert!(matches!(err, IngestionError::Configuration(_)));
        assert!(err.to_string().contains(BEARER_TOKEN_ENV));

        svc.twitter_v2_bearer_token = Some(SecretString::new(" ".to_string()));
        assert!(svc.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, YAML).unwrap();
        let cfg = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.app.name, "twitter-to-kafka-service");
    }

    #[test]
    fn test_load_missing_file() {
        assert!(Config::load("/nonexistent/config.yaml").is_err());
    }
}
