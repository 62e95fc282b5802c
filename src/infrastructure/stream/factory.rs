use std::sync::Arc;
use std::time::Duration;

use crate::domain::entity::SourceKind;
use crate::domain::error::IngestionError;
use crate::domain::service::StreamSource;
use crate::infrastructure::config::TwitterToKafkaServiceConfig;

use super::{MockStreamSource, TwitterV2StreamSource};

/// 有効化フラグに応じたストリームソースを構築する。
pub fn build_stream_source(
    config: &TwitterToKafkaServiceConfig,
) -> Result<Arc<dyn StreamSource>, IngestionError> {
    match config.source_kind()? {
        SourceKind::Mock => {
            let source = MockStreamSource::new(
                &config.twitter_keywords,
                config.mock_min_tweet_length,
                config.mock_max_tweet_length,
                Duration::from_millis(config.mock_sleep_ms),
            )?;
            Ok(Arc::new(source))
        }
        SourceKind::Live => {
            if config.twitter_keywords.iter().all(|k| k.trim().is_empty()) {
                return Err(IngestionError::Configuration(
                    "twitter stream requires at least one keyword".to_string(),
                ));
            }
            if config.bearer_token().is_none() {
                return Err(IngestionError::Configuration(
                    "twitter v2 bearer token is not configured".to_string(),
                ));
            }
            Ok(Arc::new(TwitterV2StreamSource::new(config)))
        }
    }
}
