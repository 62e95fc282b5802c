use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;

use crate::domain::entity::{SourceKind, StatusEvent};
use crate::domain::error::IngestionError;
use crate::domain::service::{StatusListener, StreamSource};

/// 合成ステータスの本文に使う単語。
pub const WORDS: [&str; 48] = [
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur",
    "adipiscing", "elit", "curabitur", "vel", "hendrerit", "libero",
    "eleifend", "blandit", "nunc", "ornare", "odio", "ut",
    "orci", "gravida", "imperdiet", "nullam", "purus", "lacinia",
    "a", "pretium", "quis", "congue", "praesent", "sagittis",
    "laoreet", "auctor", "mauris", "non", "velit", "eros",
    "dictum", "proin", "accumsan", "sapien", "nec", "massa",
    "volutpat", "venenatis", "sed", "eu", "molestie", "lacus",
];

/// MockStreamSource は一定間隔で合成ステータスを生成するストリームソース。
#[derive(Debug, Clone)]
pub struct MockStreamSource {
    keywords: Vec<String>,
    min_length: usize,
    max_length: usize,
    sleep: Duration,
    seed: Option<u64>,
}

impl MockStreamSource {
    /// 新しい MockStreamSource を作成する。
    ///
    /// キーワードが空、min_length が 0、または min_length > max_length の場合は設定エラー。
    pub fn new(
        keywords: &[String],
        min_length: usize,
        max_length: usize,
        sleep: Duration,
    ) -> Result<Self, IngestionError> {
        let keywords: Vec<String> = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
        if keywords.is_empty() {
            return Err(IngestionError::Configuration(
                "mock stream requires at least one keyword".to_string(),
            ));
        }
        if min_length == 0 {
            return Err(IngestionError::Configuration(
                "mock status length must be at least 1 word".to_string(),
            ));
        }
        if min_length > max_length {
            return Err(IngestionError::Configuration(format!(
                "mock status min length ({min_length}) exceeds max length ({max_length})"
            )));
        }
        Ok(Self {
            keywords,
            min_length,
            max_length,
            sleep,
            seed: None,
        })
    }

    /// 乱数シードを固定する。同じシードなら同じ内容のステータス列を生成する。
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn new_rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// ステータスを 1 件生成する。
    /// 単語数は [min_length, max_length]、キーワードは単語数の半分の位置に置く。
    pub fn generate_status(&self, rng: &mut StdRng) -> StatusEvent {
        let length = rng.gen_range(self.min_length..=self.max_length);
        let mut words: Vec<&str> = (0..length)
            .map(|_| WORDS[rng.gen_range(0..WORDS.len())])
            .collect();
        let keyword = &self.keywords[rng.gen_range(0..self.keywords.len())];
        words[length / 2] = keyword.as_str();

        let id = rng.gen_range(0..i64::MAX);
        let user_id = rng.gen_range(0..i64::MAX);
        StatusEvent::new(id, user_id, words.join(" "), Utc::now())
    }
}

#[async_trait]
impl StreamSource for MockStreamSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Mock
    }

    async fn start(
        &self,
        listener: Arc<dyn StatusListener>,
        cancel: CancellationToken,
    ) -> Result<(), IngestionError> {
        tracing::info!(
            keywords = ?self.keywords,
            min_length = self.min_length,
            max_length = self.max_length,
            sleep_ms = u64::try_from(self.sleep.as_millis()).unwrap_or(u64::MAX),
            "starting mock status stream"
        );
        let mut rng = self.new_rng();

        loop {
            let event = self.generate_status(&mut rng);
            tracing::debug!(id = event.id, text = %event.text, "mock status generated");
            listener.on_status(event).await;

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Err(IngestionError::InterruptedWait(
                        "mock stream cancelled while sleeping".to_string(),
                    ));
                }
                () = tokio::time::sleep(self.sleep) => {}
            }
        }
    }
}
