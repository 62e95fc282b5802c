use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::domain::entity::status_event::parse_status_date;
use crate::domain::entity::{SourceKind, StatusEvent, StreamRule};
use crate::domain::error::IngestionError;
use crate::domain::service::{StatusListener, StreamSource};
use crate::infrastructure::config::TwitterToKafkaServiceConfig;

/// TwitterV2StreamSource は Twitter API v2 フィルタードストリームを購読するソース。
///
/// 開始時にサーバー側のルールを設定済みキーワードと一致させ、
/// その後ストリームを改行区切り JSON として読み取る。自動再接続は行わない。
pub struct TwitterV2StreamSource {
    client: Client,
    bearer_token: Option<SecretString>,
    stream_url: String,
    rules_url: String,
    rules: Vec<StreamRule>,
}

impl TwitterV2StreamSource {
    pub fn new(config: &TwitterToKafkaServiceConfig) -> Self {
        Self {
            client: Client::new(),
            bearer_token: config
                .bearer_token()
                .map(|token| SecretString::new(token.to_string())),
            stream_url: config.twitter_v2_base_url.clone(),
            rules_url: config.twitter_v2_rules_base_url.clone(),
            rules: StreamRule::from_keywords(&config.twitter_keywords),
        }
    }

    /// サーバー側のルールを設定済みキーワードのルールだけにする。
    /// 既存ルールをすべて削除してから追加する。
    async fn setup_rules(&self, token: &str, rules_url: &Url) -> Result<(), IngestionError> {
        let response = self
            .client
            .get(rules_url.clone())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| IngestionError::stream_connection("failed to fetch stream rules", e))?;
        let existing: RulesResponse = check_status(response, "fetching stream rules")
            .await?
            .json()
            .await
            .map_err(|e| IngestionError::stream_connection("failed to decode stream rules", e))?;

        let ids: Vec<String> = existing.data.into_iter().map(|rule| rule.id).collect();
        if !ids.is_empty() {
            tracing::info!(count = ids.len(), "deleting existing stream rules");
            let response = self
                .client
                .post(rules_url.clone())
                .bearer_auth(token)
                .json(&json!({ "delete": { "ids": ids } }))
                .send()
                .await
                .map_err(|e| {
                    IngestionError::stream_connection("failed to delete stream rules", e)
                })?;
            check_status(response, "deleting stream rules").await?;
        }

        let response = self
            .client
            .post(rules_url.clone())
            .bearer_auth(token)
            .json(&json!({ "add": self.rules }))
            .send()
            .await
            .map_err(|e| IngestionError::stream_connection("failed to add stream rules", e))?;
        check_status(response, "adding stream rules").await?;

        let keywords: Vec<&str> = self.rules.iter().map(|r| r.value.as_str()).collect();
        tracing::info!(?keywords, "created filter for twitter stream");
        Ok(())
    }

    /// ストリームに接続し、受信した行を順にリスナーへ渡す。
    /// プロバイダー側で接続が閉じられた場合は StreamConnection エラーを返す。
    async fn connect_stream(
        &self,
        token: &str,
        stream_url: &Url,
        listener: &dyn StatusListener,
    ) -> Result<(), IngestionError> {
        let response = self
            .client
            .get(stream_url.clone())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| IngestionError::stream_connection("failed to connect to stream", e))?;
        let mut response = check_status(response, "connecting to stream").await?;
        tracing::info!(url = %stream_url, "connected to twitter stream");

        let mut lines = LineBuffer::new(MAX_LINE_BYTES);
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| IngestionError::stream_connection("failed to read stream", e))?
        {
            for line in lines.push(&chunk)? {
                if let Some(event) = parse_line(&line)? {
                    listener.on_status(event).await;
                }
            }
        }

        // 末尾に改行のない最後の行
        if let Some(event) = parse_line(&lines.finish())? {
            listener.on_status(event).await;
        }
        Err(IngestionError::stream_closed("stream closed by provider"))
    }
}

#[async_trait]
impl StreamSource for TwitterV2StreamSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Live
    }

    async fn start(
        &self,
        listener: Arc<dyn StatusListener>,
        cancel: CancellationToken,
    ) -> Result<(), IngestionError> {
        let Some(token) = self.bearer_token.as_ref() else {
            tracing::error!("problem with getting bearer token");
            return Err(IngestionError::Configuration(
                "twitter v2 bearer token is not configured".to_string(),
            ));
        };
        let token = token.expose_secret().as_str();
        let rules_url = Url::parse(&self.rules_url)
            .map_err(|e| IngestionError::stream_connection("malformed rules url", e))?;
        let stream_url = Url::parse(&self.stream_url)
            .map_err(|e| IngestionError::stream_connection("malformed stream url", e))?;

        let run = async {
            self.setup_rules(token, &rules_url).await?;
            self.connect_stream(token, &stream_url, listener.as_ref()).await
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::info!("twitter stream cancelled");
                Ok(())
            }
            result = run => {
                if let Err(e) = &result {
                    tracing::error!(error = %e, "error streaming tweets");
                }
                result
            }
        }
    }
}

/// 1 行あたりの上限。改行が届かないまま超えた場合は接続エラーとする。
const MAX_LINE_BYTES: usize = 1024 * 1024;

/// 受信したチャンクを改行単位の行に分割する。
struct LineBuffer {
    pending: Vec<u8>,
    max_line: usize,
}

impl LineBuffer {
    fn new(max_line: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line,
        }
    }

    /// チャンクを追加し、完結した行を受信順に返す。
    fn push(&mut self, chunk: &[u8]) -> Result<Vec<Vec<u8>>, IngestionError> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            lines.push(self.pending.drain(..=pos).collect());
        }
        if self.pending.len() > self.max_line {
            return Err(IngestionError::stream_closed(format!(
                "stream line exceeds {} bytes without a newline",
                self.max_line
            )));
        }
        Ok(lines)
    }

    /// 改行で終わらなかった残りを返す。
    fn finish(self) -> Vec<u8> {
        self.pending
    }
}

/// 2xx 以外の応答を StreamConnection エラーに変換する。
async fn check_status(response: Response, context: &str) -> Result<Response, IngestionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown".to_string());
    Err(IngestionError::stream_closed(format!(
        "{context} returned {status}: {body}"
    )))
}

#[derive(Debug, Deserialize)]
struct RulesResponse {
    #[serde(default)]
    data: Vec<ExistingRule>,
}

#[derive(Debug, Deserialize)]
struct ExistingRule {
    id: String,
}

/// ストリームの 1 行。v2 エンベロープ、v1 形式、エラーのみのエンベロープを受け付ける。
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StreamMessage {
    V2 { data: V2Tweet },
    V1(V1Status),
    Errors { errors: Vec<serde_json::Value> },
}

#[derive(Debug, Deserialize)]
struct V2Tweet {
    id: FlexibleId,
    text: String,
    author_id: FlexibleId,
    #[serde(default)]
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct V1Status {
    id: FlexibleId,
    text: String,
    created_at: String,
    user: V1User,
}

#[derive(Debug, Deserialize)]
struct V1User {
    id: FlexibleId,
}

/// 文字列と数値のどちらでも表現される ID。負の値は受け付けない。
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FlexibleId {
    Number(i64),
    Text(String),
}

impl FlexibleId {
    fn value(&self) -> Result<i64, String> {
        match self {
            Self::Number(n) if *n >= 0 => Ok(*n),
            Self::Number(n) => Err(format!("invalid id: {n}")),
            Self::Text(s) => s
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|id| *id >= 0)
                .ok_or_else(|| format!("invalid id: {s}")),
        }
    }
}

/// RFC 3339（v2）または Twitter 形式（v1）の日時をパースする。
fn parse_created_at(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| parse_status_date(value))
}

/// ストリームの 1 行をデコードする。
///
/// 空行（keep-alive）とエラーのみのエンベロープは None を返す。
/// デコードできない行は StreamConnection エラー。
pub(crate) fn parse_line(line: &[u8]) -> Result<Option<StatusEvent>, IngestionError> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return Ok(None);
    }

    let message: StreamMessage = serde_json::from_slice(line)
        .map_err(|e| IngestionError::stream_connection("failed to decode stream payload", e))?;

    let (id, user_id, text, created_at) = match message {
        StreamMessage::V2 { data } => {
            let created_at = match data.created_at.as_deref() {
                Some(value) => parse_created_at(value),
                None => Ok(Utc::now()),
            };
            (data.id.value(), data.author_id.value(), data.text, created_at)
        }
        StreamMessage::V1(status) => (
            status.id.value(),
            status.user.id.value(),
            status.text,
            parse_created_at(&status.created_at),
        ),
        StreamMessage::Errors { errors } => {
            tracing::warn!(?errors, "stream delivered an error envelope");
            return Ok(None);
        }
    };

    let decode = |e: String| {
        IngestionError::stream_closed(format!("failed to decode stream payload: {e}"))
    };
    Ok(Some(StatusEvent::new(
        id.map_err(decode)?,
        user_id.map_err(decode)?,
        text,
        created_at.map_err(decode)?,
    )))
}
