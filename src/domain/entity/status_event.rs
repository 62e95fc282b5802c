use chrono::{DateTime, FixedOffset, NaiveDateTime, SubsecRound, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Twitter ステータスの日時フォーマット（`EEE MMM dd HH:mm:ss zzz yyyy` 相当）。
/// 生成時は常に UTC で出力する。
pub const TWITTER_STATUS_DATE_FORMAT: &str = "%a %b %d %H:%M:%S UTC %Y";

/// 数値オフセット付きの Twitter v1 フォーマット（例: `Wed Oct 10 20:19:24 +0000 2018`）。
const TWITTER_STATUS_DATE_FORMAT_WITH_OFFSET: &str = "%a %b %d %H:%M:%S %z %Y";

/// ゾーン名を除いた部分のフォーマット。
const TWITTER_STATUS_DATE_FORMAT_NAIVE: &str = "%a %b %d %H:%M:%S %Y";

/// StatusEvent は取り込んだステータス 1 件を正規化した表現。
/// Kafka へはこの構造体の JSON をそのまま値として発行する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub user_id: i64,
    pub id: i64,
    pub text: String,
    #[serde(with = "twitter_date")]
    pub created_at: DateTime<Utc>,
}

impl StatusEvent {
    /// 新しい StatusEvent を作成する。
    /// created_at は秒未満を切り捨て、フォーマットとパースで値が変わらないようにする。
    pub fn new(id: i64, user_id: i64, text: String, created_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            id,
            text,
            created_at: created_at.trunc_subsecs(0),
        }
    }

    /// created_at を Twitter 形式の文字列で返す。
    pub fn created_at_text(&self) -> String {
        format_status_date(&self.created_at)
    }

    /// Kafka のメッセージキー（ユーザー ID の10進文字列）を返す。
    pub fn message_key(&self) -> String {
        self.user_id.to_string()
    }

    /// 本文を空白区切りの単語列として返す。
    pub fn words(&self) -> Vec<&str> {
        self.text.split_whitespace().collect()
    }
}

/// 日時を Twitter 形式の文字列に変換する。
pub fn format_status_date(at: &DateTime<Utc>) -> String {
    at.format(TWITTER_STATUS_DATE_FORMAT).to_string()
}

/// Twitter 形式の日時文字列をパースする。
///
/// `+0000` のような数値オフセットと、`UTC` / `GMT` / `Z` のゾーン名を受け付ける。
pub fn parse_status_date(value: &str) -> Result<DateTime<Utc>, String> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_str(value, TWITTER_STATUS_DATE_FORMAT_WITH_OFFSET) {
        return Ok(dt.with_timezone(&Utc));
    }

    let tokens: Vec<&str> = value.split_whitespace().collect();
    if tokens.len() != 6 {
        return Err(format!("invalid status date: {value}"));
    }
    let offset_secs = match tokens[4] {
        "UTC" | "GMT" | "Z" => 0,
        zone => return Err(format!("unsupported time zone '{zone}' in status date: {value}")),
    };
    let naive_text = format!(
        "{} {} {} {} {}",
        tokens[0], tokens[1], tokens[2], tokens[3], tokens[5]
    );
    let naive = NaiveDateTime::parse_from_str(&naive_text, TWITTER_STATUS_DATE_FORMAT_NAIVE)
        .map_err(|e| format!("invalid status date '{value}': {e}"))?;
    let offset = FixedOffset::east_opt(offset_secs)
        .ok_or_else(|| format!("invalid offset in status date: {value}"))?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| format!("ambiguous status date: {value}"))
}

/// created_at を Twitter 形式の文字列としてシリアライズする serde モジュール。
mod twitter_date {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_status_date(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        super::parse_status_date(&text).map_err(serde::de::Error::custom)
    }
}
