use crate::domain::error::IngestionError;

/// SourceKind は起動時に選択するストリームソースの種別。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// 合成ステータスを生成するモックストリーム
    Mock,
    /// Twitter API v2 フィルタードストリーム
    Live,
}

impl SourceKind {
    /// 排他的な 2 つのフラグからソース種別を決定する。
    /// 両方 true、または両方 false の場合は設定エラーを返す。
    pub fn from_flags(enable_mock: bool, enable_live: bool) -> Result<Self, IngestionError> {
        match (enable_mock, enable_live) {
            (true, false) => Ok(Self::Mock),
            (false, true) => Ok(Self::Live),
            (true, true) => Err(IngestionError::Configuration(
                "enable_mock_tweets and enable_v2_tweets are mutually exclusive".to_string(),
            )),
            (false, false) => Err(IngestionError::Configuration(
                "one of enable_mock_tweets or enable_v2_tweets must be true".to_string(),
            )),
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mock => write!(f, "mock"),
            Self::Live => write!(f, "twitter-v2"),
        }
    }
}
