use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// StreamRule はフィルタードストリームのサーバー側キーワードルールを表す。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRule {
    /// マッチ対象のキーワード
    pub value: String,
    /// 人間可読なルールタグ
    pub tag: String,
}

impl StreamRule {
    /// キーワードからルールを作成する。タグは "Keyword <keyword>" とする。
    pub fn for_keyword(keyword: &str) -> Self {
        Self {
            value: keyword.to_string(),
            tag: format!("Keyword {keyword}"),
        }
    }

    /// キーワード一覧からルール一覧を作成する。
    /// 空白のみのキーワードは無視し、同じキーワードは 1 件にまとめて最初に現れた順序を保つ。
    pub fn from_keywords(keywords: &[String]) -> Vec<Self> {
        let mut seen = BTreeSet::new();
        keywords
            .iter()
            .map(|keyword| keyword.trim())
            .filter(|keyword| !keyword.is_empty() && seen.insert(*keyword))
            .map(Self::for_keyword)
            .collect()
    }
}
