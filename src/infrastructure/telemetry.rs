//! 構造化ログの初期化。
//! tracing-subscriber を使用し、JSON またはテキスト形式で出力する。

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// init_logger は tracing-subscriber を初期化する。
///
/// RUST_LOG が設定されていればそれを優先し、なければ level をフィルタとして使う。
/// format が "text" の場合はプレーンテキスト出力、それ以外は JSON 出力。
pub fn init_logger(level: &str, format: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(parse_log_level(level).as_str().to_lowercase()));

    let registry = tracing_subscriber::registry().with(filter);

    if format == "text" {
        registry.with(fmt::layer().with_target(true)).try_init()?;
    } else {
        registry
            .with(fmt::layer().json().with_target(true))
            .try_init()?;
    }
    Ok(())
}

/// parse_log_level はログレベル文字列を tracing の Level に変換する。
/// 未知の値は INFO として扱う。
pub fn parse_log_level(level: &str) -> tracing::Level {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
