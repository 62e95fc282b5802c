//! 指数バックオフ付きリトライ。

use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// RetryConfig はバックオフの計算パラメータ。
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// 待機時間を ±10% の範囲でばらつかせる
    pub jitter: bool,
}

impl RetryConfig {
    /// attempt 回目（0 始まり）の失敗後に待機する時間を返す。
    /// initial_delay * multiplier^attempt を max_delay で頭打ちにする。
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn compute_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let max_ms = self.max_delay.as_millis() as f64;
        let mut delay_ms =
            (self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent)).min(max_ms);
        if self.jitter {
            delay_ms *= rand::thread_rng().gen_range(0.9..=1.1);
        }
        Duration::from_millis(delay_ms as u64)
    }
}

/// operation を最大 `max_attempts` 回実行する。
///
/// `is_retryable` が false を返すエラーは即座に返す。試行回数を使い切った場合は最後のエラーを返す。
pub async fn with_retry<F, Fut, T, E, P>(
    config: &RetryConfig,
    is_retryable: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;
                if attempt >= max_attempts || !is_retryable(&e) {
                    return Err(e);
                }
                tracing::warn!(
                    attempt,
                    max_attempts,
                    error = %e,
                    "リトライ可能なエラーが発生したため再試行する"
                );
                tokio::time::sleep(config.compute_delay(attempt - 1)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn backoff(max_attempts: u32, initial_ms: u64, max_ms: u64, jitter: bool) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(initial_ms),
            max_delay: Duration::from_millis(max_ms),
            multiplier: 2.0,
            jitter,
        }
    }

    fn no_wait(max_attempts: u32) -> RetryConfig {
        backoff(max_attempts, 1, 1, false)
    }

    #[test]
    fn test_compute_delay_exponential() {
        let cfg = backoff(5, 100, 30_000, false);
        assert_eq!(cfg.compute_delay(0), Duration::from_millis(100));
        assert_eq!(cfg.compute_delay(1), Duration::from_millis(200));
        assert_eq!(cfg.compute_delay(2), Duration::from_millis(400));
    }

    #[test]
    fn test_compute_delay_capped() {
        let cfg = backoff(10, 100, 250, false);
        assert_eq!(cfg.compute_delay(5), Duration::from_millis(250));
        assert_eq!(cfg.compute_delay(u32::MAX), Duration::from_millis(250));
    }

    #[test]
    fn test_compute_delay_jitter_range() {
        let cfg = backoff(3, 1000, 30_000, true);
        for _ in 0..20 {
            let delay = cfg.compute_delay(0);
            assert!(delay >= Duration::from_millis(900));
            assert!(delay <= Duration::from_millis(1100));
        }
    }

    #[tokio::test]
    async fn test_with_retry_succeeds_after_failures() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<u32, String> = with_retry(&no_wait(3), |_| true, move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err("queue full".to_string())
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_exhausted() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), String> = with_retry(&no_wait(3), |_| true, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("queue full".to_string())
        })
        .await;
        assert_eq!(result.unwrap_err(), "queue full");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_non_retryable_returns_immediately() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), String> =
            with_retry(&no_wait(5), |e: &String| e == "queue full", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("unknown topic".to_string())
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
