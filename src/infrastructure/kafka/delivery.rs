use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio_util::task::{task_tracker::TaskTrackerToken, TaskTracker};

use crate::domain::error::IngestionError;

/// DeliveryCallback はブローカーへの配信完了（成功・失敗）を受け取るコールバック。
/// 配信追跡タスクから並行に呼び出される。
#[cfg_attr(test, mockall::automock)]
pub trait DeliveryCallback: Send + Sync {
    fn on_success(&self, topic: &str, key: &str, partition: i32, offset: i64);
    fn on_failure(&self, topic: &str, key: &str, error: &IngestionError);
}

/// DeliveryStats は配信結果の累計カウンタ。
#[derive(Debug, Default)]
pub struct DeliveryStats {
    delivered: AtomicU64,
    failed: AtomicU64,
}

/// DeliveryStatsSnapshot は DeliveryStats のある時点の値。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryStatsSnapshot {
    pub delivered: u64,
    pub failed: u64,
}

impl DeliveryStats {
    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DeliveryStatsSnapshot {
        DeliveryStatsSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// LoggingDeliveryCallback は配信結果をログに出力し、カウンタに記録する既定の実装。
#[derive(Debug, Default)]
pub struct LoggingDeliveryCallback {
    stats: Arc<DeliveryStats>,
}

impl LoggingDeliveryCallback {
    pub fn new(stats: Arc<DeliveryStats>) -> Self {
        Self { stats }
    }

    pub fn stats(&self) -> Arc<DeliveryStats> {
        self.stats.clone()
    }
}

impl DeliveryCallback for LoggingDeliveryCallback {
    fn on_success(&self, topic: &str, key: &str, partition: i32, offset: i64) {
        self.stats.record_delivered();
        tracing::debug!(
            topic = %topic,
            key = %key,
            partition,
            offset,
            "message delivered to kafka"
        );
    }

    fn on_failure(&self, topic: &str, key: &str, error: &IngestionError) {
        self.stats.record_failed();
        tracing::error!(
            topic = %topic,
            key = %key,
            error = %error,
            "failed to deliver message to kafka"
        );
    }
}

/// DeliveryTracker は送信済みメッセージの配信完了を追跡する。
///
/// 各メッセージの配信待ちは個別のタスクで行い、完了順はブローカー次第で送信順と一致しない。
/// `close` 後は新しい追跡を受け付けず、`wait` で全ての配信待ちの完了を待てる。
pub struct DeliveryTracker {
    tasks: TaskTracker,
    callback: Arc<dyn DeliveryCallback>,
}

impl DeliveryTracker {
    pub fn new(callback: Arc<dyn DeliveryCallback>) -> Self {
        Self {
            tasks: TaskTracker::new(),
            callback,
        }
    }

    /// 配信結果 future を追跡タスクとして起動する。
    pub fn track<F>(&self, topic: String, key: String, delivery: F)
    where
        F: Future<Output = Result<(i32, i64), IngestionError>> + Send + 'static,
    {
        let callback = self.callback.clone();
        self.tasks.spawn(async move {
            match delivery.await {
                Ok((partition, offset)) => callback.on_success(&topic, &key, partition, offset),
                Err(e) => callback.on_failure(&topic, &key, &e),
            }
        });
    }

    /// 送信キューへの投入中であることを示すトークンを返す。
    /// トークンが生きている間は `wait` が完了しない。
    pub fn reserve(&self) -> TaskTrackerToken {
        self.tasks.token()
    }

    /// 新しい追跡の受付を停止する。すでに停止済みなら false を返す。
    pub fn close(&self) -> bool {
        self.tasks.close()
    }

    pub fn is_closed(&self) -> bool {
        self.tasks.is_closed()
    }

    /// 配信待ちのメッセージ数。
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// close 済みの場合、追跡中の全タスクの完了を待つ。
    pub async fn wait(&self) {
        self.tasks.wait().await;
    }
}
