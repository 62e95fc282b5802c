use async_trait::async_trait;

use crate::domain::entity::StatusEvent;

/// StatusListener はストリームソースから受信したステータスを 1 件ずつ受け取るシンク。
/// 実装はエラーを呼び出し元へ返さず、メッセージ単位で処理を完結させる。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusListener: Send + Sync {
    async fn on_status(&self, event: StatusEvent);
}
