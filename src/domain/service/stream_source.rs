use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::entity::SourceKind;
use crate::domain::error::IngestionError;
use crate::domain::service::StatusListener;

/// StreamSource はステータスのストリームを生成するソースの共通インターフェース。
///
/// `start` はバックグラウンドタスク上で実行され、通常運用では戻らない。
/// キャンセル、または致命的エラーの発生時にのみ戻る。
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// ソースの種別を返す。
    fn kind(&self) -> SourceKind;

    /// ストリームを開始し、受信順にステータスを listener へ渡す。
    async fn start(
        &self,
        listener: Arc<dyn StatusListener>,
        cancel: CancellationToken,
    ) -> Result<(), IngestionError>;
}
