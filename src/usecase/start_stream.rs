use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::domain::entity::SourceKind;
use crate::domain::error::IngestionError;
use crate::domain::service::{StatusListener, StreamSource};
use crate::infrastructure::config::TwitterToKafkaServiceConfig;
use crate::infrastructure::stream::build_stream_source;

/// StartStreamUseCase は設定に応じたストリームソースをバックグラウンドタスクで開始する。
pub struct StartStreamUseCase {
    listener: Arc<dyn StatusListener>,
}

impl StartStreamUseCase {
    pub fn new(listener: Arc<dyn StatusListener>) -> Self {
        Self { listener }
    }

    /// ソースを構築して開始する。設定エラーの場合はタスクを起動せずにエラーを返す。
    pub fn execute(
        &self,
        config: &TwitterToKafkaServiceConfig,
    ) -> Result<StreamTaskHandle, IngestionError> {
        let source = build_stream_source(config)?;
        Ok(self.start_source(source))
    }

    /// 構築済みのソースを開始する。
    pub fn start_source(&self, source: Arc<dyn StreamSource>) -> StreamTaskHandle {
        let kind = source.kind();
        let cancel = CancellationToken::new();
        let listener = self.listener.clone();
        let token = cancel.clone();

        tracing::info!(source = %kind, "starting status stream");
        let task = tokio::spawn(async move { source.start(listener, token).await });

        StreamTaskHandle { kind, cancel, task }
    }
}

/// StreamTaskHandle は実行中のストリームソースタスクの制御ハンドル。
pub struct StreamTaskHandle {
    kind: SourceKind,
    cancel: CancellationToken,
    task: JoinHandle<Result<(), IngestionError>>,
}

impl StreamTaskHandle {
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// ソースタスクの終了を待つ。完了後に再度呼び出してはならない。
    pub async fn wait(&mut self) -> Result<(), IngestionError> {
        let joined = (&mut self.task).await;
        Self::into_result(joined, self.cancel.is_cancelled())
    }

    /// ソースへ停止を要求し、grace の間だけ終了を待つ。
    /// 期限内に終了しない場合はタスクを中断して ShutdownTimeout を返す。
    pub async fn shutdown(mut self, grace: Duration) -> Result<(), IngestionError> {
        tracing::info!(source = %self.kind, grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX), "stopping status stream");
        self.cancel.cancel();
        match tokio::time::timeout(grace, &mut self.task).await {
            Ok(joined) => Self::into_result(joined, true),
            Err(_) => {
                self.task.abort();
                Err(IngestionError::ShutdownTimeout(grace))
            }
        }
    }

    fn into_result(
        joined: Result<Result<(), IngestionError>, JoinError>,
        shutdown_requested: bool,
    ) -> Result<(), IngestionError> {
        match joined {
            Ok(Ok(())) => Ok(()),
            // 停止要求によるスリープ中断は正常停止
            Ok(Err(IngestionError::InterruptedWait(_))) if shutdown_requested => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(e) => Err(IngestionError::TaskAborted(e.to_string())),
        }
    }
}
