use std::process::ExitCode;
use std::sync::Arc;

use tracing::info;

use k1s0_twitter_to_kafka::adapter::listener::KafkaStatusListener;
use k1s0_twitter_to_kafka::domain::error::IngestionError;
use k1s0_twitter_to_kafka::infrastructure::config::Config;
use k1s0_twitter_to_kafka::infrastructure::kafka::delivery::{
    DeliveryStats, LoggingDeliveryCallback,
};
use k1s0_twitter_to_kafka::infrastructure::kafka::producer::{
    KafkaMessagePublisher, MessagePublisher,
};
use k1s0_twitter_to_kafka::infrastructure::telemetry;
use k1s0_twitter_to_kafka::usecase::StartStreamUseCase;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Config
    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/config.yaml".to_string());
    let cfg = Config::load(&config_path)?;

    // Telemetry
    telemetry::init_logger(&cfg.log.level, &cfg.log.format)?;

    info!(
        app_name = %cfg.app.name,
        version = %cfg.app.version,
        environment = %cfg.app.environment,
        "starting twitter-to-kafka service"
    );

    if let Err(e) = cfg.validate() {
        tracing::error!(error = %e, "invalid configuration");
        return Ok(ExitCode::FAILURE);
    }

    // Kafka producer
    let stats = Arc::new(DeliveryStats::default());
    let callback = Arc::new(LoggingDeliveryCallback::new(stats.clone()));
    let publisher: Arc<dyn MessagePublisher> =
        Arc::new(KafkaMessagePublisher::new(&cfg.kafka, callback)?);
    info!(
        brokers = %cfg.kafka.bootstrap_servers(),
        topic = %cfg.kafka.topic_name,
        "kafka producer initialized"
    );

    // Stream source
    let listener = Arc::new(KafkaStatusListener::new(
        publisher.clone(),
        cfg.kafka.topic_name.clone(),
    ));
    let usecase = StartStreamUseCase::new(listener);
    let mut handle = match usecase.execute(&cfg.twitter_to_kafka_service) {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!(error = %e, "failed to start status stream");
            return Ok(ExitCode::FAILURE);
        }
    };

    let finished = tokio::select! {
        () = shutdown_signal() => None,
        result = handle.wait() => Some(result),
    };
    let stream_result = match finished {
        Some(result) => result,
        None => handle.shutdown(cfg.shutdown_grace_period()).await,
    };

    if let Err(e) = publisher.close().await {
        tracing::error!(error = %e, "failed to close kafka publisher");
    }

    let snapshot = stats.snapshot();
    info!(
        delivered = snapshot.delivered,
        failed = snapshot.failed,
        "twitter-to-kafka service stopped"
    );

    Ok(exit_code(stream_result))
}

fn exit_code(result: Result<(), IngestionError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "status stream stopped with a fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}
