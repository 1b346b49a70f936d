use anyhow::{Context, Result};
use std::env::var;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_forest::ForestLayer;
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Compose multiple layers into a `tracing`'s subscriber.
///
/// The returned guard must be kept alive for the whole process lifetime,
/// otherwise the non-blocking file writer stops draining.
pub fn init_subscriber(
    name: String,
    env_filter: String,
) -> Result<WorkerGuard> {
    // Env variable LOG_CONFIG_PATH points at the path where
    // LOG_CONFIG_FILENAME is located
    let log_config_path =
        var("LOG_CONFIG_PATH").unwrap_or_else(|_| "./".to_string());
    // Env variable LOG_CONFIG_FILENAME names the log file
    let log_config_filename = var("LOG_CONFIG_FILENAME")
        .unwrap_or_else(|_| format!("{}.log", name));

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or(EnvFilter::new(env_filter));

    let file_appender =
        tracing_appender::rolling::never(log_config_path, log_config_filename);
    let (non_blocking_file, guard) =
        tracing_appender::non_blocking(file_appender);

    let mut layers = Vec::new();
    layers.push(env_filter.boxed());
    layers.push(fmt::Layer::default().with_writer(non_blocking_file).boxed());
    layers.push(ForestLayer::default().boxed());

    LogTracer::init().context("Failed to set the log-to-tracing bridge")?;
    tracing_subscriber::registry().with(layers).init();

    Ok(guard)
}
