use std::path::PathBuf;

use classroom_core::Error;
use directories::ProjectDirs;
use tracing::subscriber::set_global_default;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer, Registry};

/// Where the rolling log files go
pub fn log_dir() -> PathBuf {
    ProjectDirs::from("com", "gc-cli", "gc-cli")
        .map(|d| d.data_local_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Install the global subscriber: a daily rolling file layer, plus a stderr
/// layer capped at `console` when given. The interactive UI owns the
/// terminal and passes `None`.
///
/// `RUST_LOG` overrides `env_filter` when present.
pub fn init_subscriber(
    name: &str,
    env_filter: &str,
    console: Option<LevelFilter>,
) -> Result<WorkerGuard, Error> {
    LogTracer::init()
        .map_err(|e| Error::Other(format!("failed to initialize log tracer bridge: {}", e)))?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env_filter));

    let console_layer = console.map(|level| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
            .with_filter(level)
    });

    let file_appender = tracing_appender::rolling::daily(log_dir(), format!("{}.log", name));
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer().with_ansi(false).with_writer(non_blocking);

    let subscriber = Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer);

    set_global_default(subscriber)
        .map_err(|e| Error::Other(format!("failed to set global tracing subscriber: {}", e)))?;

    Ok(guard)
}
