use std::{path::Path, sync::LazyLock};

use anyhow::Result;
use tracing::{level_filters::LevelFilter, Level, Subscriber};
use tracing_appender::rolling::Rotation;
use tracing_subscriber::{
    fmt::{format::FmtSpan, writer::MakeWriterExt},
    util::SubscriberInitExt,
    EnvFilter,
};

pub const LOG_PREFIX: &str = "coldsheet";

/// Stdout belongs to the status line, so the console only ever receives warnings and errors on
/// stderr. When `log_dir` is set everything passing the filter also lands in a daily log file.
pub fn enable_logging(log_dir: Option<&Path>, log_level: Option<LevelFilter>) -> Result<()> {
    build_subscriber(log_dir, log_level)?.init();
    Ok(())
}

fn build_subscriber(
    log_dir: Option<&Path>,
    log_level: Option<LevelFilter>,
) -> Result<Box<dyn Subscriber + Send + Sync>> {
    let appender = log_dir
        .map(|dir| {
            tracing_appender::rolling::Builder::new()
                .rotation(Rotation::DAILY)
                .max_log_files(5)
                .filename_prefix(LOG_PREFIX)
                .build(dir)
        })
        .transpose()?;

    let stderr = std::io::stderr.with_max_level(Level::WARN);

    let level = log_level
        .map(|v| v.to_string())
        .unwrap_or_else(|| std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!(
            "{}={level}",
            env!("CARGO_PKG_NAME").replace("-", "_"),
        )))
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(false);

    // The writer is part of the subscriber's type, hence one branch per writer.
    Ok(match appender {
        Some(appender) => Box::new(builder.with_writer(stderr.and(appender)).finish()),
        None => Box::new(builder.with_writer(stderr).finish()),
    })
}

pub static TEST_LOGGING: LazyLock<()> = LazyLock::new(|| {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_test_writer()
        .pretty()
        .init()
});
