//! Logging setup for docrag

use std::path::Path;

use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Registry;

use crate::config::AppConfig;
use crate::Result;

/// Initialize console and file logging at the given level.
pub fn init_logging_with_level(level: &str) -> Result<()> {
    let logs_dir = Path::new("logs");
    if !logs_dir.exists() {
        std::fs::create_dir_all(logs_dir)?;
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},docrag={level}")));

    let file_appender = tracing_appender::rolling::daily("logs", "docrag.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_writer(non_blocking)
        .with_ansi(false);

    Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!("Logging initialized with level: {}", level);

    // The appender guard must outlive the process for the file writer to flush.
    std::mem::forget(guard);

    Ok(())
}

/// Initialize logging from application configuration.
pub fn init_logging(config: &AppConfig) -> Result<()> {
    if config.logging.backtrace {
        std::env::set_var("RUST_BACKTRACE", "1");
    }
    init_logging_with_level(&config.logging.level)
}
