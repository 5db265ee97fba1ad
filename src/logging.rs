use std::{fs::File, path::PathBuf};

use color_eyre::eyre::{Result, WrapErr};
use tracing::{error, level_filters::LevelFilter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{self, EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use wallet_agent::config::get_data_dir;

pub const LOG_FILE_NAME: &str = "wallet-agent.log";

pub fn log_path() -> PathBuf {
    get_data_dir().join(LOG_FILE_NAME)
}

/// Send all tracing output to the log file in the data dir. Returns its path.
pub fn init() -> Result<PathBuf> {
    let log_path = log_path();
    if let Some(dir) = log_path.parent() {
        std::fs::create_dir_all(dir)
            .wrap_err_with(|| format!("creating data dir {}", dir.display()))?;
    }
    let log_file = File::create(&log_path)
        .wrap_err_with(|| format!("creating log file {}", log_path.display()))?;

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy()
        .add_directive("wallet_agent=debug".parse()?);

    let file_subscriber = tracing_subscriber::fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(file_subscriber)
        .with(ErrorLayer::default())
        .init();

    Ok(log_path)
}

/// Log a panic with its location and the panicking thread.
pub fn log_panic(panic: &std::panic::PanicHookInfo) {
    let payload = panic.payload();
    let msg = if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    };

    let location = panic.location().map_or_else(
        || "unknown location".to_string(),
        |loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()),
    );

    let thread = std::thread::current();
    error!(
        thread = thread.name().unwrap_or("<unnamed>"),
        "Panic occurred: {} at {}", msg, location
    );
}
