//! File-based logging
//!
//! Logs go to a daily rolling file instead of stdout, since the terminal is
//! owned by the TUI.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

pub const LOG_DIR: &str = ".logs";
const LOG_FILE_PREFIX: &str = "aniliberty-rs";
const DEFAULT_FILTER: &str = "aniliberty_rs=debug,reqwest=info,warn";

/// Initialize the logging system.
///
/// Logs are written to `.logs/aniliberty-rs.YYYY-MM-DD.log`. `RUST_LOG`
/// overrides the default filter. The returned guard flushes the writer when
/// dropped, so keep it alive for the lifetime of the application.
pub fn init_logging() -> anyhow::Result<WorkerGuard> {
    let log_dir = Path::new(LOG_DIR);
    if !log_dir.exists() {
        std::fs::create_dir_all(log_dir)?;
    }

    let file_appender = RollingFileAppender::new(Rotation::DAILY, LOG_DIR, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_span_events(FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::info!("Logging initialized - logs written to {}/", LOG_DIR);

    Ok(guard)
}

/// Log an API request result
#[macro_export]
macro_rules! log_api_result {
    ($operation:expr, $result:expr) => {
        match &$result {
            Ok(_) => tracing::debug!(operation = $operation, "API request successful"),
            Err(e) => tracing::warn!(operation = $operation, error = %e, "API request failed"),
        }
    };
}

/// Log an API request with optional context fields
#[macro_export]
macro_rules! log_api_request {
    ($operation:expr) => {
        tracing::debug!(operation = $operation, "API request started");
    };
    ($operation:expr, $($field:tt)+) => {
        tracing::debug!(operation = $operation, $($field)+, "API request started");
    };
}
