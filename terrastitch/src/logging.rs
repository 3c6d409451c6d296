//! Logging infrastructure for terrastitch.
//!
//! Structured logging with dual output:
//! - Compact single-line format on stdout for container log collection
//! - Optional non-blocking file writer when a log directory is configured
//! - Configurable via the RUST_LOG environment variable (default `info`)

use std::fs;
use std::io;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard flushes and closes the log file writer.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initializes the global tracing subscriber.
///
/// Always logs to stdout. When `log_dir` is given, also appends to
/// `terrastitch.log` inside it through a non-blocking writer.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created.
pub fn init_logging(log_dir: Option<&str>) -> Result<LoggingGuard, io::Error> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_ansi(true)
        .compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let file_appender = tracing_appender::rolling::never(dir, "terrastitch.log");
            let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking_file)
                .with_ansi(false)
                .compact();

            registry.with(file_layer).init();
            Ok(LoggingGuard {
                _file_guard: Some(file_guard),
            })
        }
        None => {
            registry.init();
            Ok(LoggingGuard { _file_guard: None })
        }
    }
}
