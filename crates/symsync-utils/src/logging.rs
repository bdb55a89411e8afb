//! # Logging Utilities
//!
//! Logging infrastructure for symsync using `tracing`.
//!
//! Console output goes to **stderr**: symsync prints debugger commands on
//! stdout, and log lines must never end up in that stream.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use symsync_utils::init_logging;
//!
//! // Initialize with default settings (reads from RUST_LOG env var)
//! init_logging().expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level filter (e.g., `RUST_LOG=debug`, `RUST_LOG=symsync_core=trace`)
//! - `SYMSYNC_LOG_FORMAT`: Set output format (`json` or `pretty`, default: `pretty`)
//! - `SYMSYNC_LOG_FILE`: Optional path to an additional, daily rotated log file

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;
use std::{env, io};

use chrono::Local;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Keeps the background file writer alive for the rest of the process.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat
{
    /// Pretty-printed, human-readable format (default)
    Pretty,
    /// JSON format, one object per line
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "dev" | "development" => Ok(LogFormat::Pretty),
            "json" | "prod" | "production" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(format!(
                "{s}. Use 'pretty' or 'json'"
            ))),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    /// Error level
    Error,
    /// Warning level
    Warn,
    /// Info level (default)
    Info,
    /// Debug level
    Debug,
    /// Trace level (most verbose)
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLevel(format!(
                "{s}. Use 'error', 'warn', 'info', 'debug', or 'trace'"
            ))),
        }
    }
}

/// Initialize logging with default settings
///
/// Reads configuration from environment variables:
/// - `RUST_LOG`: Log level filter (e.g., `debug`, `symsync_core=debug`)
/// - `SYMSYNC_LOG_FORMAT`: Output format (`json` or `pretty`, default: `pretty`)
/// - `SYMSYNC_LOG_FILE`: Optional path to log file
///
/// ## Errors
///
/// Returns an error if logging is already initialized or the log file
/// directory cannot be used.
pub fn init_logging() -> Result<(), LoggingError>
{
    // Read format from environment or default to pretty
    let format = env::var("SYMSYNC_LOG_FORMAT")
        .ok()
        .and_then(|s| LogFormat::from_str(&s).ok())
        .unwrap_or(LogFormat::Pretty);

    let log_file = env::var("SYMSYNC_LOG_FILE").ok().map(PathBuf::from);
    init_console(format, default_filter, log_file.as_deref())
}

/// Initialize logging with explicit level and format
///
/// `RUST_LOG` is ignored; the level applies to every target.
///
/// ```rust,no_run
/// use symsync_utils::{LogFormat, LogLevel, init_logging_with_level};
///
/// init_logging_with_level(LogLevel::Debug, LogFormat::Pretty)
///     .expect("Failed to initialize logging");
/// ```
///
/// ## Errors
///
/// Returns an error if logging is already initialized.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<(), LoggingError>
{
    init_console(format, || EnvFilter::new(Level::from(level).to_string()), None)
}

/// Initialize file-only logging in `dir`
///
/// Nothing is written to the console. The log file is named
/// `YYYY-MM-DD-symsync.log` after the local date; `dir` is created if needed.
/// Returns the path of the log file.
///
/// ## Arguments
///
/// * `level` - Optional log level. If `None`, uses `RUST_LOG` or defaults to `INFO`.
///
/// ## Errors
///
/// Returns an error if logging is already initialized or `dir` cannot be
/// created.
pub fn init_logging_to_dir(dir: &Path, level: Option<LogLevel>) -> Result<PathBuf, LoggingError>
{
    std::fs::create_dir_all(dir)?;
    let file_name = format!("{}-symsync.log", Local::now().format("%Y-%m-%d"));

    // Priority:
    // 1. Explicit level (from the --log-level CLI flag)
    // 2. RUST_LOG, which allows module-specific filters like "symsync_core=debug"
    // 3. INFO
    let filter = match level {
        Some(level) => EnvFilter::new(Level::from(level).to_string()),
        None => default_filter(),
    };

    // The date is already in the file name, so never rotate
    let file_appender = tracing_appender::rolling::never(dir, &file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_ansi(false) // No ANSI in files
        .with_filter(filter);

    Registry::default()
        .with(file_layer)
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;
    let _ = FILE_GUARD.set(guard);

    Ok(dir.join(file_name))
}

/// `RUST_LOG`, falling back to `INFO`.
fn default_filter() -> EnvFilter
{
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()))
}

/// Each layer gets its own filter from `filter`.
fn init_console(format: LogFormat, filter: impl Fn() -> EnvFilter, log_file: Option<&Path>) -> Result<(), LoggingError>
{
    // Console and file layers differ in type, so compose them as boxed layers
    let mut layers: Vec<BoxedLayer> = Vec::with_capacity(2);

    if let Some(path) = log_file {
        let dir = path.parent().filter(|dir| !dir.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let name = path
            .file_name()
            .ok_or_else(|| LoggingError::InvalidFormat(format!("log file path has no file name: {}", path.display())))?;
        let file_appender = tracing_appender::rolling::daily(dir, name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let _ = FILE_GUARD.set(guard);
        layers.push(
            fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_timer(ChronoUtc::rfc_3339())
                .with_ansi(false) // No ANSI in files
                .with_filter(filter())
                .boxed(),
        );
    }

    let console_layer: BoxedLayer = match format {
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(true)
            .with_writer(io::stderr)
            .with_filter(filter())
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(io::stderr)
            .with_filter(filter())
            .boxed(),
    };
    layers.push(console_layer);

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Invalid log format: {0}")]
    InvalidFormat(String),

    /// Invalid log level
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    /// Failed to initialize logging
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}
