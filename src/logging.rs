//! Logging infrastructure - structured tracing for the marshaling core
//!
//! Design: Uses `tracing` for structured, contextual logging with:
//! - Configurable level through `NATIVE_BRIDGE_LOG_*` or `RUST_LOG`
//! - Zero-cost when disabled (hot paths log at trace level only)
//! - Optional JSON output and file output with daily rotation

use crate::config::LoggingConfig;
use crate::pin::PinMode;
use once_cell::sync::OnceCell;
use std::io;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

// Re-export tracing macros for use throughout the crate
pub use tracing::{debug, error, info, trace, warn, Level};

/// Global logging state; holds the file writer guard when file output is on
static LOGGER: OnceCell<Option<WorkerGuard>> = OnceCell::new();

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default log level
    pub level: Level,
    /// Log file path, if file output is wanted
    pub log_path: Option<PathBuf>,
    /// JSON instead of human-readable lines
    pub json_format: bool,
    /// Show span events (enter/exit)
    pub show_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            log_path: None,
            json_format: false,
            show_spans: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // NATIVE_BRIDGE_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level) = std::env::var("NATIVE_BRIDGE_LOG_LEVEL") {
            config.level = level.parse().unwrap_or(Level::INFO);
        }

        if let Ok(path) = std::env::var("NATIVE_BRIDGE_LOG_FILE") {
            config.log_path = Some(PathBuf::from(path));
        }

        config.json_format = std::env::var("NATIVE_BRIDGE_LOG_JSON").is_ok();
        config.show_spans = std::env::var("NATIVE_BRIDGE_LOG_SPANS").is_ok();

        config
    }

    /// Minimal logging for production shims
    pub fn performance() -> Self {
        Self {
            level: Level::ERROR,
            ..Self::default()
        }
    }

    /// Everything, including per-call trace events
    pub fn debug() -> Self {
        Self {
            level: Level::TRACE,
            show_spans: true,
            ..Self::default()
        }
    }
}

impl From<&LoggingConfig> for LogConfig {
    fn from(config: &LoggingConfig) -> Self {
        Self {
            level: config.level.parse().unwrap_or(Level::INFO),
            log_path: config.file.clone(),
            json_format: config.json,
            show_spans: config.spans,
        }
    }
}

/// Initialize logging from the environment
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Initialize logging with a custom configuration; later calls are no-ops
pub fn init_with_config(config: LogConfig) {
    LOGGER.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "native_bridge={}",
                config.level.as_str().to_lowercase()
            ))
        });

        let span_events = if config.show_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let console = if config.json_format {
            fmt::layer()
                .json()
                .with_writer(io::stderr)
                .with_span_events(span_events.clone())
                .boxed()
        } else {
            fmt::layer()
                .with_writer(io::stderr)
                .with_span_events(span_events.clone())
                .with_target(true)
                .with_thread_ids(cfg!(debug_assertions))
                .with_line_number(cfg!(debug_assertions))
                .boxed()
        };

        let (file_layer, guard) = match file_writer(config.log_path.as_ref()) {
            Some((writer, guard)) => (
                Some(
                    fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_span_events(span_events)
                        .boxed(),
                ),
                Some(guard),
            ),
            None => (None, None),
        };

        // Another subscriber may already be installed by the host process
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(console)
            .with(file_layer)
            .try_init();

        guard
    });
}

fn file_writer(
    path: Option<&PathBuf>,
) -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let path = path?;
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = path.file_name()?;
    let appender = tracing_appender::rolling::daily(directory, file_name);
    Some(tracing_appender::non_blocking(appender))
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER.get().is_some()
}

// ============================================================================
// Marshaling-specific logging functions
// ============================================================================

/// Log a field-accessor cache population
pub fn log_cache_populated(structure: &str, class: &str, accessors: usize) {
    debug!(
        event = "cache_populated",
        structure,
        class,
        accessors,
        "Field accessors cached"
    );
}

/// Log a failed cache population
pub fn log_cache_failure(structure: &str, error: &str) {
    warn!(
        event = "cache_failed",
        structure,
        error,
        "Field accessor resolution failed"
    );
}

/// Log buffer pin acquisition
#[inline]
pub fn log_pin(mode: PinMode, bytes: usize) {
    trace!(event = "pin", mode = ?mode, bytes, "Buffer pinned");
}

/// Log buffer release
#[inline]
pub fn log_release(mode: PinMode, bytes: usize, commit: bool) {
    trace!(event = "release", mode = ?mode, bytes, commit, "Buffer released");
}

/// Log a dispatched native call
#[inline]
pub fn log_native_call(module: &str, function: &str) {
    trace!(event = "native_call", module, function, "Native function called");
}

/// Log a call aborted by the core before or after the native call
pub fn log_call_failure(function: &str, error: &str) {
    error!(
        event = "call_failed",
        function,
        error,
        "Native call aborted"
    );
}
