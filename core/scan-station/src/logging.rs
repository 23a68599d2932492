//! Logging setup for scan-station.
//!
//! Stdout belongs to operator toasts, so logs go to a daily rolling file under
//! `~/.scan-station/logs/`. When that directory cannot be created, logs fall
//! back to stderr.

use std::env;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const DEBUG_ENV: &str = "SCAN_STATION_DEBUG_LOG";
const LOG_FILE_PREFIX: &str = "scan-station.log";

/// Installs the global subscriber. Keep the returned guard alive for the
/// whole process; dropping it flushes and stops the file writer.
pub fn init() -> Option<WorkerGuard> {
    let filter = build_filter(debug_enabled());

    match log_dir().and_then(|dir| fs_err::create_dir_all(&dir).ok().map(|_| dir)) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .try_init();
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .try_init();
            None
        }
    }
}

fn debug_enabled() -> bool {
    env::var(DEBUG_ENV)
        .map(|value| is_truthy(&value))
        .unwrap_or(false)
}

fn is_truthy(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES")
}

fn build_filter(debug: bool) -> EnvFilter {
    if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

fn log_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".scan-station").join("logs"))
}
