//! Logging setup for the ctxcap CLI.
//!
//! Diagnostics go to a non-blocking file writer under the data root so that
//! stdout stays reserved for the one-line human-readable command output.
//! `CTXCAP_DEBUG_LOG=1` forces debug level; otherwise `RUST_LOG` applies
//! with an `info` default.

use std::env;

use ctxcap_core::StorageConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "ctxcap.log";

/// Initializes the global subscriber. The returned guard must be held for
/// the lifetime of the process so buffered log lines get flushed.
pub fn init(storage: &StorageConfig) -> Option<WorkerGuard> {
    let debug_enabled = env::var("CTXCAP_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    if std::fs::create_dir_all(storage.logs_dir()).is_err() {
        // No data root to log into; fall back to stderr.
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return None;
    }

    let appender = tracing_appender::rolling::never(storage.logs_dir(), LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Some(guard)
}
