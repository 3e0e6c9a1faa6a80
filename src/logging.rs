//! Tracing setup.
//!
//! Stdout always gets a compact layer filtered by `RUST_LOG` (default `info`). When the
//! configuration names a log file, a second plain-text layer appends to it through a
//! non-blocking writer; the returned guard must outlive the process's logging or buffered
//! lines are lost on shutdown.

use std::fs::File;
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the tracing subscriber, optionally copying logs to `log_file`.
pub fn init_tracing(log_file: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout = fmt::layer().with_target(false).compact();
    let registry = tracing_subscriber::registry().with(filter).with(stdout);

    match log_file.map(open_log_file) {
        Some(Ok(file)) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            registry
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .init();
            Some(guard)
        }
        Some(Err(err)) => {
            registry.init();
            tracing::warn!(error = %err, "Log file unavailable; logging to stdout only");
            None
        }
        None => {
            registry.init();
            None
        }
    }
}

/// Open the log file for appending, creating missing parent directories.
fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
}
