use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Console logging, plus an appended log file when `file` is given.
///
/// `RUST_LOG` overrides the level; otherwise `info`, or `debug` when verbose.
pub fn init(file: Option<&Path>, verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("jobcrawl={}", default_level)));

    let console = fmt::layer().with_target(false).compact();

    let (file_layer, file_error) = match file.map(open_log_file) {
        Some(Ok(handle)) => (
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(handle)),
            ),
            None,
        ),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .init();

    if let Some(e) = file_error {
        warn!(error = %e, "error creating log file, logging to console only");
    }
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}
