//! Log sink setup for the binary.
//!
//! The library only emits `tracing` events. Whoever runs it decides where they go;
//! the CLI calls [`init_logging`] once at startup. stdout is reserved for JSON output,
//! so human-readable logs go to stderr and, optionally, to an append-only file.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{ClientbookError, Result};

/// Level used when neither `RUST_LOG` nor a flag says otherwise
pub const DEFAULT_LEVEL: &str = "info";

/// Filter from `RUST_LOG` when set and valid, otherwise from `level`
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber: stderr always, plus `log_file` opened in append mode
pub fn init_logging(level: &str, log_file: Option<&Path>) -> Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path).map_err(|e| {
                ClientbookError::config_error(format!(
                    "Could not open log file '{}': {e}",
                    path.display()
                ))
            })?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(build_filter(level))
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .map_err(|e| ClientbookError::config_error(format!("Could not install logger: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_falls_back_to_level() {
        if std::env::var_os("RUST_LOG").is_none() {
            assert_eq!(build_filter("warn").to_string(), "warn");
        }
    }

    #[test]
    fn test_unwritable_log_file_is_config_error() {
        let err = init_logging(DEFAULT_LEVEL, Some(Path::new("/nonexistent/dir/progress.log")))
            .unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }
}
