//! Logging infrastructure for the bridge.
//!
//! Structured logging with dual output: a session log file (cleared on
//! startup) plus stdout for interactive tailing. Filterable via the
//! `RUST_LOG` environment variable, defaulting to `info`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Options for [`init_logging`].
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Directory for the session log file.
    pub directory: PathBuf,

    /// Log file name within the directory.
    pub file_name: String,

    /// Also mirror log output to stdout.
    pub stdout: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            file_name: "simbridge.log".to_string(),
            stdout: true,
        }
    }
}

/// Keeps the non-blocking file writer alive.
///
/// Dropping the guard flushes and closes the session log.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Initialize the global subscriber.
///
/// Creates the log directory if needed and truncates any previous session
/// log. Must be called at most once per process; the returned guard has to
/// outlive all logging.
pub fn init_logging(options: &LogOptions) -> Result<LoggingGuard, io::Error> {
    fs::create_dir_all(&options.directory)?;

    // Truncate the previous session's log.
    let log_path = Path::new(&options.directory).join(&options.file_name);
    fs::write(&log_path, "")?;

    let file_appender = tracing_appender::rolling::never(&options.directory, &options.file_name);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_target(true)
        .compact();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    if options.stdout {
        let stdout_layer = tracing_subscriber::fmt::layer()
            .with_writer(io::stdout)
            .with_ansi(true)
            .compact();
        registry.with(stdout_layer).init();
    } else {
        registry.init();
    }

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_options() {
        let options = LogOptions::default();
        assert_eq!(options.directory, PathBuf::from("logs"));
        assert_eq!(options.file_name, "simbridge.log");
        assert!(options.stdout);
    }

    #[test]
    fn test_previous_session_log_is_truncated() {
        // init_logging installs a global subscriber that can only be set once
        // per process, so only the file handling is exercised here.
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("simbridge.log");
        fs::write(&log_path, "old session output").unwrap();

        fs::write(&log_path, "").unwrap();
        assert_eq!(fs::read_to_string(&log_path).unwrap(), "");
    }

    #[test]
    fn test_nested_log_directory_is_created() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("deep").join("logs");
        fs::create_dir_all(&nested).unwrap();
        assert!(nested.exists());
    }
}
