//! Logging through `tracing` and `tracing-subscriber`.
//!
//! - `info`: per-combination progress and run summaries
//! - `debug`: blocked batches, files read and written
//! - `trace`: outputs skipped because an input shares their family
//!
//! `RUST_LOG` overrides the level chosen on the command line.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::ValueEnum;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable, with colors
    #[default]
    Pretty,
    /// Single line per event
    Compact,
    /// One JSON object per event
    Json,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub with_timestamps: bool,
    pub with_ansi: bool,
    pub format: LogFormat,
    /// Logs go to stderr when unset
    pub log_file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            with_timestamps: false,
            with_ansi: true,
            format: LogFormat::default(),
            log_file: None,
        }
    }
}

impl LogConfig {
    /// 0: info, 1 (`-v`): debug, 2+ (`-vv`): trace
    #[must_use]
    pub fn from_verbosity(verbosity: u8) -> Self {
        let level = match verbosity {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        };
        Self {
            level,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// A log file gets timestamps and no ANSI colors
    #[must_use]
    pub fn with_log_file(mut self, path: Option<PathBuf>) -> Self {
        if path.is_some() {
            self.with_ansi = false;
            self.with_timestamps = true;
        }
        self.log_file = path;
        self
    }
}

/// Install the global subscriber. Call once, before any work is logged.
pub fn init_logging(config: &LogConfig) -> io::Result<()> {
    if let Some(path) = &config.log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        init_logging_with_writer(config, SharedFileWriter::new(file));
    } else {
        init_logging_with_writer(config, io::stderr);
    }
    Ok(())
}

fn init_logging_with_writer<W>(config: &LogConfig, writer: W)
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let filter = build_env_filter(config.level);

    match config.format {
        LogFormat::Json => {
            let layer = fmt::layer().json().with_writer(writer);
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .init();
        }
        LogFormat::Compact => {
            let layer = fmt::layer()
                .compact()
                .with_writer(writer)
                .with_ansi(config.with_ansi)
                .with_target(false);
            if config.with_timestamps {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(layer)
                    .init();
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(layer.without_time())
                    .init();
            }
        }
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(config.with_ansi)
                .with_target(false);
            if config.with_timestamps {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(layer)
                    .init();
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(layer.without_time())
                    .init();
            }
        }
    }
}

#[derive(Clone)]
struct SharedFileWriter {
    file: Arc<Mutex<std::fs::File>>,
}

impl SharedFileWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: Arc::new(Mutex::new(file)),
        }
    }
}

struct SharedFileGuard {
    file: Arc<Mutex<std::fs::File>>,
}

impl Write for SharedFileGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))?;
        guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))?;
        guard.flush()
    }
}

impl<'a> MakeWriter<'a> for SharedFileWriter {
    type Writer = SharedFileGuard;

    fn make_writer(&'a self) -> Self::Writer {
        SharedFileGuard {
            file: Arc::clone(&self.file),
        }
    }
}

/// Our crate at `level`, dependencies at warn, unless `RUST_LOG` is set
fn build_env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,census_crosstab={}",
            level.as_str().to_lowercase()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_verbosity() {
        assert_eq!(LogConfig::from_verbosity(0).level, Level::INFO);
        assert_eq!(LogConfig::from_verbosity(1).level, Level::DEBUG);
        assert_eq!(LogConfig::from_verbosity(5).level, Level::TRACE);
    }

    #[test]
    fn test_log_file_disables_colors() {
        let config = LogConfig::default()
            .with_format(LogFormat::Compact)
            .with_log_file(Some(PathBuf::from("run.log")));
        assert!(!config.with_ansi);
        assert!(config.with_timestamps);
        assert_eq!(config.format, LogFormat::Compact);

        let config = LogConfig::default().with_log_file(None);
        assert!(config.with_ansi);
    }
}
