//! Logging configuration module
//!
//! Console output plus an optional rotating JSON log file.

use std::io;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    /// Directory for the log file; console only when unset
    pub file_path: Option<PathBuf>,
    pub rotation: LogRotation,
    /// Use JSON formatting on the console too
    pub json_format: bool,
}

/// Log rotation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Hourly,
    Daily,
    Never,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: None,
            rotation: LogRotation::Daily,
            json_format: false,
        }
    }
}

impl From<&config::LoggingConfig> for LoggingConfig {
    fn from(settings: &config::LoggingConfig) -> Self {
        Self {
            level: settings.level.clone(),
            file_path: settings
                .file_logging_enabled
                .then(|| settings.log_dir.clone()),
            rotation: LogRotation::Daily,
            json_format: settings.json_format,
        }
    }
}

impl LoggingConfig {
    /// Initialize logging based on configuration
    ///
    /// The returned guard flushes the file writer on drop and must be held
    /// for the lifetime of the process.
    pub fn init(&self) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        let console_layer = if self.json_format {
            fmt::layer().json().with_writer(io::stdout).boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_writer(io::stdout)
                .boxed()
        };

        let (file_layer, guard) = match self.file_path {
            Some(ref path) => {
                std::fs::create_dir_all(path)?;
                let file_appender = match self.rotation {
                    LogRotation::Hourly => rolling::hourly(path, "clustergate.log"),
                    LogRotation::Daily => rolling::daily(path, "clustergate.log"),
                    LogRotation::Never => rolling::never(path, "clustergate.log"),
                };
                let (writer, guard) = non_blocking(file_appender);

                let layer = fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_ansi(false)
                    .json()
                    .with_writer(writer);
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()?;

        tracing::info!("Logging initialized - level: {}", self.level);

        Ok(guard)
    }
}
