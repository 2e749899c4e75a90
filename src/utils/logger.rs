use std::str::FromStr;

use anyhow::Context;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

/// Logging setup for device processes. Stdout by default, rolling files
/// when `file_dir` is set. Thread names are always included so log lines
/// can be attributed to a resource thread.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub level: String,
    pub file_dir: Option<String>,
    pub file_prefix: Option<String>,
    pub rolling: Option<String>,
    pub max_files: usize,
}

impl LoggerConfig {
    /// Reads FBRT_LOG_LEVEL, FBRT_LOG_DIR, FBRT_LOG_PREFIX and
    /// FBRT_LOG_ROLLING, falling back to defaults for anything unset.
    pub fn from_env() -> Self {
        Self {
            level: std::env::var("FBRT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            file_dir: std::env::var("FBRT_LOG_DIR").ok(),
            file_prefix: std::env::var("FBRT_LOG_PREFIX").ok(),
            rolling: std::env::var("FBRT_LOG_ROLLING").ok(),
            ..Self::default()
        }
    }

    fn rotation(&self) -> Rotation {
        match self.rolling.as_deref() {
            Some("hourly") => Rotation::HOURLY,
            Some("minutely") => Rotation::MINUTELY,
            _ => Rotation::DAILY,
        }
    }

    pub fn init(&self) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
        let level = Level::from_str(&self.level).unwrap_or(Level::INFO);
        let fmt = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_thread_names(true);

        let Some(dir) = self.file_dir.as_deref() else {
            let _ = fmt.try_init();
            return Ok(None);
        };

        let appender: RollingFileAppender = RollingFileAppender::builder()
            .rotation(self.rotation())
            .max_log_files(self.max_files.max(1))
            .filename_prefix(self.file_prefix.as_deref().unwrap_or("fbrt"))
            .build(dir)
            .with_context(|| format!("failed to create rolling appender in {dir}"))?;
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = fmt.with_writer(writer).with_ansi(false).try_init();
        Ok(Some(guard))
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_dir: None,
            file_prefix: None,
            rolling: Some("daily".to_string()),
            max_files: 3,
        }
    }
}
