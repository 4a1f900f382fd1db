//! Structured logging with per-attempt context
//!
//! Every mining attempt runs inside a span carrying the miner, the base
//! tipset, the null-round count and a fresh attempt id, so interleaved
//! attempts can be told apart in the logs.

use crate::core::{Address, TipSet};
use crate::{Error, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{info_span, Span};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter};
use uuid::Uuid;

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level: tracing::Level = (*self).into();
        write!(f, "{}", level.as_str().to_ascii_lowercase())
    }
}

/// Output format of log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact single-line text
    #[default]
    Plain,
    /// Multi-line human-oriented text
    Pretty,
    /// One JSON object per line
    Json,
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides `level` when set. With `file`, output goes through a
/// non-blocking appender; keep the returned guard alive until exit so
/// buffered lines are flushed.
pub fn init_logging(level: LogLevel, format: LogFormat, file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let (writer, guard, ansi) = match file {
        Some(path) => {
            let directory = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| Error::config(format!("invalid log file path {}", path.display())))?;
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), None, true),
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = match format {
        LogFormat::Json => registry
            .with(
                tracing_fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                tracing_fmt::layer()
                    .pretty()
                    .with_writer(writer)
                    .with_ansi(ansi)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init(),
        LogFormat::Plain => registry
            .with(
                tracing_fmt::layer()
                    .with_writer(writer)
                    .with_ansi(ansi)
                    .with_target(false),
            )
            .try_init(),
    };
    installed.map_err(|e| Error::config(format!("failed to install log subscriber: {}", e)))?;

    Ok(guard)
}

/// Context tags for one mining attempt
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Miner address
    pub miner: String,
    /// Key of the base tipset
    pub base: String,
    /// Height of the base, if it has members
    pub base_height: Option<u64>,
    /// Empty rounds since the base
    pub null_block_count: u64,
    /// Unique id of the attempt
    pub attempt_id: Uuid,
}

impl LogContext {
    /// Context for mining on `base`
    pub fn for_attempt(miner: &Address, base: &TipSet, null_block_count: u64) -> Self {
        Self {
            miner: miner.to_string(),
            base: base.key().to_string(),
            base_height: base.height().ok(),
            null_block_count,
            attempt_id: Uuid::new_v4(),
        }
    }

    /// Create a tracing span with this context
    pub fn span(&self) -> Span {
        info_span!(
            "mine",
            miner = %self.miner,
            base = %self.base,
            base_height = self.base_height,
            null_block_count = self.null_block_count,
            attempt = %self.attempt_id,
        )
    }
}

/// Log a worker state transition
#[macro_export]
macro_rules! log_worker_state {
    ($old_state:expr, $new_state:expr $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(
            old_state = %$old_state,
            new_state = %$new_state,
            $($key = %$value,)*
            "worker state changed"
        )
    };
}
