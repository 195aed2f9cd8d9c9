//! # Logging Bootstrap
//!
//! Two independent outputs:
//!
//! - Application logs through `tracing`: stdout (text or JSON) plus an
//!   optional daily-rotated file. `RUST_LOG` overrides `LOGGER_LOG_LEVEL`.
//! - The audit stream: plain lines, rotated per `LOGGER_AUDIT_ROTATION`,
//!   written through a non-blocking worker so request handling never waits
//!   on disk.
//!
//! Both return a [`WorkerGuard`] that must be held until shutdown so buffered
//! lines are flushed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::{Layer, Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::config::{AuditConfig, AuditRotation, LoggingConfig};
use crate::middleware::audit::{AuditSink, WriterSink};

type Base = Layered<EnvFilter, Registry>;

/// Install the global tracing subscriber.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("invalid log level: {}", config.level))?;

    let mut layers: Vec<Box<dyn Layer<Base> + Send + Sync>> = Vec::new();
    layers.push(if config.json {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().boxed()
    });

    let guard = match &config.file {
        Some(path) => {
            let appender = rolling_appender(path, Rotation::DAILY)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            layers.push(if config.json {
                layer.json().boxed()
            } else {
                layer.boxed()
            });
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init()
        .context("failed to initialize tracing subscriber")?;

    if let Some(path) = &config.file {
        tracing::info!(path = %path.display(), "application log file enabled");
    }
    Ok(guard)
}

/// Open the audit sink: the configured file, or stdout when none is set.
pub fn audit_sink(config: &AuditConfig) -> Result<(Arc<dyn AuditSink>, WorkerGuard)> {
    let (writer, guard) = match &config.file {
        Some(path) => {
            let appender = rolling_appender(path, rotation(config.rotation))?;
            tracing_appender::non_blocking(appender)
        }
        None => tracing_appender::non_blocking(std::io::stdout()),
    };
    Ok((Arc::new(WriterSink::new(writer)), guard))
}

fn rotation(rotation: AuditRotation) -> Rotation {
    match rotation {
        AuditRotation::Minutely => Rotation::MINUTELY,
        AuditRotation::Hourly => Rotation::HOURLY,
        AuditRotation::Daily => Rotation::DAILY,
        AuditRotation::Never => Rotation::NEVER,
    }
}

fn rolling_appender(path: &Path, rotation: Rotation) -> Result<RollingFileAppender> {
    let (dir, file_name) = split_log_path(path)?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory: {}", dir.display()))?;
    RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(file_name)
        .build(&dir)
        .with_context(|| format!("failed to open log file: {}", path.display()))
}

fn split_log_path(path: &Path) -> Result<(PathBuf, String)> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("log path has no file name: {}", path.display()))?
        .to_string();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_log_path_variants() {
        let (dir, name) = split_log_path(Path::new("./logs/restapi-audit.log")).unwrap();
        assert_eq!(dir, PathBuf::from("./logs"));
        assert_eq!(name, "restapi-audit.log");

        let (dir, name) = split_log_path(Path::new("audit.log")).unwrap();
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(name, "audit.log");

        assert!(split_log_path(Path::new("/")).is_err());
    }

    #[test]
    fn audit_file_sink_writes_lines() {
        let dir = tempfile::tempdir().unwrap();
        let config = AuditConfig {
            file: Some(dir.path().join("nested").join("audit.log")),
            rotation: AuditRotation::Never,
            ..Default::default()
        };

        let (sink, guard) = audit_sink(&config).unwrap();
        sink.write_line("status=200 username=llama").unwrap();
        // Dropping the guard flushes the background worker.
        drop(guard);

        let contents =
            std::fs::read_to_string(dir.path().join("nested").join("audit.log")).unwrap();
        assert_eq!(contents, "status=200 username=llama\n");
    }
}
