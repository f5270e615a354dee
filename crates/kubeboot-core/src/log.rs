//! Logging system for kubeboot.
//!
//! Console output goes to stderr and honours `KUBEBOOT_LOG` (an
//! `EnvFilter` directive). Each configured [`LogConfig`] adds a file output
//! with its own level and format, written through a non-blocking appender.

use chrono::Local;
use kubeboot_types::{KubebootError, LogConfig, LogFormat, LogLevel, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

/// Environment variable holding the console filter directive.
pub const LOG_ENV: &str = "KUBEBOOT_LOG";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize logging from configuration.
///
/// `console` is the stderr level used when `KUBEBOOT_LOG` is unset. The
/// returned guards flush the file outputs when dropped and must be kept
/// alive for the lifetime of the program.
pub fn init_from_config(configs: &[LogConfig], console: LogLevel) -> Result<Vec<WorkerGuard>> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(console_directive(console)));

    let mut layers: Vec<BoxedLayer> = vec![fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter)
        .boxed()];

    let mut guards = Vec::with_capacity(configs.len());
    for config in configs {
        let (layer, guard) = file_layer(config)?;
        layers.push(layer);
        guards.push(guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| KubebootError::Config(format!("Failed to initialise logging: {}", e)))?;

    Ok(guards)
}

fn file_layer(config: &LogConfig) -> Result<(BoxedLayer, WorkerGuard)> {
    let path = expand_log_path(&config.path);
    let (dir, file_name) = split_log_path(&path)?;

    std::fs::create_dir_all(&dir).map_err(|e| KubebootError::persistence(&dir, e))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(&dir)
        .map_err(|e| KubebootError::Config(format!("Cannot open log file {}: {}", path.display(), e)))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let level = level_filter(config.level);
    let layer = match config.format {
        LogFormat::Pretty => fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_filter(level)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_filter(level)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(writer)
            .with_ansi(false)
            .with_filter(level)
            .boxed(),
    };

    Ok((layer, guard))
}

/// Substitute `{date}` and expand `~` in a log path template.
pub fn expand_log_path(template: &str) -> PathBuf {
    let date = Local::now().format("%Y-%m-%d").to_string();
    crate::util::fs::expand_path(template.replace("{date}", &date))
}

fn split_log_path(path: &Path) -> Result<(PathBuf, String)> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| KubebootError::Config(format!("Log path has no file name: {}", path.display())))?
        .to_string();

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    Ok((dir, file_name))
}

fn console_directive(level: LogLevel) -> String {
    format!("kubeboot={}", level_filter(level))
}

/// Map a configured level onto a tracing filter.
pub fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::None => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    }
}
