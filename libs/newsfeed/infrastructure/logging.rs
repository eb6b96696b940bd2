//! Logging initialization
//!
//! Plain or JSON lines on stdout, optionally mirrored to a file without ANSI
//! colours. `RUST_LOG` overrides the configured level.

use crate::config::LoggingConfig;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, Span};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter {0:?}: {1}")]
    Filter(String, String),

    #[error("Failed to open log file {0}: {1}")]
    File(PathBuf, std::io::Error),

    #[error("A global subscriber is already installed")]
    AlreadyInitialized,
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Handle to the installed subscriber
#[derive(Debug)]
pub struct LoggingContext {
    json: bool,
    file: Option<PathBuf>,
}

impl LoggingContext {
    /// Install the global subscriber described by `config`
    pub fn init(config: &LoggingConfig) -> Result<Self, LoggingError> {
        let filter = build_filter(&config.level)?;

        let mut layers: Vec<BoxedLayer> = Vec::new();
        if config.json {
            layers.push(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .boxed(),
            );
        } else {
            layers.push(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_line_number(false)
                    .boxed(),
            );
        }

        if let Some(path) = &config.file {
            let file = open_log_file(path)?;
            layers.push(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(Arc::new(file))
                    .boxed(),
            );
        }

        tracing_subscriber::registry()
            .with(layers)
            .with(filter)
            .try_init()
            .map_err(|_| LoggingError::AlreadyInitialized)?;

        if let Some(path) = &config.file {
            info!("Mirroring logs to {}", path.display());
        }

        Ok(Self {
            json: config.json,
            file: config.file.clone(),
        })
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    pub fn file(&self) -> Option<&PathBuf> {
        self.file.as_ref()
    }

    /// Root span for one feed client instance
    pub fn span(&self, label: &str) -> Span {
        tracing::info_span!("feed", client = %label)
    }
}

fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| LoggingError::Filter(level.to_string(), e.to_string())),
    }
}

fn open_log_file(path: &PathBuf) -> Result<File, LoggingError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| LoggingError::File(path.clone(), e))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| LoggingError::File(path.clone(), e))
}
