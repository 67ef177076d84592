//! Shared logging setup for test binaries using DbTester.
//!
//! A test process installs one global subscriber. Test harnesses call
//! [`init_test_logging`] from every suite's setup hook, so installation is
//! guarded: the first call wins and later calls are no-ops.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Default filter. Embedded engines and the pool are only heard from on warnings.
pub const DEFAULT_LOG_FILTER: &str = "dbtester=info,dbtester_db=info,duckdb=warn,sqlx=warn";

static INSTALLED: OnceLock<()> = OnceLock::new();

/// Logging configuration for a test process.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Filter directives; `RUST_LOG` wins when set, then this, then [`DEFAULT_LOG_FILTER`].
    pub filter: Option<String>,
    /// Also append plain-text logs to this file.
    pub log_file: Option<PathBuf>,
    /// Log statement spans (`dbtester_db=debug`) on the console.
    pub verbose: bool,
}

impl LogConfig {
    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let mut directives = self
                .filter
                .clone()
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
            if self.verbose {
                directives.push_str(",dbtester_db=debug");
            }
            EnvFilter::new(directives)
        })
    }
}

/// Whether a subscriber has been installed by this crate.
pub fn is_initialized() -> bool {
    INSTALLED.get().is_some()
}

/// Install the global subscriber once.
///
/// Console output goes through the test writer so `cargo test` captures it per
/// test. If another subscriber is already installed globally, this is a no-op.
pub fn init_test_logging(config: &LogConfig) -> Result<()> {
    if is_initialized() {
        return Ok(());
    }

    let mut outcome = Ok(());
    INSTALLED.get_or_init(|| {
        outcome = install(config);
    });
    outcome
}

fn install(config: &LogConfig) -> Result<()> {
    let file_layer = match &config.log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create log directory: {}", parent.display())
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_filter(config.env_filter()),
            )
        }
        None => None,
    };

    let installed = tracing_subscriber::registry()
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_test_writer()
                .with_filter(config.env_filter()),
        )
        .try_init();

    if installed.is_err() {
        tracing::debug!("Global subscriber already installed; keeping it");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let tmp = tempfile::TempDir::new().unwrap();
        let log_file = tmp.path().join("logs").join("test.log");
        let config = LogConfig {
            filter: Some("dbtester_logging=debug".to_string()),
            log_file: Some(log_file.clone()),
            verbose: false,
        };

        init_test_logging(&config).unwrap();
        assert!(is_initialized());
        assert!(log_file.exists());

        // second call must not try to install again
        init_test_logging(&LogConfig::default()).unwrap();
    }

    #[test]
    fn test_verbose_adds_statement_spans() {
        let config = LogConfig {
            filter: Some("warn".to_string()),
            log_file: None,
            verbose: true,
        };
        if std::env::var("RUST_LOG").is_err() {
            assert!(config.env_filter().to_string().contains("dbtester_db=debug"));
        }
    }
}
