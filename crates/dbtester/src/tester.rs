//! Test lifecycle: one-time setup, per-test cleanup and teardown.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use dbtester_db::{open_data_source, DataSource};
use dbtester_logging::{init_test_logging, LogConfig};
use tracing::{debug, info, warn};

use crate::channel::DatabaseChannel;
use crate::config::DbTesterConfig;
use crate::error::{Result, TesterError};
use crate::table::Table;

type InitFn = Box<dyn Fn(&DatabaseChannel) -> Result<()> + Send + Sync>;

/// Manages a test database for a suite of tests.
///
/// A test harness calls [`before_all`](Self::before_all) once,
/// [`before_each`](Self::before_each) before every test and
/// [`after_all`](Self::after_all) at the end.
pub struct DbTester {
    channel: DatabaseChannel,
    config: DbTesterConfig,
    init_functions: Vec<InitFn>,
    initialized: Mutex<bool>,
}

impl DbTester {
    pub fn new(data_source: Arc<dyn DataSource>) -> Self {
        Self::with_config(data_source, DbTesterConfig::default())
    }

    /// Use an existing data source; `config.datasource` is ignored.
    pub fn with_config(data_source: Arc<dyn DataSource>, config: DbTesterConfig) -> Self {
        Self {
            channel: DatabaseChannel::new(data_source),
            config,
            init_functions: Vec::new(),
            initialized: Mutex::new(false),
        }
    }

    /// Open the configured data source.
    pub fn from_config(config: DbTesterConfig) -> Result<Self> {
        let data_source = open_data_source(&config.datasource)?;
        Ok(Self::with_config(data_source, config))
    }

    /// Run a script file during `before_all`.
    pub fn init_script(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.init_scripts.push(path.into());
        self
    }

    /// Run a function during `before_all`, after the init scripts.
    pub fn init_db<F>(mut self, init: F) -> Self
    where
        F: Fn(&DatabaseChannel) -> Result<()> + Send + Sync + 'static,
    {
        self.init_functions.push(Box::new(init));
        self
    }

    /// Empty these tables, in order, during `before_each`.
    pub fn delete_before_each_test<S: AsRef<str>>(mut self, tables: &[S]) -> Self {
        self.config
            .delete_before_each
            .extend(tables.iter().map(|t| t.as_ref().to_string()));
        self
    }

    pub fn config(&self) -> &DbTesterConfig {
        &self.config
    }

    pub fn channel(&self) -> &DatabaseChannel {
        &self.channel
    }

    pub fn data_source(&self) -> &Arc<dyn DataSource> {
        self.channel.data_source()
    }

    /// Install logging and run init scripts and functions. Only the first
    /// successful call does anything.
    pub fn before_all(&self) -> Result<()> {
        let mut initialized = self
            .initialized
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *initialized {
            return Ok(());
        }

        if let Err(e) = init_test_logging(&LogConfig::from(&self.config.logging)) {
            warn!(error = %e, "Failed to initialize test logging");
        }

        for script in &self.config.init_scripts {
            let count = self.run_script(script)?;
            info!(script = %script.display(), statements = count, "Ran init script");
        }
        for init in &self.init_functions {
            init(&self.channel)?;
        }

        *initialized = true;
        Ok(())
    }

    /// Delete all rows from the configured tables.
    pub fn before_each(&self) -> Result<()> {
        for name in &self.config.delete_before_each {
            let deleted = self.table(name)?.delete_all()?;
            debug!(table = %name, rows = deleted, "Cleared table");
        }
        Ok(())
    }

    /// Shut the database down. Engines that acknowledge shutdown with an
    /// error are treated as having succeeded.
    pub fn after_all(&self) -> Result<()> {
        match self.channel.data_source().shutdown() {
            Ok(()) => Ok(()),
            Err(e) if e.is_expected_shutdown() => {
                debug!(state = ?e.sql_state(), "Database acknowledged shutdown");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// A table by dotted name.
    pub fn table(&self, name: &str) -> Result<Table> {
        let metadata = self.channel.metadata().get_table(name)?;
        Ok(Table::new(self.channel.clone(), metadata))
    }

    /// Run one statement and commit.
    pub fn execute(&self, sql: &str) -> Result<u64> {
        self.channel.execute(sql)
    }

    /// Run every statement of a script file, returning how many ran.
    pub fn run_script(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let script = std::fs::read_to_string(path)?;
        self.run_script_str(&path.display().to_string(), &script)
    }

    /// Run every statement of a script held in memory. `name` labels errors.
    pub fn run_script_str(&self, name: &str, script: &str) -> Result<usize> {
        let statements = self
            .config
            .script
            .splitter()
            .split(script)
            .map_err(|e| match e {
                TesterError::ScriptSyntax(message) => {
                    TesterError::ScriptSyntax(format!("{}: {}", name, message))
                }
                other => other,
            })?;
        for (i, statement) in statements.iter().enumerate() {
            self.channel
                .execute_batch(statement)
                .map_err(|e| TesterError::Script {
                    script: name.to_string(),
                    index: i + 1,
                    statement: statement.clone(),
                    source: Box::new(e),
                })?;
        }
        Ok(statements.len())
    }
}
