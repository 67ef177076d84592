//! Tester configuration, loadable from TOML.
//!
//! ```toml
//! init_scripts = ["schema.sql"]
//! delete_before_each = ["order_lines", "orders"]
//!
//! [datasource]
//! url = "duckdb::memory:"
//!
//! [script]
//! delimiter = ";"
//!
//! [logging]
//! verbose = true
//! ```

use std::path::{Path, PathBuf};

use dbtester_db::DataSourceConfig;
use dbtester_logging::LogConfig;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TesterError};
use crate::script::{
    ScriptSplitter, DEFAULT_BLOCK_COMMENT_END, DEFAULT_BLOCK_COMMENT_START, DEFAULT_DELIMITER,
    DEFAULT_LINE_COMMENT,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DbTesterConfig {
    #[serde(default)]
    pub datasource: DataSourceConfig,

    /// Scripts run once by `before_all`, in order. Relative paths in a loaded
    /// file are resolved against the file's directory.
    #[serde(default)]
    pub init_scripts: Vec<PathBuf>,

    /// Tables emptied by `before_each`, in order.
    #[serde(default)]
    pub delete_before_each: Vec<String>,

    #[serde(default)]
    pub script: ScriptConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DbTesterConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content).map_err(|e| TesterError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if let Some(base) = path.parent() {
            for script in &mut config.init_scripts {
                if script.is_relative() {
                    *script = base.join(&*script);
                }
            }
        }
        Ok(config)
    }
}

/// Script splitting markers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScriptConfig {
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default = "default_line_comment")]
    pub line_comment: String,
    #[serde(default = "default_block_comment_start")]
    pub block_comment_start: String,
    #[serde(default = "default_block_comment_end")]
    pub block_comment_end: String,
}

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

fn default_line_comment() -> String {
    DEFAULT_LINE_COMMENT.to_string()
}

fn default_block_comment_start() -> String {
    DEFAULT_BLOCK_COMMENT_START.to_string()
}

fn default_block_comment_end() -> String {
    DEFAULT_BLOCK_COMMENT_END.to_string()
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            line_comment: default_line_comment(),
            block_comment_start: default_block_comment_start(),
            block_comment_end: default_block_comment_end(),
        }
    }
}

impl ScriptConfig {
    pub fn splitter(&self) -> ScriptSplitter {
        ScriptSplitter::new()
            .with_delimiter(self.delimiter.clone())
            .with_line_comment(self.line_comment.clone())
            .with_block_comment(self.block_comment_start.clone(), self.block_comment_end.clone())
    }
}

/// Test logging settings, see [`LogConfig`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub verbose: bool,
}

impl From<&LoggingConfig> for LogConfig {
    fn from(config: &LoggingConfig) -> Self {
        LogConfig {
            filter: config.filter.clone(),
            log_file: config.log_file.clone(),
            verbose: config.verbose,
        }
    }
}
