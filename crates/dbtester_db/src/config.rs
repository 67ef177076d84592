//! Data source configuration and backend selection.
//!
//! Backends are compiled in via feature flags; the URL scheme picks one at
//! runtime.
//!
//! # Supported URLs
//!
//! - `duckdb::memory:` - in-memory DuckDB (`duckdb` feature)
//! - `duckdb:<path>` - file-backed DuckDB (`duckdb` feature)
//! - `postgres://...` / `postgresql://...` - PostgreSQL (`postgres` feature)

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::connection::DataSource;
use crate::error::{DbError, Result};

/// Backend family selected by a data source URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    DuckDb,
    Postgres,
}

impl DatabaseType {
    /// Detect the backend from a URL scheme.
    pub fn from_url(url: &str) -> Option<Self> {
        if url.starts_with("duckdb:") {
            Some(Self::DuckDb)
        } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Some(Self::Postgres)
        } else {
            None
        }
    }

    /// Cargo feature that compiles this backend in.
    pub fn feature(&self) -> &'static str {
        match self {
            Self::DuckDb => "duckdb",
            Self::Postgres => "postgres",
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuckDb => write!(f, "DuckDB"),
            Self::Postgres => write!(f, "PostgreSQL"),
        }
    }
}

/// Connection settings for one data source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataSourceConfig {
    /// Connection URL
    #[serde(default = "default_url")]
    pub url: String,

    /// Maximum connections in the pool (ignored by embedded backends)
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Statements run once, right after the data source opens
    #[serde(default)]
    pub init_sql: Vec<String>,
}

fn default_url() -> String {
    "duckdb::memory:".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            max_connections: default_max_connections(),
            init_sql: Vec::new(),
        }
    }
}

impl DataSourceConfig {
    /// Configuration for a URL with default settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Set maximum connections.
    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Add a statement to run when the data source opens.
    pub fn with_init_sql(mut self, sql: impl Into<String>) -> Self {
        self.init_sql.push(sql.into());
        self
    }

    /// Backend selected by the URL.
    pub fn database_type(&self) -> Result<DatabaseType> {
        DatabaseType::from_url(&self.url)
            .ok_or_else(|| DbError::Config(format!("Unsupported database URL: {}", self.url)))
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| DbError::Config(e.to_string()))
    }
}

/// Open a data source for the configured URL.
///
/// Runs `init_sql` on a fresh connection before returning.
pub fn open_data_source(config: &DataSourceConfig) -> Result<Arc<dyn DataSource>> {
    let db_type = config.database_type()?;
    let data_source = open_backend(db_type, config)?;

    if !config.init_sql.is_empty() {
        let mut conn = data_source.connection()?;
        for sql in &config.init_sql {
            conn.execute_batch(sql)?;
        }
        conn.commit()?;
    }

    info!("Opened {} data source", db_type);
    Ok(data_source)
}

#[allow(unused_variables)]
fn open_backend(db_type: DatabaseType, config: &DataSourceConfig) -> Result<Arc<dyn DataSource>> {
    match db_type {
        #[cfg(feature = "duckdb")]
        DatabaseType::DuckDb => {
            let ds = crate::duckdb::DuckDbDataSource::open_from_url(&config.url)?;
            Ok(Arc::new(ds))
        }
        #[cfg(feature = "postgres")]
        DatabaseType::Postgres => {
            let ds = crate::postgres::PgDataSource::connect(&config.url, config.max_connections)?;
            Ok(Arc::new(ds))
        }
        #[allow(unreachable_patterns)]
        other => Err(DbError::NotAvailable(format!(
            "Database type {} not compiled in. Rebuild with the '{}' feature.",
            other,
            other.feature()
        ))),
    }
}
