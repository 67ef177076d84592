//! Error types for the test toolkit.

use std::path::PathBuf;

use dbtester_db::DbError;
use thiserror::Error;

/// Toolkit result type.
pub type Result<T> = std::result::Result<T, TesterError>;

/// Toolkit errors.
///
/// Assertion failures are not represented here; matchers report those as
/// [`Mismatch`](crate::Mismatch) values.
#[derive(Error, Debug)]
pub enum TesterError {
    /// Caller supplied a bad identifier, column list or condition.
    #[error("{0}")]
    InvalidArgument(String),

    /// A statement failed to prepare, bind, execute or commit.
    #[error("{}", describe_sql_failure(.sql, .source))]
    Sql {
        sql: String,
        #[source]
        source: DbError,
    },

    /// Driver metadata could not be read for a table.
    #[error("Error reading metadata for table '{table}': {source}")]
    Metadata {
        table: String,
        #[source]
        source: DbError,
    },

    /// Driver metadata could not be read while resolving the database flavor.
    #[error("Error resolving database flavor: {0}")]
    Flavor(#[source] DbError),

    /// The driver knows no table by this name.
    #[error("Non-existent table '{0}'")]
    NonExistentTable(String),

    /// A query returned more rows than the caller allows.
    #[error("Unexpected row count: {0}")]
    UnexpectedRowCount(String),

    /// A script could not be split into statements.
    #[error("Malformed SQL script: {0}")]
    ScriptSyntax(String),

    /// A script statement failed. `index` is 1-based.
    #[error("Error running statement #{index} of script {script}: {source}\n{statement}")]
    Script {
        script: String,
        index: usize,
        statement: String,
        #[source]
        source: Box<TesterError>,
    },

    /// CSV text could not be parsed.
    #[error("CSV error: {0}")]
    Csv(String),

    /// A CSV field could not be converted to the column's type.
    #[error("Can't convert value '{value}' for column '{column}': {message}")]
    Conversion {
        column: String,
        value: String,
        message: String,
    },

    /// Configuration file could not be read or parsed.
    #[error("Configuration error in {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    /// IO error (file system operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl TesterError {
    /// Create an invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Wrap a driver error with the statement that caused it.
    pub fn sql(sql: impl Into<String>, source: DbError) -> Self {
        Self::Sql {
            sql: sql.into(),
            source,
        }
    }

    /// Whether the underlying driver error is an expected shutdown signal.
    pub fn is_expected_shutdown(&self) -> bool {
        match self {
            Self::Db(e) | Self::Sql { source: e, .. } => e.is_expected_shutdown(),
            _ => false,
        }
    }
}

fn describe_sql_failure(sql: &str, source: &DbError) -> String {
    match source {
        DbError::Sql { message, .. } => format!("Error executing SQL [{}]: {}", sql, message),
        other => format!("Error executing SQL [{}]: {}", sql, other),
    }
}
