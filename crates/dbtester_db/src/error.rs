//! Error types for the connection layer.

use thiserror::Error;

/// Connection layer result type.
pub type Result<T> = std::result::Result<T, DbError>;

/// SQL state reported by embedded engines when the whole system shuts down cleanly.
pub const SQL_STATE_SYSTEM_SHUTDOWN: &str = "XJ015";

/// SQL state reported by embedded engines when a single database shuts down cleanly.
pub const SQL_STATE_DATABASE_SHUTDOWN: &str = "08006";

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    /// Statement preparation, binding, execution or commit failed.
    #[error("SQL error: {message} [{sql}]")]
    Sql {
        sql: String,
        message: String,
        sql_state: Option<String>,
    },

    /// Could not obtain a connection.
    #[error("Connection error: {0}")]
    Connect(String),

    /// Driver metadata could not be read.
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// A value could not be converted to or from a database value.
    #[error("Type conversion error: {0}")]
    TypeConversion(String),

    /// Caller supplied invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Backend not compiled in or URL scheme unsupported.
    #[error("Backend not available: {0}")]
    NotAvailable(String),

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (file system operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "duckdb")]
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[cfg(feature = "postgres")]
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

impl DbError {
    /// Create a SQL error attributed to a statement.
    pub fn sql(sql: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Sql {
            sql: sql.into(),
            message: message.into(),
            sql_state: None,
        }
    }

    /// Create a SQL error carrying a vendor SQL state.
    pub fn sql_with_state(
        sql: impl Into<String>,
        message: impl Into<String>,
        sql_state: impl Into<String>,
    ) -> Self {
        Self::Sql {
            sql: sql.into(),
            message: message.into(),
            sql_state: Some(sql_state.into()),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a type conversion error.
    pub fn conversion(msg: impl Into<String>) -> Self {
        Self::TypeConversion(msg.into())
    }

    /// SQL state attached to the error, if the driver reported one.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Sql { sql_state, .. } => sql_state.as_deref(),
            _ => None,
        }
    }

    /// Whether this error is an embedded engine acknowledging a shutdown request.
    ///
    /// Such engines report a successful shutdown by failing the shutdown call
    /// with one of two well-known SQL states.
    pub fn is_expected_shutdown(&self) -> bool {
        matches!(
            self.sql_state(),
            Some(SQL_STATE_SYSTEM_SHUTDOWN) | Some(SQL_STATE_DATABASE_SHUTDOWN)
        )
    }
}
