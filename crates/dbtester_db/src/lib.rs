//! Connection layer for DbTester.
//!
//! This crate defines what the test toolkit needs from a database: a
//! [`DataSource`] handing out [`Connection`]s, prepared [`Statement`]s with
//! positional bindings, and [`DatabaseMetadata`] for introspection. Concrete
//! backends are compiled in via feature flags.
//!
//! # Usage
//!
//! ```rust,ignore
//! use dbtester_db::{open_data_source, DataSourceConfig, DbValue, SqlType};
//!
//! let ds = open_data_source(&DataSourceConfig::new("duckdb::memory:"))?;
//! let mut conn = ds.connection()?;
//! conn.execute_batch("CREATE TABLE t (id BIGINT)")?;
//!
//! let mut stmt = conn.prepare("INSERT INTO t VALUES (?)")?;
//! stmt.bind(1, &DbValue::from(1_i64), SqlType::BigInt)?;
//! stmt.execute_update()?;
//! ```

mod config;
mod connection;
mod error;
mod types;
mod value;

#[cfg(any(feature = "duckdb", feature = "postgres"))]
mod trace;

#[cfg(feature = "duckdb")]
pub mod duckdb;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use config::{open_data_source, DataSourceConfig, DatabaseType};
pub use connection::{
    ColumnInfo, Connection, DataSource, DatabaseMetadata, Statement, TableInfo,
};
pub use error::{DbError, Result, SQL_STATE_DATABASE_SHUTDOWN, SQL_STATE_SYSTEM_SHUTDOWN};
pub use types::SqlType;
pub use value::{DbRow, DbValue, FromDbValue};

pub use rust_decimal::Decimal;
