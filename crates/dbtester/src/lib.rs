//! DbTester: set up, seed, query and assert relational databases in tests.
//!
//! A [`DbTester`] wraps a [`DataSource`](dbtester_db::DataSource) and is driven
//! by the test harness through three hooks: `before_all`, `before_each` and
//! `after_all`. Tests reach tables through [`DbTester::table`], seed them with
//! inserts or CSV data sets, and check them with [`TableMatcher`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use dbtester::DbTester;
//! use dbtester_db::{open_data_source, DataSourceConfig};
//!
//! let ds = open_data_source(&DataSourceConfig::new("duckdb::memory:"))?;
//! let tester = DbTester::new(ds)
//!     .init_script("tests/schema.sql")
//!     .delete_before_each_test(&["orders"]);
//!
//! tester.before_all()?;
//! tester.before_each()?;
//!
//! let orders = tester.table("orders")?;
//! orders.csv_data_set().load("tests/orders.csv")?.persist()?;
//! orders.matcher().eq("status", "open").assert_matches(2);
//! orders.matcher().assert_matches_csv("tests/orders.csv", &["id"]);
//! ```

mod channel;
mod config;
mod convert;
mod csv_loader;
mod dataset;
mod error;
mod flavor;
mod matcher;
mod metadata;
mod name;
mod script;
pub mod statement;
mod table;
mod tester;

pub use channel::DatabaseChannel;
pub use config::{DbTesterConfig, LoggingConfig, ScriptConfig};
pub use convert::{ConvertFn, ValueConverter, NULL_TOKEN};
pub use csv_loader::CsvDataSetBuilder;
pub use dataset::TableDataSet;
pub use error::{Result, TesterError};
pub use flavor::{DbFlavor, FlavorKind};
pub use matcher::{Mismatch, RowKey, RowKeyFactory, TableMatcher};
pub use metadata::{DbColumnMetadata, DbMetadata, DbTableMetadata};
pub use name::TableFQName;
pub use script::ScriptSplitter;
pub use table::Table;
pub use tester::DbTester;

pub use dbtester_db::{DbValue, SqlType};
