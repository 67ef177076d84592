//! Shared fixtures for integration tests.

#![allow(dead_code)]

pub mod fakes;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dbtester::DbTester;
use dbtester_db::{DataSource, SqlType};

use fakes::FakeDatabase;

/// `orders(id BIGINT PK, customer VARCHAR, total DECIMAL, payload VARBINARY)`
pub fn orders_db() -> Arc<FakeDatabase> {
    Arc::new(FakeDatabase::new().with_table(
        "orders",
        &[
            ("id", SqlType::BigInt),
            ("customer", SqlType::VarChar),
            ("total", SqlType::Decimal),
            ("payload", SqlType::VarBinary),
        ],
        &["id"],
    ))
}

pub fn tester_for(db: &Arc<FakeDatabase>) -> DbTester {
    let ds: Arc<dyn DataSource> = db.clone();
    DbTester::new(ds)
}

/// Write `content` to `dir/name` and return the path.
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}
