//! Span helpers shared by the backends.

use std::time::Instant;

use tracing::{debug_span, Span};

/// A statement span that records its duration when finished.
pub(crate) struct StatementSpan {
    span: Span,
    start: Instant,
}

impl StatementSpan {
    /// Open a `db.exec` span for a mutating statement.
    pub(crate) fn exec(sql: &str) -> Self {
        let span = debug_span!(
            "db.exec",
            op = sql_op_name(sql),
            sql_hash = %hash_sql(sql),
            duration_ms = tracing::field::Empty
        );
        Self {
            span,
            start: Instant::now(),
        }
    }

    /// Open a `db.query` span for a row-returning statement.
    pub(crate) fn query(sql: &str) -> Self {
        let span = debug_span!(
            "db.query",
            op = sql_op_name(sql),
            sql_hash = %hash_sql(sql),
            duration_ms = tracing::field::Empty
        );
        Self {
            span,
            start: Instant::now(),
        }
    }

    pub(crate) fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        self.span.in_scope(f)
    }

    pub(crate) fn finish(self) {
        let duration_ms = self.start.elapsed().as_millis() as u64;
        self.span.record("duration_ms", duration_ms);
    }
}

pub(crate) fn sql_op_name(sql: &str) -> &str {
    sql.split_whitespace().next().unwrap_or("unknown")
}

pub(crate) fn hash_sql(sql: &str) -> String {
    // FNV-1a 64-bit hash for low-cardinality, stable identification.
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in sql.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    format!("{:016x}", hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_op_name() {
        assert_eq!(sql_op_name("  SELECT * FROM t"), "SELECT");
        assert_eq!(sql_op_name(""), "unknown");
    }

    #[test]
    fn test_hash_sql_is_stable() {
        assert_eq!(hash_sql("SELECT 1"), hash_sql("SELECT 1"));
        assert_ne!(hash_sql("SELECT 1"), hash_sql("SELECT 2"));
        assert_eq!(hash_sql("").len(), 16);
    }
}
