//! Vendor-neutral SQL type codes.

use std::fmt;

/// SQL type of a column or statement parameter.
///
/// Mirrors the portable type codes drivers report through their metadata, so
/// per-vendor type names can be normalized to one vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Bit,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Real,
    Double,
    Numeric,
    Decimal,
    Char,
    VarChar,
    LongVarChar,
    NChar,
    NVarChar,
    LongNVarChar,
    Clob,
    Date,
    Time,
    TimeWithTimezone,
    Timestamp,
    TimestampWithTimezone,
    Binary,
    VarBinary,
    LongVarBinary,
    Blob,
    Boolean,
    /// Anything the driver could not classify.
    Other,
}

impl SqlType {
    /// Map a native (vendor) type name to a type code.
    ///
    /// Length/precision suffixes such as `VARCHAR(20)` or `NUMERIC(10,2)` are
    /// ignored. Unknown names map to [`SqlType::Other`].
    pub fn from_type_name(name: &str) -> Self {
        let base = name
            .split('(')
            .next()
            .unwrap_or(name)
            .trim()
            .to_ascii_uppercase();

        match base.as_str() {
            "BIT" => Self::Bit,
            "TINYINT" | "INT1" | "UTINYINT" => Self::TinyInt,
            "SMALLINT" | "INT2" | "SHORT" | "USMALLINT" => Self::SmallInt,
            "INTEGER" | "INT" | "INT4" | "SIGNED" | "MEDIUMINT" | "UINTEGER" | "SERIAL" => {
                Self::Integer
            }
            "BIGINT" | "INT8" | "LONG" | "UBIGINT" | "HUGEINT" | "BIGSERIAL" => Self::BigInt,
            "FLOAT" => Self::Float,
            "REAL" | "FLOAT4" => Self::Real,
            "DOUBLE" | "DOUBLE PRECISION" | "FLOAT8" => Self::Double,
            "NUMERIC" => Self::Numeric,
            "DECIMAL" | "DEC" | "NUMBER" => Self::Decimal,
            "CHAR" | "CHARACTER" | "BPCHAR" => Self::Char,
            "VARCHAR" | "CHARACTER VARYING" | "STRING" | "TEXT" => Self::VarChar,
            "LONG VARCHAR" | "MEDIUMTEXT" | "LONGTEXT" => Self::LongVarChar,
            "NCHAR" => Self::NChar,
            "NVARCHAR" => Self::NVarChar,
            "LONG NVARCHAR" | "NTEXT" => Self::LongNVarChar,
            "CLOB" => Self::Clob,
            "DATE" => Self::Date,
            "TIME" | "TIME WITHOUT TIME ZONE" => Self::Time,
            "TIMETZ" | "TIME WITH TIME ZONE" => Self::TimeWithTimezone,
            "TIMESTAMP" | "DATETIME" | "TIMESTAMP WITHOUT TIME ZONE" => Self::Timestamp,
            "TIMESTAMPTZ" | "TIMESTAMP WITH TIME ZONE" => Self::TimestampWithTimezone,
            "BINARY" => Self::Binary,
            "VARBINARY" | "BINARY VARYING" => Self::VarBinary,
            "LONG VARBINARY" | "BYTEA" | "MEDIUMBLOB" | "LONGBLOB" => Self::LongVarBinary,
            "BLOB" => Self::Blob,
            "BOOLEAN" | "BOOL" => Self::Boolean,
            _ => Self::Other,
        }
    }

    /// Whether values of this type are character strings.
    pub fn is_character(&self) -> bool {
        matches!(
            self,
            Self::Char
                | Self::VarChar
                | Self::LongVarChar
                | Self::NChar
                | Self::NVarChar
                | Self::LongNVarChar
                | Self::Clob
        )
    }

    /// Whether values of this type are raw bytes.
    pub fn is_binary(&self) -> bool {
        matches!(
            self,
            Self::Binary | Self::VarBinary | Self::LongVarBinary | Self::Blob
        )
    }

    /// Whether values of this type carry a date, time or both.
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            Self::Date
                | Self::Time
                | Self::TimeWithTimezone
                | Self::Timestamp
                | Self::TimestampWithTimezone
        )
    }

    /// Whether values of this type are exact or approximate numbers.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::TinyInt
                | Self::SmallInt
                | Self::Integer
                | Self::BigInt
                | Self::Float
                | Self::Real
                | Self::Double
                | Self::Numeric
                | Self::Decimal
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bit => "BIT",
            Self::TinyInt => "TINYINT",
            Self::SmallInt => "SMALLINT",
            Self::Integer => "INTEGER",
            Self::BigInt => "BIGINT",
            Self::Float => "FLOAT",
            Self::Real => "REAL",
            Self::Double => "DOUBLE",
            Self::Numeric => "NUMERIC",
            Self::Decimal => "DECIMAL",
            Self::Char => "CHAR",
            Self::VarChar => "VARCHAR",
            Self::LongVarChar => "LONGVARCHAR",
            Self::NChar => "NCHAR",
            Self::NVarChar => "NVARCHAR",
            Self::LongNVarChar => "LONGNVARCHAR",
            Self::Clob => "CLOB",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::TimeWithTimezone => "TIME_WITH_TIMEZONE",
            Self::Timestamp => "TIMESTAMP",
            Self::TimestampWithTimezone => "TIMESTAMP_WITH_TIMEZONE",
            Self::Binary => "BINARY",
            Self::VarBinary => "VARBINARY",
            Self::LongVarBinary => "LONGVARBINARY",
            Self::Blob => "BLOB",
            Self::Boolean => "BOOLEAN",
            Self::Other => "OTHER",
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
