//! Database session abstraction.
//!
//! The metadata core never owns a connection. Callers hand it something that
//! implements [`SqlSession`]: a live SQL Server session (`mssql` feature), or
//! a scripted one in tests.

use std::time::Instant;
use thiserror::Error;
use tracing::debug_span;

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Type conversion error: {0}")]
    TypeConversion(String),

    #[error("Backend not available: {0}")]
    NotAvailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "mssql")]
    #[error("SQL Server error: {0}")]
    Tiberius(#[from] tiberius::error::Error),
}

/// Value type for query parameters and row cells.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Boolean(bool),
}

impl From<i64> for DbValue {
    fn from(v: i64) -> Self {
        DbValue::Integer(v)
    }
}

impl From<String> for DbValue {
    fn from(v: String) -> Self {
        DbValue::Text(v)
    }
}

impl From<&str> for DbValue {
    fn from(v: &str) -> Self {
        DbValue::Text(v.to_string())
    }
}

impl From<bool> for DbValue {
    fn from(v: bool) -> Self {
        DbValue::Boolean(v)
    }
}

impl<T: Into<DbValue>> From<Option<T>> for DbValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => DbValue::Null,
        }
    }
}

/// Row data from a query result.
#[derive(Debug, Clone)]
pub struct DbRow {
    columns: Vec<String>,
    values: Vec<DbValue>,
}

impl DbRow {
    /// Create a new row with column names and values.
    pub fn new(columns: Vec<String>, values: Vec<DbValue>) -> Self {
        Self { columns, values }
    }

    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, DbValue)>,
        S: Into<String>,
    {
        let (columns, values) = pairs
            .into_iter()
            .map(|(c, v)| (c.into(), v))
            .unzip();
        Self { columns, values }
    }

    /// Get a value by column index.
    pub fn get<T: FromDbValue>(&self, index: usize) -> Result<T, BackendError> {
        self.values
            .get(index)
            .ok_or_else(|| {
                BackendError::TypeConversion(format!("Column index {} out of bounds", index))
            })
            .and_then(|v| T::from_db_value(v))
    }

    /// Get a value by column name. Lookup is case-insensitive, like the engine's.
    pub fn get_by_name<T: FromDbValue>(&self, name: &str) -> Result<T, BackendError> {
        let index = self
            .columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .ok_or_else(|| BackendError::TypeConversion(format!("Column '{}' not found", name)))?;
        self.get(index)
            .map_err(|e| BackendError::TypeConversion(format!("Column '{}': {}", name, e)))
    }
}

/// Trait for converting from DbValue.
pub trait FromDbValue: Sized {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError>;
}

impl FromDbValue for i64 {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Integer(v) => Ok(*v),
            DbValue::Null => Err(BackendError::TypeConversion(
                "i64 field is NULL - use Option<i64> for nullable columns".to_string(),
            )),
            _ => Err(BackendError::TypeConversion("Expected integer".to_string())),
        }
    }
}

impl FromDbValue for String {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Text(v) => Ok(v.clone()),
            DbValue::Null => Err(BackendError::TypeConversion(
                "String field is NULL - use Option<String> for nullable columns".to_string(),
            )),
            _ => Err(BackendError::TypeConversion("Expected text".to_string())),
        }
    }
}

impl FromDbValue for bool {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Boolean(v) => Ok(*v),
            DbValue::Integer(v) => Ok(*v != 0),
            DbValue::Null => Err(BackendError::TypeConversion(
                "bool field is NULL - use Option<bool> for nullable columns".to_string(),
            )),
            _ => Err(BackendError::TypeConversion("Expected boolean".to_string())),
        }
    }
}

impl<T: FromDbValue> FromDbValue for Option<T> {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Null => Ok(None),
            _ => T::from_db_value(value).map(Some),
        }
    }
}

/// A database session the metadata core can issue reads against.
///
/// Parameters are positional and bound as `@P1`, `@P2`, ... in the SQL text.
/// Implementations only need to return the first result set of a batch.
pub trait SqlSession {
    /// Open the underlying connection if it is not open yet.
    fn ensure_open(&self) -> Result<(), BackendError>;

    /// Run a query and return all rows of its first result set.
    fn query_all(&self, sql: &str, params: &[DbValue]) -> Result<Vec<DbRow>, BackendError>;

    /// Get the backend name.
    fn backend_name(&self) -> &'static str {
        "unknown"
    }
}

impl<S: SqlSession + ?Sized> SqlSession for &S {
    fn ensure_open(&self) -> Result<(), BackendError> {
        (**self).ensure_open()
    }

    fn query_all(&self, sql: &str, params: &[DbValue]) -> Result<Vec<DbRow>, BackendError> {
        (**self).query_all(sql, params)
    }

    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }
}

impl<S: SqlSession + ?Sized> SqlSession for Box<S> {
    fn ensure_open(&self) -> Result<(), BackendError> {
        (**self).ensure_open()
    }

    fn query_all(&self, sql: &str, params: &[DbValue]) -> Result<Vec<DbRow>, BackendError> {
        (**self).query_all(sql, params)
    }

    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }
}

/// Open the session if needed and run one traced read.
pub(crate) fn read_rows(
    session: &dyn SqlSession,
    sql: &str,
    params: &[DbValue],
) -> Result<Vec<DbRow>, BackendError> {
    let span = debug_span!(
        "db.query",
        backend = session.backend_name(),
        op = sql_op_name(sql),
        sql_hash = %hash_sql(sql),
        rows = tracing::field::Empty,
        duration_ms = tracing::field::Empty
    );
    let _guard = span.enter();
    let start = Instant::now();

    session.ensure_open()?;
    let rows = session.query_all(sql, params)?;

    span.record("rows", rows.len() as u64);
    span.record("duration_ms", start.elapsed().as_millis() as u64);
    Ok(rows)
}

fn sql_op_name(sql: &str) -> &str {
    sql.split_whitespace().next().unwrap_or("unknown")
}

fn hash_sql(sql: &str) -> String {
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
    fn test_row_lookup_by_name_is_case_insensitive() {
        let row = DbRow::from_pairs([
            ("name", DbValue::from("Id")),
            ("is_nullable", DbValue::Boolean(false)),
        ]);
        let name: String = row.get_by_name("NAME").unwrap();
        let nullable: bool = row.get_by_name("Is_Nullable").unwrap();
        assert_eq!(name, "Id");
        assert!(!nullable);
    }

    #[test]
    fn test_missing_column_is_type_conversion_error() {
        let row = DbRow::new(vec!["a".into()], vec![DbValue::Integer(1)]);
        let err = row.get_by_name::<i64>("b").unwrap_err();
        assert!(matches!(err, BackendError::TypeConversion(_)));
    }

    #[test]
    fn test_bit_columns_accept_integers() {
        assert!(bool::from_db_value(&DbValue::Integer(1)).unwrap());
        assert!(!bool::from_db_value(&DbValue::Integer(0)).unwrap());
        assert_eq!(
            Option::<String>::from_db_value(&DbValue::Null).unwrap(),
            None
        );
    }

    #[test]
    fn test_sql_hash_is_stable() {
        assert_eq!(hash_sql("SELECT 1"), hash_sql("SELECT 1"));
        assert_ne!(hash_sql("SELECT 1"), hash_sql("SELECT 2"));
        assert_eq!(sql_op_name("  EXEC sp_who"), "EXEC");
    }
}
