//! SQL Server sessions for tests, one isolated schema per test.

use crate::config::DbVersion;
use crate::containers::lifecycle::ensure_container_running;
use anyhow::Result;
use sqlshape_db::{DbValue, MssqlSession, SqlSession};
use tracing::{info, warn};

const CREATE_SCHEMA_SQL: &str = "\
DECLARE @stmt nvarchar(max) = N'CREATE SCHEMA ' + QUOTENAME(@P1);
EXEC sp_executesql @stmt;";

const DROP_SCHEMA_SQL: &str = "\
DECLARE @stmt nvarchar(max) = N'';
SELECT @stmt += N'DROP PROCEDURE ' + QUOTENAME(s.name) + N'.' + QUOTENAME(p.name) + N';'
FROM sys.procedures p INNER JOIN sys.schemas s ON s.schema_id = p.schema_id
WHERE s.name = @P1;
SELECT @stmt += N'DROP TABLE ' + QUOTENAME(s.name) + N'.' + QUOTENAME(t.name) + N';'
FROM sys.tables t INNER JOIN sys.schemas s ON s.schema_id = t.schema_id
WHERE s.name = @P1;
SELECT @stmt += N'DROP TYPE ' + QUOTENAME(s.name) + N'.' + QUOTENAME(tt.name) + N';'
FROM sys.table_types tt INNER JOIN sys.schemas s ON s.schema_id = tt.schema_id
WHERE s.name = @P1;
SET @stmt += N'DROP SCHEMA ' + QUOTENAME(@P1) + N';';
EXEC sp_executesql @stmt;";

/// A SQL Server session for testing.
///
/// Ensures the Docker container is running before connecting.
pub struct TestMssqlSession {
    /// The database version this session connects to
    pub version: DbVersion,
    session: MssqlSession,
}

impl TestMssqlSession {
    pub fn new(version: DbVersion) -> Result<Self> {
        ensure_container_running(version)?;
        info!(%version, port = version.port(), "Creating SQL Server test session");

        let session = MssqlSession::from_ado_string(&version.connection_string())?;
        session.ensure_open()?;
        Ok(Self { version, session })
    }

    pub fn session(&self) -> &MssqlSession {
        &self.session
    }

    /// Run a statement, ignoring any rows it returns.
    pub fn execute(&self, sql: &str) -> Result<()> {
        self.session.query_all(sql, &[])?;
        Ok(())
    }

    /// Create a uniquely named schema that is dropped with everything in it
    /// when the guard goes out of scope.
    pub fn isolated_schema(&self) -> Result<TestSchema<'_>> {
        let name = format!("sqlshape_{}", uuid::Uuid::new_v4().simple());
        self.session
            .query_all(CREATE_SCHEMA_SQL, &[DbValue::from(name.as_str())])?;
        Ok(TestSchema {
            session: &self.session,
            name,
        })
    }
}

/// Guard for a schema created by [`TestMssqlSession::isolated_schema`].
pub struct TestSchema<'a> {
    session: &'a MssqlSession,
    name: String,
}

impl TestSchema<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for TestSchema<'_> {
    fn drop(&mut self) {
        if let Err(err) = self
            .session
            .query_all(DROP_SCHEMA_SQL, &[DbValue::from(self.name.as_str())])
        {
            warn!(schema = %self.name, error = %err, "Failed to drop test schema");
        }
    }
}
