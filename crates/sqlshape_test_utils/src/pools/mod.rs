//! Live database sessions for tests.

pub mod mssql;
