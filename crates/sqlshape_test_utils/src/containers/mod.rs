//! Docker container management for SQL Server tests.

pub mod lifecycle;
