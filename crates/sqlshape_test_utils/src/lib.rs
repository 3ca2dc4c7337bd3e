//! sqlshape test utilities
//!
//! - [`ScriptedSession`]: an in-memory [`sqlshape_db::SqlSession`] answering
//!   describe and catalog queries from scripted rows
//! - [`capture_logs`]: record `tracing` events emitted by the code under test
//! - Docker-based SQL Server sessions (`docker-tests` feature)
//!
//! # Usage
//!
//! ```rust,ignore
//! use sqlshape_test_utils::{capture_logs, DescribedColumn, ScriptedSession};
//!
//! let session = ScriptedSession::new().with_result_set(
//!     "[dbo].[GetUsers]",
//!     vec![DescribedColumn::new("Id", "int", false)],
//! );
//! let (fields, logs) = capture_logs(|| helper.get_result_set_fields(&name, None, true));
//! ```

pub mod config;
pub mod logs;
pub mod scripted;

#[cfg(feature = "docker-tests")]
pub mod containers;
#[cfg(feature = "docker-tests")]
pub mod pools;

// Re-exports for convenience
pub use config::DbVersion;
pub use logs::{capture_logs, CapturedLogs, LogRecord};
pub use scripted::{CatalogColumn, DescribedColumn, RecordedCall, ScriptedSession};

#[cfg(feature = "docker-tests")]
pub use containers::lifecycle::ensure_container_running;
#[cfg(feature = "docker-tests")]
pub use pools::mssql::{TestMssqlSession, TestSchema};
