//! Result-set and table-type introspection for SQL Server
//!
//! Given a stored procedure or a user-defined table type, this crate works
//! out the ordered `(name, nullability, type)` shape of the data it produces
//! or accepts. Procedure shapes are backed by an on-disk cache so a
//! transient introspection failure replays the last known good description.
//!
//! # Usage
//!
//! ```rust,ignore
//! use sqlshape_db::{MetadataConfig, MetadataHelper, ObjectName};
//!
//! let session = sqlshape_db::MssqlSession::from_ado_string(conn_str)?;
//! let helper = MetadataHelper::new(session, MetadataConfig::with_cache("/srv/app"))?;
//!
//! // Procedure result set (never fails; may come from the cache)
//! let fields = helper.get_result_set_fields(&ObjectName::parse("dbo.GetUsers")?, None, true);
//!
//! // Table type columns (errors propagate)
//! let columns = helper.get_table_type_fields(&ObjectName::parse("dbo.IdList")?)?;
//! ```

mod error;
mod session;
mod types;

pub mod cache;
pub mod catalog;
pub mod config;
pub mod introspect;

#[cfg(feature = "mssql")]
mod mssql;

pub use cache::ResultSetCache;
pub use config::MetadataConfig;
pub use error::{ErrorKind, MetadataError, Result};
pub use introspect::{FieldSource, LookupOptions, ResultSetLookup};
pub use session::{BackendError, DbRow, DbValue, FromDbValue, SqlSession};
pub use types::*;

#[cfg(feature = "mssql")]
pub use mssql::MssqlSession;

use tracing::warn;

/// Entry point for result-set and table-type lookups against one session.
///
/// The session is borrowed for every call and never closed by the helper.
pub struct MetadataHelper<S> {
    session: S,
    config: MetadataConfig,
    cache: Option<ResultSetCache>,
}

impl<S: SqlSession> MetadataHelper<S> {
    /// Create a helper, rejecting configurations it cannot honour.
    pub fn new(session: S, config: MetadataConfig) -> Result<Self> {
        config.validate()?;
        let cache = config
            .result_sets_dir()
            .map(|dir| ResultSetCache::new(dir, config.memoize));
        Ok(Self {
            session,
            config,
            cache,
        })
    }

    /// Columns of a user-defined table type, in declaration order.
    pub fn get_table_type_fields(&self, table_type: &ObjectName) -> Result<ResultSet> {
        catalog::table_type_fields(&self.session, table_type)
    }

    /// Fields of the first result set of `tsql` (default: the procedure itself).
    ///
    /// Never fails. An empty result means neither the database nor the cache
    /// could describe the object.
    pub fn get_result_set_fields(
        &self,
        object: &ObjectName,
        tsql: Option<&str>,
        caching_enabled: bool,
    ) -> ResultSet {
        self.describe_result_set(object, tsql, caching_enabled).fields
    }

    /// Like [`MetadataHelper::get_result_set_fields`], also reporting where the fields came from.
    pub fn describe_result_set(
        &self,
        object: &ObjectName,
        tsql: Option<&str>,
        caching_enabled: bool,
    ) -> ResultSetLookup {
        let cache = if caching_enabled {
            if self.cache.is_none() {
                warn!(object = %object, "Result-set caching requested but no content_root is configured");
            }
            self.cache.as_ref()
        } else {
            None
        };

        introspect::describe_result_set(
            &self.session,
            object,
            tsql,
            LookupOptions {
                cache,
                treat_empty_as_failure: self.config.treat_empty_as_failure,
            },
        )
    }

    /// Look up `object` with caching as configured by `persist_result_sets`.
    pub fn describe_procedure(&self, object: &ObjectName) -> ResultSetLookup {
        self.describe_result_set(object, None, self.config.persist_result_sets)
    }

    /// The result-set cache, when a content root is configured.
    pub fn cache(&self) -> Option<&ResultSetCache> {
        self.cache.as_ref()
    }

    pub fn config(&self) -> &MetadataConfig {
        &self.config
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// Give the session back to the caller.
    pub fn into_session(self) -> S {
        self.session
    }
}
