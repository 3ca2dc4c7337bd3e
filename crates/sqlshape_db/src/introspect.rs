//! Result-set introspection with cache fallback.
//!
//! Live description always wins when it yields columns. When it fails, or
//! yields nothing and empty counts as failure, the last cached description
//! is replayed verbatim. The caller never sees an error from this path.

use serde::Serialize;
use tracing::{debug, error, warn};

use crate::cache::ResultSetCache;
use crate::error::Result;
use crate::session::{read_rows, DbRow, DbValue, SqlSession};
use crate::types::{FieldDescriptor, ObjectName, ResultSet, SqlType};

/// Describe the first result set of `@P1` without running it.
pub const DESCRIBE_FIRST_RESULT_SET_SQL: &str = "EXEC sp_describe_first_result_set @tsql = @P1";

/// Where the fields of a [`ResultSetLookup`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldSource {
    /// Fresh from the database.
    Live,
    /// Replayed from the cache; may be stale.
    Cache,
    /// Neither produced anything.
    Unavailable,
}

/// Outcome of a result-set lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultSetLookup {
    pub fields: ResultSet,
    pub source: FieldSource,
}

impl ResultSetLookup {
    fn live(fields: ResultSet) -> Self {
        let source = if fields.is_empty() {
            FieldSource::Unavailable
        } else {
            FieldSource::Live
        };
        Self { fields, source }
    }

    fn cached(fields: ResultSet) -> Self {
        Self {
            fields,
            source: FieldSource::Cache,
        }
    }

    /// True when the fields may not match the current schema.
    pub fn is_stale(&self) -> bool {
        self.source == FieldSource::Cache
    }
}

/// Introspection settings for one lookup.
#[derive(Debug, Clone, Copy)]
pub struct LookupOptions<'a> {
    /// Cache to write through and fall back to; `None` disables caching
    pub cache: Option<&'a ResultSetCache>,
    /// Fall back to the cache on a zero-column live result too
    pub treat_empty_as_failure: bool,
}

/// Describe the first result set of `tsql` for `object`.
///
/// `tsql` defaults to the bracket-quoted object name.
pub fn describe_result_set<S>(
    session: &S,
    object: &ObjectName,
    tsql: Option<&str>,
    options: LookupOptions<'_>,
) -> ResultSetLookup
where
    S: SqlSession + ?Sized,
{
    let quoted;
    let tsql = match tsql {
        Some(text) => text,
        None => {
            quoted = object.quoted();
            quoted.as_str()
        }
    };

    let (live, failed) = match describe_live(session, tsql) {
        Ok(fields) => {
            // Joins such as `SELECT u.Id, o.Id` legitimately repeat names.
            if let Some(column) = fields.first_duplicate_name() {
                warn!(object = %object, column, "Result set repeats a column name");
            }
            if let (Some(cache), false) = (options.cache, fields.is_empty()) {
                if let Err(err) = cache.save(object, &fields) {
                    warn!(
                        object = %object,
                        kind = %err.kind(),
                        error = %err,
                        "Could not cache result set"
                    );
                }
            }
            (fields, false)
        }
        Err(err) => {
            error!(
                object = %object,
                kind = %err.kind(),
                error = %err,
                "Error getting result set"
            );
            (ResultSet::empty(), true)
        }
    };

    let wants_fallback = failed || (live.is_empty() && options.treat_empty_as_failure);
    if !wants_fallback {
        return ResultSetLookup::live(live);
    }

    let Some(cache) = options.cache else {
        return ResultSetLookup::live(live);
    };

    match cache.load(object) {
        Ok(cached) => {
            debug!(object = %object, fields = cached.len(), "Using cached result set");
            ResultSetLookup::cached(cached)
        }
        Err(err) if err.is_cache_miss() => {
            debug!(object = %object, "No cached result set");
            ResultSetLookup::live(live)
        }
        Err(err) => {
            warn!(
                object = %object,
                kind = %err.kind(),
                error = %err,
                "Could not get cached result set"
            );
            ResultSetLookup::live(live)
        }
    }
}

/// Run the engine's description primitive and map its rows.
pub fn describe_live<S>(session: &S, tsql: &str) -> Result<ResultSet>
where
    S: SqlSession + ?Sized,
{
    let rows = read_rows(&session, DESCRIBE_FIRST_RESULT_SET_SQL, &[DbValue::from(tsql)])?;

    rows.iter()
        .enumerate()
        .map(|(index, row)| field_from_description_row(index, row))
        .collect()
}

fn field_from_description_row(index: usize, row: &DbRow) -> Result<FieldDescriptor> {
    // Expressions without an alias come back with a NULL name.
    let name = row
        .get_by_name::<Option<String>>("name")?
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| format!("Column{}", index + 1));
    let type_name: String = row.get_by_name("system_type_name")?;
    let is_nullable: bool = row.get_by_name("is_nullable")?;
    Ok(FieldDescriptor::new(
        name,
        is_nullable,
        SqlType::from_type_name(&type_name),
    ))
}
