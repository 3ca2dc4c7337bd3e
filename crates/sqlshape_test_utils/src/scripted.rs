//! In-memory session that answers metadata queries from scripted rows.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use sqlshape_db::{BackendError, DbRow, DbValue, ObjectName, SqlSession};

/// One row of `sp_describe_first_result_set` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribedColumn {
    /// `None` for expressions without an alias
    pub name: Option<String>,
    pub system_type_name: String,
    pub is_nullable: bool,
}

impl DescribedColumn {
    pub fn new(name: &str, system_type_name: &str, is_nullable: bool) -> Self {
        Self {
            name: Some(name.to_string()),
            system_type_name: system_type_name.to_string(),
            is_nullable,
        }
    }

    pub fn unnamed(system_type_name: &str, is_nullable: bool) -> Self {
        Self {
            name: None,
            system_type_name: system_type_name.to_string(),
            is_nullable,
        }
    }

    fn to_row(&self) -> DbRow {
        DbRow::from_pairs([
            ("is_hidden", DbValue::Boolean(false)),
            ("name", DbValue::from(self.name.clone())),
            ("is_nullable", DbValue::Boolean(self.is_nullable)),
            ("system_type_name", DbValue::from(self.system_type_name.as_str())),
        ])
    }
}

/// One row of the table-type catalog query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogColumn {
    pub name: String,
    pub type_name: String,
    pub is_nullable: bool,
}

impl CatalogColumn {
    pub fn new(name: &str, type_name: &str, is_nullable: bool) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            is_nullable,
        }
    }

    fn to_row(&self) -> DbRow {
        DbRow::from_pairs([
            ("ColumnName", DbValue::from(self.name.as_str())),
            ("TypeName", DbValue::from(self.type_name.as_str())),
            ("is_nullable", DbValue::Boolean(self.is_nullable)),
        ])
    }
}

/// A query the session received.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub sql: String,
    pub params: Vec<DbValue>,
}

#[derive(Debug, Default)]
struct State {
    offline: Option<String>,
    opened: usize,
    result_sets: HashMap<String, Vec<DescribedColumn>>,
    broken_result_sets: HashMap<String, String>,
    table_types: HashMap<ObjectName, Vec<CatalogColumn>>,
    calls: Vec<RecordedCall>,
}

/// Scripted [`SqlSession`].
///
/// Describe calls for unscripted SQL text fail the way SQL Server does for
/// an unknown procedure. Catalog queries for unscripted table types return
/// no rows.
#[derive(Debug, Default)]
pub struct ScriptedSession {
    state: Mutex<State>,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the description of `tsql`.
    pub fn with_result_set(self, tsql: &str, columns: Vec<DescribedColumn>) -> Self {
        self.set_result_set(tsql, columns);
        self
    }

    /// Script the columns of a table type.
    pub fn with_table_type(self, name: ObjectName, columns: Vec<CatalogColumn>) -> Self {
        self.state().table_types.insert(name, columns);
        self
    }

    /// Replace the description of `tsql`.
    pub fn set_result_set(&self, tsql: &str, columns: Vec<DescribedColumn>) {
        let mut state = self.state();
        state.broken_result_sets.remove(tsql);
        state.result_sets.insert(tsql.to_string(), columns);
    }

    /// Make describing `tsql` fail with `message`.
    pub fn fail_result_set(&self, tsql: &str, message: &str) {
        self.state()
            .broken_result_sets
            .insert(tsql.to_string(), message.to_string());
    }

    /// Refuse every connection attempt until [`ScriptedSession::go_online`].
    pub fn go_offline(&self, message: &str) {
        self.state().offline = Some(message.to_string());
    }

    pub fn go_online(&self) {
        self.state().offline = None;
    }

    /// Successful `ensure_open` calls so far.
    pub fn open_count(&self) -> usize {
        self.state().opened
    }

    /// Queries received so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SqlSession for ScriptedSession {
    fn ensure_open(&self) -> Result<(), BackendError> {
        let mut state = self.state();
        if let Some(message) = &state.offline {
            return Err(BackendError::Connection(message.clone()));
        }
        state.opened += 1;
        Ok(())
    }

    fn query_all(&self, sql: &str, params: &[DbValue]) -> Result<Vec<DbRow>, BackendError> {
        let mut state = self.state();
        if let Some(message) = &state.offline {
            return Err(BackendError::Connection(message.clone()));
        }
        state.calls.push(RecordedCall {
            sql: sql.to_string(),
            params: params.to_vec(),
        });

        if sql.contains("sp_describe_first_result_set") {
            let tsql = text_param(params, 0)?;
            if let Some(message) = state.broken_result_sets.get(&tsql) {
                return Err(BackendError::Query(message.clone()));
            }
            return state
                .result_sets
                .get(&tsql)
                .map(|cols| cols.iter().map(DescribedColumn::to_row).collect())
                .ok_or_else(|| {
                    BackendError::Query(format!("Could not find stored procedure '{}'.", tsql))
                });
        }

        if sql.contains("sys.table_types") {
            let name = ObjectName::new(text_param(params, 1)?, text_param(params, 0)?);
            return Ok(state
                .table_types
                .get(&name)
                .map(|cols| cols.iter().map(CatalogColumn::to_row).collect())
                .unwrap_or_default());
        }

        Err(BackendError::Query(format!("Unscripted query: {}", sql)))
    }

    fn backend_name(&self) -> &'static str {
        "scripted"
    }
}

fn text_param(params: &[DbValue], index: usize) -> Result<String, BackendError> {
    match params.get(index) {
        Some(DbValue::Text(v)) => Ok(v.clone()),
        other => Err(BackendError::Query(format!(
            "Expected text parameter @P{}, got {:?}",
            index + 1,
            other
        ))),
    }
}
