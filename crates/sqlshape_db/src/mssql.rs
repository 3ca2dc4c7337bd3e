//! SQL Server session backed by tiberius.
//!
//! tiberius is async; the session drives it on a private current-thread
//! runtime so the metadata API stays blocking. Do not call it from inside
//! another tokio runtime.

use std::sync::Mutex;

use tiberius::{Client, ColumnData, Config, Query, Row};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use crate::session::{BackendError, DbRow, DbValue, SqlSession};

type MssqlClient = Client<Compat<TcpStream>>;

/// Blocking SQL Server session.
///
/// Connects lazily on the first query (or an explicit [`SqlSession::ensure_open`])
/// and reconnects after an I/O failure.
pub struct MssqlSession {
    runtime: Runtime,
    config: Config,
    client: Mutex<Option<MssqlClient>>,
}

impl std::fmt::Debug for MssqlSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlSession")
            .field("addr", &self.config.get_addr())
            .finish()
    }
}

impl MssqlSession {
    /// Session for an ADO.NET style connection string
    /// (`server=tcp:host,1433;user=...;password=...`).
    pub fn from_ado_string(conn_str: &str) -> Result<Self, BackendError> {
        Self::new(Config::from_ado_string(conn_str)?)
    }

    pub fn new(config: Config) -> Result<Self, BackendError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            runtime,
            config,
            client: Mutex::new(None),
        })
    }

    /// True once a connection has been established.
    pub fn is_open(&self) -> bool {
        self.client
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Drop the current connection, if any.
    pub fn close(&self) {
        if let Ok(mut guard) = self.client.lock() {
            guard.take();
        }
    }

    fn connect(&self) -> Result<MssqlClient, BackendError> {
        let addr = self.config.get_addr();
        let config = self.config.clone();
        let client = self.runtime.block_on(async move {
            let tcp = TcpStream::connect(&addr).await?;
            tcp.set_nodelay(true)?;
            Client::connect(config, tcp.compat_write())
                .await
                .map_err(BackendError::from)
        })?;
        info!(addr = %self.config.get_addr(), "Connected to SQL Server");
        Ok(client)
    }
}

impl SqlSession for MssqlSession {
    fn ensure_open(&self) -> Result<(), BackendError> {
        let mut guard = self
            .client
            .lock()
            .map_err(|_| BackendError::Connection("session lock poisoned".to_string()))?;
        if guard.is_none() {
            *guard = Some(self.connect()?);
        }
        Ok(())
    }

    fn query_all(&self, sql: &str, params: &[DbValue]) -> Result<Vec<DbRow>, BackendError> {
        self.ensure_open()?;
        let mut guard = self
            .client
            .lock()
            .map_err(|_| BackendError::Connection("session lock poisoned".to_string()))?;
        let client = guard
            .as_mut()
            .ok_or_else(|| BackendError::Connection("connection is not open".to_string()))?;

        let mut query = Query::new(sql);
        for param in params {
            bind_param(&mut query, param);
        }

        let result = self.runtime.block_on(async {
            let stream = query.query(client).await?;
            stream.into_first_result().await
        });

        match result {
            Ok(rows) => Ok(rows.into_iter().map(row_from_tiberius).collect()),
            Err(err) => {
                if matches!(err, tiberius::error::Error::Io { .. }) {
                    debug!("Dropping broken SQL Server connection");
                    guard.take();
                }
                Err(err.into())
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        "SQL Server"
    }
}

fn bind_param(query: &mut Query<'_>, value: &DbValue) {
    match value {
        DbValue::Null => query.bind(Option::<&str>::None),
        DbValue::Integer(v) => query.bind(*v),
        DbValue::Real(v) => query.bind(*v),
        DbValue::Text(v) => query.bind(v.clone()),
        DbValue::Blob(v) => query.bind(v.clone()),
        DbValue::Boolean(v) => query.bind(*v),
    }
}

fn row_from_tiberius(row: Row) -> DbRow {
    let columns: Vec<String> = row.columns().iter().map(|c| c.name().to_string()).collect();
    let values = row.into_iter().map(value_from_column).collect();
    DbRow::new(columns, values)
}

fn value_from_column(data: ColumnData<'static>) -> DbValue {
    match data {
        ColumnData::U8(v) => v.map(|v| DbValue::Integer(v as i64)).unwrap_or(DbValue::Null),
        ColumnData::I16(v) => v.map(|v| DbValue::Integer(v as i64)).unwrap_or(DbValue::Null),
        ColumnData::I32(v) => v.map(|v| DbValue::Integer(v as i64)).unwrap_or(DbValue::Null),
        ColumnData::I64(v) => v.map(DbValue::Integer).unwrap_or(DbValue::Null),
        ColumnData::F32(v) => v.map(|v| DbValue::Real(v as f64)).unwrap_or(DbValue::Null),
        ColumnData::F64(v) => v.map(DbValue::Real).unwrap_or(DbValue::Null),
        ColumnData::Bit(v) => v.map(DbValue::Boolean).unwrap_or(DbValue::Null),
        ColumnData::String(v) => v
            .map(|s| DbValue::Text(s.into_owned()))
            .unwrap_or(DbValue::Null),
        ColumnData::Binary(v) => v
            .map(|b| DbValue::Blob(b.into_owned()))
            .unwrap_or(DbValue::Null),
        ColumnData::Guid(v) => v
            .map(|g| DbValue::Text(g.to_string()))
            .unwrap_or(DbValue::Null),
        ColumnData::Numeric(v) => v
            .map(|n| DbValue::Text(n.to_string()))
            .unwrap_or(DbValue::Null),
        // Catalog and describe queries never select temporal or XML columns.
        _ => DbValue::Null,
    }
}
