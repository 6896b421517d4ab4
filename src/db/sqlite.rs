use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
    SqliteRow,
};
use sqlx::{Column, Row as _, Sqlite, TypeInfo, ValueRef};
use tracing::info;

use super::dialect::is_insert;
use super::store::{Store, POOL_WAIT};
use super::topology::Backend;
use super::value::{ExecResult, Row, Value};
use super::DatabaseError;
use crate::config::EmbeddedStoreConfig;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

pub struct SqliteStore {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteStore {
    pub async fn open(config: &EmbeddedStoreConfig) -> Result<Self, DatabaseError> {
        let path = PathBuf::from(&config.path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                DatabaseError::Connection(format!(
                    "cannot create directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        // WAL plus a busy timeout lets concurrent writers queue instead of
        // failing with SQLITE_BUSY.
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(POOL_WAIT)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        info!(
            "embedded store opened path={} max_connections={}",
            path.display(),
            config.max_connections
        );

        Ok(Self { pool, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn bind_params<'q>(mut query: SqliteQuery<'q>, params: &'q [Value]) -> SqliteQuery<'q> {
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<String>),
            Value::Integer(v) => query.bind(*v),
            Value::Real(v) => query.bind(*v),
            Value::Text(v) => query.bind(v.as_str()),
            Value::Blob(v) => query.bind(v.as_slice()),
            Value::Bool(v) => query.bind(*v),
            Value::Timestamp(v) => query.bind(*v),
        };
    }
    query
}

fn decode_error(column: &str, err: sqlx::Error) -> DatabaseError {
    DatabaseError::Decode {
        column: column.to_string(),
        reason: err.to_string(),
    }
}

// The value's storage class decides the Rust type, not the declared column
// affinity: SQLite lets any column hold any class.
fn decode_row(row: &SqliteRow) -> Result<Row, DatabaseError> {
    let mut columns = Vec::with_capacity(row.columns().len());
    let mut values = Vec::with_capacity(row.columns().len());

    for (idx, column) in row.columns().iter().enumerate() {
        let name = column.name();
        let raw = row.try_get_raw(idx).map_err(|e| decode_error(name, e))?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let storage = raw.type_info().name().to_ascii_uppercase();
            match storage.as_str() {
                "INTEGER" | "INT" | "INT4" | "INT8" | "BIGINT" | "BOOLEAN" => row
                    .try_get_unchecked::<i64, _>(idx)
                    .map(Value::Integer)
                    .map_err(|e| decode_error(name, e))?,
                "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => row
                    .try_get_unchecked::<f64, _>(idx)
                    .map(Value::Real)
                    .map_err(|e| decode_error(name, e))?,
                "BLOB" => row
                    .try_get_unchecked::<Vec<u8>, _>(idx)
                    .map(Value::Blob)
                    .map_err(|e| decode_error(name, e))?,
                _ => row
                    .try_get_unchecked::<String, _>(idx)
                    .map(Value::Text)
                    .map_err(|e| decode_error(name, e))?,
            }
        };
        columns.push(name.to_string());
        values.push(value);
    }

    Ok(Row::new(columns, values))
}

#[async_trait]
impl Store for SqliteStore {
    fn backend(&self) -> Backend {
        Backend::Embedded
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult, DatabaseError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        let result = bind_params(sqlx::query(sql), params)
            .execute(&mut *conn)
            .await
            .map_err(DatabaseError::Query)?;

        // last_insert_rowid is per connection and survives later statements,
        // so it only means something for an insert that wrote a row.
        let generated_id = (is_insert(sql) && result.rows_affected() > 0)
            .then(|| result.last_insert_rowid());

        Ok(ExecResult {
            generated_id,
            affected_rows: result.rows_affected(),
        })
    }

    async fn fetch_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>, DatabaseError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        bind_params(sqlx::query(sql), params)
            .fetch_optional(&mut *conn)
            .await
            .map_err(DatabaseError::Query)?
            .as_ref()
            .map(decode_row)
            .transpose()
    }

    async fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DatabaseError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        let rows = bind_params(sqlx::query(sql), params)
            .fetch_all(&mut *conn)
            .await
            .map_err(DatabaseError::Query)?;

        rows.iter().map(decode_row).collect()
    }

    async fn execute_batch_atomic(&self, statements: &[&str]) -> Result<(), DatabaseError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        for statement in statements {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| DatabaseError::Schema(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Schema(format!("commit failed: {e}")))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
