//! Relational connection wrapper.
//!
//! Owns a lazily-connected Postgres pool, routes statements through an open
//! transaction when one exists, and decodes rows into plain attribute maps.
//! The transaction slot nests to depth one: a second `begin_transaction`
//! while one is open is an error, never a savepoint.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use config::DatabaseConfig;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Row, Transaction};
use tokio::sync::Mutex;

use crate::errors::{SqlResult, SqlStoreError};
use crate::value::{bind_value, decode_column, row_to_map, RowMap};
use sqlx::{Column, TypeInfo};

/// Shared handle to the relational store
#[derive(Clone)]
pub struct SqlDatabase {
    pool: PgPool,
    table_prefix: String,
    tx: Arc<Mutex<Option<Transaction<'static, Postgres>>>>,
    query_log: Arc<AtomicBool>,
}

impl SqlDatabase {
    /// Build a database handle from configuration.
    ///
    /// The pool is created lazily: no connection is established until the
    /// first statement runs, so construction only fails on a malformed URL.
    pub fn connect(config: &DatabaseConfig) -> SqlResult<Self> {
        let options = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .max_lifetime(Duration::from_secs(config.max_lifetime_seconds));
        let pool = options
            .connect_lazy(&config.connection_string())
            .map_err(SqlStoreError::unavailable)?;
        Ok(Self::with_prefix(pool, config.table_prefix.clone()))
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self::with_prefix(pool, String::new())
    }

    pub fn with_prefix(pool: PgPool, table_prefix: String) -> Self {
        Self {
            pool,
            table_prefix,
            tx: Arc::new(Mutex::new(None)),
            query_log: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the configured table prefix exactly once
    pub fn prefixed(&self, table: &str) -> String {
        if self.table_prefix.is_empty() || table.starts_with(&self.table_prefix) {
            table.to_string()
        } else {
            format!("{}{}", self.table_prefix, table)
        }
    }

    /// Start a fluent query against a (prefixed) table
    pub fn table(&self, name: &str) -> crate::builder::SqlQuery {
        crate::builder::SqlQuery::table(self.clone(), name)
    }

    pub fn enable_query_log(&self) {
        self.query_log.store(true, Ordering::Relaxed);
    }

    pub fn disable_query_log(&self) {
        self.query_log.store(false, Ordering::Relaxed);
    }

    fn log_query(&self, sql: &str, started: Instant) {
        if self.query_log.load(Ordering::Relaxed) {
            tracing::debug!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                sql = %sql,
                "query executed"
            );
        }
    }

    // ==================== Statement execution ====================

    /// Run a SELECT and decode every row
    pub async fn select(&self, sql: &str, bindings: Vec<Value>) -> SqlResult<Vec<RowMap>> {
        let started = Instant::now();
        let mut query = sqlx::query(sql);
        for value in bindings {
            query = bind_value!(query, value);
        }
        let rows = {
            let mut guard = self.tx.lock().await;
            match guard.as_mut() {
                Some(tx) => query.fetch_all(&mut **tx).await,
                None => query.fetch_all(&self.pool).await,
            }
        }
        .map_err(|e| SqlStoreError::query(e, sql))?;
        self.log_query(sql, started);
        Ok(rows.iter().map(row_to_map).collect())
    }

    /// Run a SELECT expected to produce at most one row
    pub async fn select_one(&self, sql: &str, bindings: Vec<Value>) -> SqlResult<Option<RowMap>> {
        let started = Instant::now();
        let mut query = sqlx::query(sql);
        for value in bindings {
            query = bind_value!(query, value);
        }
        let row = {
            let mut guard = self.tx.lock().await;
            match guard.as_mut() {
                Some(tx) => query.fetch_optional(&mut **tx).await,
                None => query.fetch_optional(&self.pool).await,
            }
        }
        .map_err(|e| SqlStoreError::query(e, sql))?;
        self.log_query(sql, started);
        Ok(row.as_ref().map(row_to_map))
    }

    /// Run a SELECT and return the first column of the first row
    pub async fn select_value(&self, sql: &str, bindings: Vec<Value>) -> SqlResult<Option<Value>> {
        let started = Instant::now();
        let mut query = sqlx::query(sql);
        for value in bindings {
            query = bind_value!(query, value);
        }
        let row = {
            let mut guard = self.tx.lock().await;
            match guard.as_mut() {
                Some(tx) => query.fetch_optional(&mut **tx).await,
                None => query.fetch_optional(&self.pool).await,
            }
        }
        .map_err(|e| SqlStoreError::query(e, sql))?;
        self.log_query(sql, started);
        Ok(row.map(|r| match r.columns().first() {
            Some(col) => decode_column(&r, 0, col.type_info().name()),
            None => Value::Null,
        }))
    }

    /// Execute a statement and return the affected-row count
    pub async fn execute(&self, sql: &str, bindings: Vec<Value>) -> SqlResult<u64> {
        let started = Instant::now();
        let mut query = sqlx::query(sql);
        for value in bindings {
            query = bind_value!(query, value);
        }
        let result = {
            let mut guard = self.tx.lock().await;
            match guard.as_mut() {
                Some(tx) => query.execute(&mut **tx).await,
                None => query.execute(&self.pool).await,
            }
        }
        .map_err(|e| SqlStoreError::query(e, sql))?;
        self.log_query(sql, started);
        Ok(result.rows_affected())
    }

    /// Execute an INSERT ... RETURNING statement and decode the returned key
    pub async fn insert_returning(&self, sql: &str, bindings: Vec<Value>) -> SqlResult<Value> {
        let started = Instant::now();
        let mut query = sqlx::query(sql);
        for value in bindings {
            query = bind_value!(query, value);
        }
        let row = {
            let mut guard = self.tx.lock().await;
            match guard.as_mut() {
                Some(tx) => query.fetch_one(&mut **tx).await,
                None => query.fetch_one(&self.pool).await,
            }
        }
        .map_err(|e| SqlStoreError::query(e, sql))?;
        self.log_query(sql, started);
        match row.columns().first() {
            Some(col) => Ok(decode_column(&row, 0, col.type_info().name())),
            None => Ok(Value::Null),
        }
    }

    // ==================== Single-table conveniences ====================

    /// Insert one row, returning the generated `id`
    pub async fn insert_into(&self, table: &str, data: RowMap) -> SqlResult<Value> {
        let table = self.prefixed(table);
        let columns: Vec<&str> = data.keys().map(String::as_str).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|n| format!("${}", n)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING id",
            table,
            columns.join(", "),
            placeholders.join(", ")
        );
        let bindings: Vec<Value> = data.into_iter().map(|(_, v)| v).collect();
        self.insert_returning(&sql, bindings).await
    }

    /// Update rows matching an equality filter; returns the affected count
    pub async fn update_where(&self, table: &str, data: RowMap, filter: RowMap) -> SqlResult<u64> {
        let table = self.prefixed(table);
        let mut counter = 1usize;
        let mut sets = Vec::with_capacity(data.len());
        let mut bindings = Vec::with_capacity(data.len() + filter.len());
        for (column, value) in data {
            sets.push(format!("{} = ${}", column, counter));
            counter += 1;
            bindings.push(value);
        }
        let (where_sql, where_bindings) = equality_filter(&filter, &mut counter);
        bindings.extend(where_bindings);
        let sql = format!("UPDATE {} SET {}{}", table, sets.join(", "), where_sql);
        self.execute(&sql, bindings).await
    }

    /// Delete rows matching an equality filter; returns the affected count
    pub async fn delete_where(&self, table: &str, filter: RowMap) -> SqlResult<u64> {
        let table = self.prefixed(table);
        let mut counter = 1usize;
        let (where_sql, bindings) = equality_filter(&filter, &mut counter);
        let sql = format!("DELETE FROM {}{}", table, where_sql);
        self.execute(&sql, bindings).await
    }

    // ==================== Transactions ====================

    /// Open a transaction; all statements on this handle run inside it until
    /// `commit` or `rollback`. Fails with `TransactionOpen` when one is
    /// already open.
    pub async fn begin_transaction(&self) -> SqlResult<()> {
        let mut guard = self.tx.lock().await;
        if guard.is_some() {
            return Err(SqlStoreError::TransactionOpen);
        }
        let tx = self.pool.begin().await.map_err(SqlStoreError::unavailable)?;
        *guard = Some(tx);
        Ok(())
    }

    pub async fn commit(&self) -> SqlResult<()> {
        let mut guard = self.tx.lock().await;
        match guard.take() {
            Some(tx) => tx.commit().await.map_err(|e| SqlStoreError::query(e, "COMMIT")),
            None => Err(SqlStoreError::NoTransaction),
        }
    }

    pub async fn rollback(&self) -> SqlResult<()> {
        let mut guard = self.tx.lock().await;
        match guard.take() {
            Some(tx) => tx
                .rollback()
                .await
                .map_err(|e| SqlStoreError::query(e, "ROLLBACK")),
            None => Err(SqlStoreError::NoTransaction),
        }
    }

    pub async fn in_transaction(&self) -> bool {
        self.tx.lock().await.is_some()
    }

    /// Run a closure inside a transaction: commit on success, roll back and
    /// re-raise on failure.
    pub async fn transaction<T, F, Fut>(&self, f: F) -> SqlResult<T>
    where
        F: FnOnce(SqlDatabase) -> Fut,
        Fut: Future<Output = SqlResult<T>>,
    {
        self.begin_transaction().await?;
        match f(self.clone()).await {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback failed after transaction error");
                }
                Err(err)
            }
        }
    }

    /// Verify the connection is alive
    pub async fn health_check(&self) -> SqlResult<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| SqlStoreError::query(e, "SELECT 1"))?;
        Ok(())
    }
}

/// Render an AND-joined equality filter, continuing placeholder numbering
fn equality_filter(filter: &RowMap, counter: &mut usize) -> (String, Vec<Value>) {
    if filter.is_empty() {
        return (String::new(), Vec::new());
    }
    let mut parts = Vec::with_capacity(filter.len());
    let mut bindings = Vec::with_capacity(filter.len());
    for (column, value) in filter {
        if value.is_null() {
            parts.push(format!("{} IS NULL", column));
        } else {
            parts.push(format!("{} = ${}", column, counter));
            *counter += 1;
            bindings.push(value.clone());
        }
    }
    (format!(" WHERE {}", parts.join(" AND ")), bindings)
}
