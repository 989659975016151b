//! Fluent SQL query builder.
//!
//! Chainable methods consume and return the builder; terminal methods
//! execute through the attached [`SqlDatabase`] and return plain data.
//! Compilation is handled in [`compile`], which derives statement text and
//! bindings together.

mod clause;
mod compile;

pub use clause::{
    Connector, HavingClause, JoinClause, JoinKind, OrderClause, Predicate, SortDir, WhereClause,
};
pub use compile::CompiledQuery;

use serde_json::Value;

use crate::connection::SqlDatabase;
use crate::errors::SqlResult;
use crate::page::Page;
use crate::value::RowMap;

use self::compile::{
    compile_adjust, compile_delete, compile_insert, compile_insert_batch, compile_select,
    compile_update,
};

/// Fluent query over one (prefixed) table
#[derive(Clone)]
pub struct SqlQuery {
    pub(crate) db: SqlDatabase,
    pub(crate) table: String,
    pub(crate) columns: Vec<String>,
    pub(crate) distinct_flag: bool,
    pub(crate) joins: Vec<JoinClause>,
    pub(crate) wheres: Vec<WhereClause>,
    pub(crate) group_columns: Vec<String>,
    pub(crate) havings: Vec<HavingClause>,
    pub(crate) orders: Vec<OrderClause>,
    pub(crate) limit_value: Option<i64>,
    pub(crate) offset_value: Option<i64>,
    pub(crate) key_column: String,
}

impl SqlQuery {
    pub fn table(db: SqlDatabase, table: &str) -> Self {
        let table = db.prefixed(table);
        Self {
            db,
            table,
            columns: Vec::new(),
            distinct_flag: false,
            joins: Vec::new(),
            wheres: Vec::new(),
            group_columns: Vec::new(),
            havings: Vec::new(),
            orders: Vec::new(),
            limit_value: None,
            offset_value: None,
            key_column: "id".to_string(),
        }
    }

    /// Column returned by `insert` (`RETURNING ...`); defaults to `id`
    pub fn key_column(mut self, column: &str) -> Self {
        self.key_column = column.to_string();
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    // ==================== Fluent construction ====================

    pub fn select(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct_flag = true;
        self
    }

    fn push_where(mut self, predicate: Predicate, connector: Connector) -> Self {
        self.wheres.push(WhereClause {
            predicate,
            connector,
        });
        self
    }

    /// Two-argument form: `column = value`
    pub fn where_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.where_cmp(column, "=", value)
    }

    /// Three-argument form with the operator as data. The operator passes
    /// through to the engine unvalidated.
    pub fn where_cmp(self, column: &str, operator: &str, value: impl Into<Value>) -> Self {
        self.push_where(
            Predicate::Basic {
                column: column.to_string(),
                operator: operator.to_string(),
                value: value.into(),
            },
            Connector::And,
        )
    }

    pub fn or_where_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.or_where_cmp(column, "=", value)
    }

    pub fn or_where_cmp(self, column: &str, operator: &str, value: impl Into<Value>) -> Self {
        self.push_where(
            Predicate::Basic {
                column: column.to_string(),
                operator: operator.to_string(),
                value: value.into(),
            },
            Connector::Or,
        )
    }

    pub fn where_in(self, column: &str, values: Vec<Value>) -> Self {
        self.push_where(
            Predicate::In {
                column: column.to_string(),
                values,
            },
            Connector::And,
        )
    }

    pub fn where_not_in(self, column: &str, values: Vec<Value>) -> Self {
        self.push_where(
            Predicate::NotIn {
                column: column.to_string(),
                values,
            },
            Connector::And,
        )
    }

    pub fn where_null(self, column: &str) -> Self {
        self.push_where(
            Predicate::Null {
                column: column.to_string(),
            },
            Connector::And,
        )
    }

    pub fn where_not_null(self, column: &str) -> Self {
        self.push_where(
            Predicate::NotNull {
                column: column.to_string(),
            },
            Connector::And,
        )
    }

    pub fn where_between(
        self,
        column: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.push_where(
            Predicate::Between {
                column: column.to_string(),
                low: low.into(),
                high: high.into(),
            },
            Connector::And,
        )
    }

    /// Verbatim fragment escape hatch. `?` placeholders are renumbered into
    /// the statement's `$N` sequence; the fragment itself is the caller's
    /// responsibility, values must always travel through `bindings`.
    pub fn where_raw(self, fragment: &str, bindings: Vec<Value>) -> Self {
        self.push_where(
            Predicate::Raw {
                sql: fragment.to_string(),
                bindings,
            },
            Connector::And,
        )
    }

    pub fn join(self, table: &str, left: &str, operator: &str, right: &str) -> Self {
        self.push_join(JoinKind::Inner, table, left, operator, right)
    }

    pub fn left_join(self, table: &str, left: &str, operator: &str, right: &str) -> Self {
        self.push_join(JoinKind::Left, table, left, operator, right)
    }

    pub fn right_join(self, table: &str, left: &str, operator: &str, right: &str) -> Self {
        self.push_join(JoinKind::Right, table, left, operator, right)
    }

    fn push_join(
        mut self,
        kind: JoinKind,
        table: &str,
        left: &str,
        operator: &str,
        right: &str,
    ) -> Self {
        let table = self.db.prefixed(table);
        self.joins.push(JoinClause {
            kind,
            table,
            left: left.to_string(),
            operator: operator.to_string(),
            right: right.to_string(),
        });
        self
    }

    pub fn group_by(mut self, columns: &[&str]) -> Self {
        self.group_columns
            .extend(columns.iter().map(|c| c.to_string()));
        self
    }

    pub fn having(mut self, column: &str, operator: &str, value: impl Into<Value>) -> Self {
        self.havings.push(HavingClause {
            column: column.to_string(),
            operator: operator.to_string(),
            value: value.into(),
            connector: Connector::And,
        });
        self
    }

    pub fn order_by(mut self, column: &str, direction: &str) -> Self {
        self.orders.push(OrderClause {
            column: column.to_string(),
            direction: SortDir::parse(direction),
        });
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit_value = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset_value = Some(offset);
        self
    }

    pub fn has_wheres(&self) -> bool {
        !self.wheres.is_empty()
    }

    // ==================== Diagnostics ====================

    /// Compiled SELECT text for the current state
    pub fn to_sql(&self) -> String {
        compile_select(self).sql
    }

    /// Bindings for the current state, in placeholder order
    pub fn current_bindings(&self) -> Vec<Value> {
        compile_select(self).bindings
    }

    pub fn select_statement(&self) -> CompiledQuery {
        compile_select(self)
    }

    pub fn update_statement(&self, data: &RowMap) -> CompiledQuery {
        compile_update(self, data)
    }

    pub fn delete_statement(&self) -> CompiledQuery {
        compile_delete(self)
    }

    pub fn insert_statement(&self, data: &RowMap) -> CompiledQuery {
        compile_insert(&self.table, &self.key_column, data)
    }

    /// Statement an aggregate terminal would run, for diagnostics
    pub fn aggregate_statement(&self, expression: &str) -> CompiledQuery {
        let mut q = self.clone();
        q.columns = vec![format!("{} AS aggregate", expression)];
        q.distinct_flag = false;
        q.orders.clear();
        q.limit_value = None;
        q.offset_value = None;
        compile_select(&q)
    }

    // ==================== Terminal methods ====================

    pub async fn get(&self) -> SqlResult<Vec<RowMap>> {
        let compiled = compile_select(self);
        self.db.select(&compiled.sql, compiled.bindings).await
    }

    pub async fn first(&self) -> SqlResult<Option<RowMap>> {
        let mut q = self.clone();
        q.limit_value = Some(1);
        let compiled = compile_select(&q);
        self.db.select_one(&compiled.sql, compiled.bindings).await
    }

    /// First row's value for one column
    pub async fn value(&self, column: &str) -> SqlResult<Option<Value>> {
        let mut q = self.clone();
        q.columns = vec![column.to_string()];
        q.limit_value = Some(1);
        let compiled = compile_select(&q);
        self.db.select_value(&compiled.sql, compiled.bindings).await
    }

    /// One column across all matched rows
    pub async fn pluck(&self, column: &str) -> SqlResult<Vec<Value>> {
        let mut q = self.clone();
        q.columns = vec![column.to_string()];
        let rows = q.get().await?;
        let key = column.rsplit('.').next().unwrap_or(column);
        Ok(rows
            .into_iter()
            .map(|mut row| row.remove(key).unwrap_or(Value::Null))
            .collect())
    }

    pub async fn exists(&self) -> SqlResult<bool> {
        let mut q = self.clone();
        q.columns = vec!["1".to_string()];
        q.orders.clear();
        q.limit_value = Some(1);
        q.offset_value = None;
        let compiled = compile_select(&q);
        Ok(self
            .db
            .select_one(&compiled.sql, compiled.bindings)
            .await?
            .is_some())
    }

    /// Aggregates run over the full filtered set: limit, offset and ordering
    /// are cleared on a cloned state.
    async fn aggregate(&self, expression: &str) -> SqlResult<Option<Value>> {
        let compiled = self.aggregate_statement(expression);
        let row = self.db.select_one(&compiled.sql, compiled.bindings).await?;
        Ok(row.and_then(|mut r| r.remove("aggregate")))
    }

    pub async fn count(&self) -> SqlResult<i64> {
        Ok(self
            .aggregate("COUNT(*)")
            .await?
            .and_then(|v| v.as_i64())
            .unwrap_or(0))
    }

    pub async fn sum(&self, column: &str) -> SqlResult<Value> {
        Ok(self
            .aggregate(&format!("COALESCE(SUM({}), 0)", column))
            .await?
            .unwrap_or(Value::from(0)))
    }

    pub async fn avg(&self, column: &str) -> SqlResult<Value> {
        Ok(self
            .aggregate(&format!("AVG({})", column))
            .await?
            .unwrap_or(Value::Null))
    }

    pub async fn max(&self, column: &str) -> SqlResult<Value> {
        Ok(self
            .aggregate(&format!("MAX({})", column))
            .await?
            .unwrap_or(Value::Null))
    }

    pub async fn min(&self, column: &str) -> SqlResult<Value> {
        Ok(self
            .aggregate(&format!("MIN({})", column))
            .await?
            .unwrap_or(Value::Null))
    }

    /// Count plus a data slice. The count runs on a cloned state stripped of
    /// limit, offset and ordering so the slice bounds never leak into it.
    pub async fn paginate(&self, per_page: i64, page: i64) -> SqlResult<Page> {
        let per_page = per_page.max(1);
        let page = page.max(1);
        let mut count_q = self.clone();
        count_q.limit_value = None;
        count_q.offset_value = None;
        count_q.orders.clear();
        let total = count_q.count().await?;
        let data_q = self.clone().limit(per_page).offset((page - 1) * per_page);
        let compiled = compile_select(&data_q);
        let data = self.db.select(&compiled.sql, compiled.bindings).await?;
        Ok(Page::new(data, total, per_page, page))
    }

    /// Insert one row and return the generated key
    pub async fn insert(&self, data: RowMap) -> SqlResult<Value> {
        let compiled = compile_insert(&self.table, &self.key_column, &data);
        self.db.insert_returning(&compiled.sql, compiled.bindings).await
    }

    /// Insert many rows in one statement; returns the inserted count
    pub async fn insert_batch(&self, rows: Vec<RowMap>) -> SqlResult<u64> {
        match compile_insert_batch(&self.table, &rows) {
            Some(compiled) => self.db.execute(&compiled.sql, compiled.bindings).await,
            None => Ok(0),
        }
    }

    /// Update matched rows. With no WHERE predicates every row is updated;
    /// that is the caller's responsibility and is logged.
    pub async fn update(&self, data: RowMap) -> SqlResult<u64> {
        if self.wheres.is_empty() {
            tracing::warn!(table = %self.table, "UPDATE with no WHERE clause affects every row");
        }
        let compiled = compile_update(self, &data);
        self.db.execute(&compiled.sql, compiled.bindings).await
    }

    /// Delete matched rows. Same unguarded-WHERE contract as `update`.
    pub async fn delete(&self) -> SqlResult<u64> {
        if self.wheres.is_empty() {
            tracing::warn!(table = %self.table, "DELETE with no WHERE clause affects every row");
        }
        let compiled = compile_delete(self);
        self.db.execute(&compiled.sql, compiled.bindings).await
    }

    pub async fn increment(&self, column: &str, amount: i64) -> SqlResult<u64> {
        let compiled = compile_adjust(self, column, amount);
        self.db.execute(&compiled.sql, compiled.bindings).await
    }

    pub async fn decrement(&self, column: &str, amount: i64) -> SqlResult<u64> {
        self.increment(column, -amount).await
    }
}
