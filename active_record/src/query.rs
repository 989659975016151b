//! Backend-neutral query handle.
//!
//! `RecordQuery` wraps whichever fluent builder the store's strategy
//! produced and mirrors the surface the two builders share. Every method
//! matches exhaustively on the wrapped variant, so adding a backend is a
//! compile error until every operation answers for it.

use serde::Serialize;
use serde_json::Value;

use document_store::DocumentQuery;
use sql_store::SqlQuery;

use crate::errors::RecordResult;
use crate::record::AttributeMap;

pub enum RecordQuery {
    Sql(SqlQuery),
    Document(DocumentQuery),
}

/// Record-layer page, built from either backend's pagination result
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub data: Vec<AttributeMap>,
    pub total: i64,
    pub per_page: i64,
    pub current_page: i64,
    pub last_page: i64,
}

impl From<sql_store::Page> for Page {
    fn from(page: sql_store::Page) -> Self {
        Self {
            data: page.data,
            total: page.total,
            per_page: page.per_page,
            current_page: page.current_page,
            last_page: page.last_page,
        }
    }
}

impl From<document_store::Page> for Page {
    fn from(page: document_store::Page) -> Self {
        Self {
            data: page.data,
            total: page.total,
            per_page: page.per_page,
            current_page: page.current_page,
            last_page: page.last_page,
        }
    }
}

impl RecordQuery {
    // ==================== Fluent surface ====================

    pub fn where_eq(self, field: &str, value: impl Into<Value>) -> Self {
        match self {
            Self::Sql(q) => Self::Sql(q.where_eq(field, value)),
            Self::Document(q) => Self::Document(q.where_eq(field, value.into())),
        }
    }

    /// Comparison predicate. The relational side passes unknown operators
    /// through to the engine; the document side's operator map is closed
    /// and rejects them here.
    pub fn where_cmp(
        self,
        field: &str,
        operator: &str,
        value: impl Into<Value>,
    ) -> RecordResult<Self> {
        match self {
            Self::Sql(q) => Ok(Self::Sql(q.where_cmp(field, operator, value))),
            Self::Document(q) => Ok(Self::Document(q.where_cmp(field, operator, value.into())?)),
        }
    }

    pub fn where_in(self, field: &str, values: Vec<Value>) -> Self {
        match self {
            Self::Sql(q) => Self::Sql(q.where_in(field, values)),
            Self::Document(q) => Self::Document(q.where_in(field, values)),
        }
    }

    pub fn where_not_in(self, field: &str, values: Vec<Value>) -> Self {
        match self {
            Self::Sql(q) => Self::Sql(q.where_not_in(field, values)),
            Self::Document(q) => Self::Document(q.where_not_in(field, values)),
        }
    }

    pub fn where_null(self, field: &str) -> Self {
        match self {
            Self::Sql(q) => Self::Sql(q.where_null(field)),
            Self::Document(q) => Self::Document(q.where_null(field)),
        }
    }

    pub fn where_not_null(self, field: &str) -> Self {
        match self {
            Self::Sql(q) => Self::Sql(q.where_not_null(field)),
            Self::Document(q) => Self::Document(q.where_not_null(field)),
        }
    }

    pub fn where_between(
        self,
        field: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        match self {
            Self::Sql(q) => Self::Sql(q.where_between(field, low, high)),
            Self::Document(q) => {
                Self::Document(q.where_between(field, low.into(), high.into()))
            }
        }
    }

    pub fn select(self, fields: &[&str]) -> Self {
        match self {
            Self::Sql(q) => Self::Sql(q.select(fields)),
            Self::Document(q) => Self::Document(q.select(fields)),
        }
    }

    pub fn order_by(self, field: &str, direction: &str) -> Self {
        match self {
            Self::Sql(q) => Self::Sql(q.order_by(field, direction)),
            Self::Document(q) => Self::Document(q.order_by(field, direction)),
        }
    }

    pub fn limit(self, count: i64) -> Self {
        match self {
            Self::Sql(q) => Self::Sql(q.limit(count)),
            Self::Document(q) => Self::Document(q.limit(count)),
        }
    }

    pub fn offset(self, count: i64) -> Self {
        match self {
            Self::Sql(q) => Self::Sql(q.offset(count)),
            Self::Document(q) => Self::Document(q.offset(count)),
        }
    }

    // ==================== Terminals ====================

    pub async fn get(&self) -> RecordResult<Vec<AttributeMap>> {
        match self {
            Self::Sql(q) => Ok(q.get().await?),
            Self::Document(q) => Ok(q.get().await?),
        }
    }

    pub async fn first(&self) -> RecordResult<Option<AttributeMap>> {
        match self {
            Self::Sql(q) => Ok(q.first().await?),
            Self::Document(q) => Ok(q.first().await?),
        }
    }

    pub async fn value(&self, field: &str) -> RecordResult<Option<Value>> {
        match self {
            Self::Sql(q) => Ok(q.value(field).await?),
            Self::Document(q) => Ok(q.value(field).await?),
        }
    }

    pub async fn pluck(&self, field: &str) -> RecordResult<Vec<Value>> {
        match self {
            Self::Sql(q) => Ok(q.pluck(field).await?),
            Self::Document(q) => Ok(q.pluck(field).await?),
        }
    }

    pub async fn count(&self) -> RecordResult<i64> {
        match self {
            Self::Sql(q) => Ok(q.count().await?),
            Self::Document(q) => Ok(q.count().await?),
        }
    }

    pub async fn exists(&self) -> RecordResult<bool> {
        match self {
            Self::Sql(q) => Ok(q.exists().await?),
            Self::Document(q) => Ok(q.exists().await?),
        }
    }

    pub async fn sum(&self, field: &str) -> RecordResult<Value> {
        match self {
            Self::Sql(q) => Ok(q.sum(field).await?),
            Self::Document(q) => Ok(q.sum(field).await?),
        }
    }

    pub async fn avg(&self, field: &str) -> RecordResult<Value> {
        match self {
            Self::Sql(q) => Ok(q.avg(field).await?),
            Self::Document(q) => Ok(q.avg(field).await?),
        }
    }

    pub async fn max(&self, field: &str) -> RecordResult<Value> {
        match self {
            Self::Sql(q) => Ok(q.max(field).await?),
            Self::Document(q) => Ok(q.max(field).await?),
        }
    }

    pub async fn min(&self, field: &str) -> RecordResult<Value> {
        match self {
            Self::Sql(q) => Ok(q.min(field).await?),
            Self::Document(q) => Ok(q.min(field).await?),
        }
    }

    pub async fn paginate(&self, per_page: i64, page: i64) -> RecordResult<Page> {
        match self {
            Self::Sql(q) => Ok(q.paginate(per_page, page).await?.into()),
            Self::Document(q) => Ok(q.paginate(per_page, page).await?.into()),
        }
    }

    pub async fn insert(&self, data: AttributeMap) -> RecordResult<Value> {
        match self {
            Self::Sql(q) => Ok(q.insert(data).await?),
            Self::Document(q) => Ok(q.insert(data).await?),
        }
    }

    pub async fn insert_batch(&self, rows: Vec<AttributeMap>) -> RecordResult<u64> {
        match self {
            Self::Sql(q) => Ok(q.insert_batch(rows).await?),
            Self::Document(q) => Ok(q.insert_batch(rows).await?),
        }
    }

    pub async fn update(&self, changes: AttributeMap) -> RecordResult<u64> {
        match self {
            Self::Sql(q) => Ok(q.update(changes).await?),
            Self::Document(q) => Ok(q.update(changes).await?),
        }
    }

    pub async fn delete(&self) -> RecordResult<u64> {
        match self {
            Self::Sql(q) => Ok(q.delete().await?),
            Self::Document(q) => Ok(q.delete().await?),
        }
    }

    pub async fn increment(&self, field: &str, amount: i64) -> RecordResult<u64> {
        match self {
            Self::Sql(q) => Ok(q.increment(field, amount).await?),
            Self::Document(q) => Ok(q.increment(field, amount).await?),
        }
    }

    pub async fn decrement(&self, field: &str, amount: i64) -> RecordResult<u64> {
        match self {
            Self::Sql(q) => Ok(q.decrement(field, amount).await?),
            Self::Document(q) => Ok(q.decrement(field, amount).await?),
        }
    }
}
