//! Persistence mediation for records.
//!
//! A `RecordStore<S>` owns the storage strategy injected at construction
//! and carries every operation a schema's records need: lookups under the
//! soft-delete scope, insert/update with timestamp stamping and dirty-set
//! emission, soft and hard deletes, and the conventional relationship
//! lookups. Records themselves stay plain data.

use bson::{doc, Bson, Document};
use serde_json::Value;

use document_store::DocumentDatabase;
use sql_store::SqlDatabase;

use crate::errors::{RecordError, RecordResult};
use crate::query::RecordQuery;
use crate::record::{AttributeMap, Record};
use crate::schema::Schema;

/// The storage strategy, chosen once at composition time
#[derive(Clone)]
pub enum StorageBackend {
    Sql(SqlDatabase),
    Document(DocumentDatabase),
}

impl StorageBackend {
    pub async fn health_check(&self) -> RecordResult<()> {
        match self {
            Self::Sql(db) => Ok(db.health_check().await?),
            Self::Document(db) => Ok(db.health_check().await?),
        }
    }
}

pub struct RecordStore<S: Schema> {
    backend: StorageBackend,
    _schema: std::marker::PhantomData<S>,
}

impl<S: Schema> Clone for RecordStore<S> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            _schema: std::marker::PhantomData,
        }
    }
}

impl<S: Schema> RecordStore<S> {
    pub fn new(backend: StorageBackend) -> Self {
        Self {
            backend,
            _schema: std::marker::PhantomData,
        }
    }

    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    // ==================== Query entry points ====================

    /// A fresh query, pre-scoped to exclude soft-deleted rows when the
    /// schema opts in
    pub fn query(&self) -> RecordQuery {
        scoped::<S>(table_query::<S>(&self.backend))
    }

    /// A fresh query with no soft-delete scope
    pub fn query_with_trashed(&self) -> RecordQuery {
        table_query::<S>(&self.backend)
    }

    // ==================== Lookups ====================

    pub async fn find(&self, key: impl Into<Value>) -> RecordResult<Option<Record<S>>> {
        let row = self
            .query()
            .where_eq(S::primary_key(), key)
            .first()
            .await?;
        Ok(row.map(Record::from_row))
    }

    pub async fn find_or_fail(&self, key: impl Into<Value>) -> RecordResult<Record<S>> {
        let key = key.into();
        match self.find(key.clone()).await? {
            Some(record) => Ok(record),
            None => Err(RecordError::not_found(S::entity_name(), &key)),
        }
    }

    pub async fn all(&self) -> RecordResult<Vec<Record<S>>> {
        let rows = self.query().get().await?;
        Ok(rows.into_iter().map(Record::from_row).collect())
    }

    // ==================== Writes ====================

    /// Mass-assign and persist in one step
    pub async fn create(&self, attrs: AttributeMap) -> RecordResult<Record<S>> {
        let mut record = Record::from_attributes(attrs);
        self.save(&mut record).await?;
        Ok(record)
    }

    /// Insert when new, otherwise update the dirty subset. A clean
    /// existing record is a success no-op.
    pub async fn save(&self, record: &mut Record<S>) -> RecordResult<()> {
        if record.exists() {
            self.perform_update(record).await
        } else {
            self.perform_insert(record).await
        }
    }

    async fn perform_insert(&self, record: &mut Record<S>) -> RecordResult<()> {
        if S::uses_timestamps() {
            let now = now_rfc3339();
            if !record.attributes().contains_key("created_at") {
                record.set_unchecked("created_at", Value::from(now.clone()));
            }
            if !record.attributes().contains_key("updated_at") {
                record.set_unchecked("updated_at", Value::from(now));
            }
        }
        let data = record.attributes().clone();
        tracing::debug!(entity = S::entity_name(), fields = data.len(), "inserting record");
        let key = self.query_with_trashed().insert(data).await?;
        record.set_unchecked(S::primary_key(), key);
        record.sync_original();
        Ok(())
    }

    /// Updates address the row by primary key with no soft-delete scope,
    /// so restoring a trashed record can reach it
    async fn perform_update(&self, record: &mut Record<S>) -> RecordResult<()> {
        if !record.is_dirty() {
            return Ok(());
        }
        if S::uses_timestamps() {
            record.set_unchecked("updated_at", Value::from(now_rfc3339()));
        }
        let key = record.key().cloned().ok_or(RecordError::MissingKey)?;
        let changes = record.dirty();
        tracing::debug!(
            entity = S::entity_name(),
            fields = changes.len(),
            "updating dirty fields"
        );
        self.query_with_trashed()
            .where_eq(S::primary_key(), key)
            .update(changes)
            .await?;
        record.sync_original();
        Ok(())
    }

    /// Soft-deleting schemas stamp `deleted_at` and keep the row;
    /// everything else hard-deletes
    pub async fn delete(&self, record: &mut Record<S>) -> RecordResult<()> {
        if !record.exists() {
            return Ok(());
        }
        if S::soft_deletes() {
            record.set_unchecked(S::deleted_at_column(), Value::from(now_rfc3339()));
            self.perform_update(record).await
        } else {
            self.hard_delete(record).await
        }
    }

    /// Hard delete regardless of soft-delete support
    pub async fn force_delete(&self, record: &mut Record<S>) -> RecordResult<()> {
        self.hard_delete(record).await
    }

    /// Clear the deletion stamp so the default scope sees the row again
    pub async fn restore(&self, record: &mut Record<S>) -> RecordResult<()> {
        record.set_unchecked(S::deleted_at_column(), Value::Null);
        self.perform_update(record).await
    }

    async fn hard_delete(&self, record: &mut Record<S>) -> RecordResult<()> {
        let key = record.key().cloned().ok_or(RecordError::MissingKey)?;
        self.query_with_trashed()
            .where_eq(S::primary_key(), key)
            .delete()
            .await?;
        record.mark_removed();
        Ok(())
    }

    // ==================== Relationships ====================
    //
    // Executed immediately, one extra round-trip per call (two for the
    // junction form), returning raw row maps.

    /// Rows of `R` whose `{S::entity_name()}_id` equals this record's key
    pub async fn has_many<R: Schema>(
        &self,
        record: &Record<S>,
    ) -> RecordResult<Vec<AttributeMap>> {
        let key = record.key().cloned().ok_or(RecordError::MissingKey)?;
        let foreign_key = format!("{}_id", S::entity_name());
        self.related_query::<R>()
            .where_eq(&foreign_key, key)
            .get()
            .await
    }

    pub async fn has_one<R: Schema>(
        &self,
        record: &Record<S>,
    ) -> RecordResult<Option<AttributeMap>> {
        let key = record.key().cloned().ok_or(RecordError::MissingKey)?;
        let foreign_key = format!("{}_id", S::entity_name());
        self.related_query::<R>()
            .where_eq(&foreign_key, key)
            .first()
            .await
    }

    /// The row of `R` this record's `{R::entity_name()}_id` points at
    pub async fn belongs_to<R: Schema>(
        &self,
        record: &Record<S>,
    ) -> RecordResult<Option<AttributeMap>> {
        let foreign_key = format!("{}_id", R::entity_name());
        let parent_key = match record.attributes().get(&foreign_key) {
            Some(value) if !value.is_null() => value.clone(),
            _ => return Ok(None),
        };
        self.related_query::<R>()
            .where_eq(R::primary_key(), parent_key)
            .first()
            .await
    }

    /// Junction-table relationship: junction rows by this record's key,
    /// then related rows by membership
    pub async fn belongs_to_many<R: Schema>(
        &self,
        record: &Record<S>,
        junction: &str,
    ) -> RecordResult<Vec<AttributeMap>> {
        let key = record.key().cloned().ok_or(RecordError::MissingKey)?;
        let local_column = format!("{}_id", S::entity_name());
        let related_column = format!("{}_id", R::entity_name());
        let junction_rows = plain_query(&self.backend, junction)
            .where_eq(&local_column, key)
            .get()
            .await?;
        let related_keys: Vec<Value> = junction_rows
            .into_iter()
            .filter_map(|mut row| row.remove(&related_column))
            .filter(|value| !value.is_null())
            .collect();
        if related_keys.is_empty() {
            return Ok(Vec::new());
        }
        self.related_query::<R>()
            .where_in(R::primary_key(), related_keys)
            .get()
            .await
    }

    pub(crate) fn related_query<R: Schema>(&self) -> RecordQuery {
        scoped::<R>(table_query::<R>(&self.backend))
    }
}

fn table_query<S: Schema>(backend: &StorageBackend) -> RecordQuery {
    plain_query(backend, S::table())
}

fn plain_query(backend: &StorageBackend, table: &str) -> RecordQuery {
    match backend {
        StorageBackend::Sql(db) => RecordQuery::Sql(db.table(table)),
        StorageBackend::Document(db) => RecordQuery::Document(db.collection(table)),
    }
}

/// Apply the schema's soft-delete scope. The document branch matches both
/// a stored null and an absent field, since document rows written before
/// soft deletion was enabled carry no such field at all.
fn scoped<S: Schema>(query: RecordQuery) -> RecordQuery {
    if !S::soft_deletes() {
        return query;
    }
    let column = S::deleted_at_column();
    match query {
        RecordQuery::Sql(q) => RecordQuery::Sql(q.where_null(column)),
        RecordQuery::Document(q) => {
            let mut null_branch = Document::new();
            null_branch.insert(column, Bson::Null);
            let mut absent_branch = Document::new();
            absent_branch.insert(column, doc! {"$exists": false});
            RecordQuery::Document(q.where_document(doc! {
                "$or": [null_branch, absent_branch]
            }))
        }
    }
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
