//! Document store connection wrapper.
//!
//! Owns the MongoDB client and database name, converts between attribute
//! maps and wire documents, and applies the timestamp conventions: inserts
//! get `created_at`/`updated_at` when absent, updates always stamp
//! `updated_at`, merged into an existing `$set` stage when the caller sent
//! raw modifier operators.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bson::{doc, Bson, Document};
use config::DocumentConfig;
use futures::stream::TryStreamExt;
use mongodb::options::{ClientOptions, FindOneOptions, FindOptions};
use mongodb::{Client, Collection};
use serde_json::Value;

use crate::errors::{DocResult, DocumentStoreError};
use crate::value::{bson_to_value, document_to_map, map_to_document, now_rfc3339, DocumentMap};

/// Shared handle to the document store
#[derive(Clone, Debug)]
pub struct DocumentDatabase {
    client: Client,
    database: String,
    collection_prefix: String,
    query_log: Arc<AtomicBool>,
}

impl DocumentDatabase {
    /// Build a handle from configuration. The driver defers socket
    /// establishment until the first operation, so this only fails on a
    /// malformed URI.
    pub async fn connect(config: &DocumentConfig) -> DocResult<Self> {
        let options = ClientOptions::parse(&config.uri)
            .await
            .map_err(DocumentStoreError::unavailable)?;
        let client = Client::with_options(options).map_err(DocumentStoreError::unavailable)?;
        Ok(Self {
            client,
            database: config.database.clone(),
            collection_prefix: config.collection_prefix.clone(),
            query_log: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn database_name(&self) -> &str {
        &self.database
    }

    /// Apply the configured collection prefix exactly once
    pub fn prefixed(&self, collection: &str) -> String {
        if self.collection_prefix.is_empty() || collection.starts_with(&self.collection_prefix) {
            collection.to_string()
        } else {
            format!("{}{}", self.collection_prefix, collection)
        }
    }

    fn handle(&self, prefixed_name: &str) -> Collection<Document> {
        self.client
            .database(&self.database)
            .collection::<Document>(prefixed_name)
    }

    /// Start a fluent query against a collection
    pub fn collection(&self, name: &str) -> crate::builder::DocumentQuery {
        crate::builder::DocumentQuery::new(self.clone(), name)
    }

    pub fn enable_query_log(&self) {
        self.query_log.store(true, Ordering::Relaxed);
    }

    pub fn disable_query_log(&self) {
        self.query_log.store(false, Ordering::Relaxed);
    }

    fn log_op(&self, collection: &str, op: &str, started: Instant) {
        if self.query_log.load(Ordering::Relaxed) {
            tracing::debug!(
                collection = %collection,
                op = %op,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "document operation"
            );
        }
    }

    // ==================== Read operations ====================

    pub async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: Option<FindOptions>,
    ) -> DocResult<Vec<DocumentMap>> {
        let name = self.prefixed(collection);
        let started = Instant::now();
        let cursor = self
            .handle(&name)
            .find(filter)
            .with_options(options)
            .await
            .map_err(|e| DocumentStoreError::operation(e, &name))?;
        let docs: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| DocumentStoreError::operation(e, &name))?;
        self.log_op(&name, "find", started);
        Ok(docs.into_iter().map(hydrate).collect())
    }

    pub async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        options: Option<FindOneOptions>,
    ) -> DocResult<Option<DocumentMap>> {
        let name = self.prefixed(collection);
        let started = Instant::now();
        let doc = self
            .handle(&name)
            .find_one(filter)
            .with_options(options)
            .await
            .map_err(|e| DocumentStoreError::operation(e, &name))?;
        self.log_op(&name, "find_one", started);
        Ok(doc.map(hydrate))
    }

    /// Run an aggregation pipeline. Results pass through without id
    /// aliasing, since group stages repurpose `_id`.
    pub async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> DocResult<Vec<DocumentMap>> {
        let name = self.prefixed(collection);
        let started = Instant::now();
        let cursor = self
            .handle(&name)
            .aggregate(pipeline)
            .await
            .map_err(|e| DocumentStoreError::operation(e, &name))?;
        let docs: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| DocumentStoreError::operation(e, &name))?;
        self.log_op(&name, "aggregate", started);
        Ok(docs.into_iter().map(document_to_map).collect())
    }

    pub async fn count(&self, collection: &str, filter: Document) -> DocResult<u64> {
        let name = self.prefixed(collection);
        let started = Instant::now();
        let count = self
            .handle(&name)
            .count_documents(filter)
            .await
            .map_err(|e| DocumentStoreError::operation(e, &name))?;
        self.log_op(&name, "count", started);
        Ok(count)
    }

    // ==================== Write operations ====================

    /// Insert one document, returning its generated id (hex string for
    /// native object ids)
    pub async fn insert_one(&self, collection: &str, mut data: DocumentMap) -> DocResult<Value> {
        let name = self.prefixed(collection);
        stamp_insert(&mut data);
        let started = Instant::now();
        let result = self
            .handle(&name)
            .insert_one(map_to_document(data))
            .await
            .map_err(|e| DocumentStoreError::operation(e, &name))?;
        self.log_op(&name, "insert_one", started);
        Ok(bson_to_value(result.inserted_id))
    }

    pub async fn insert_many(
        &self,
        collection: &str,
        rows: Vec<DocumentMap>,
    ) -> DocResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let name = self.prefixed(collection);
        let docs: Vec<Document> = rows
            .into_iter()
            .map(|mut row| {
                stamp_insert(&mut row);
                map_to_document(row)
            })
            .collect();
        let started = Instant::now();
        let result = self
            .handle(&name)
            .insert_many(docs)
            .await
            .map_err(|e| DocumentStoreError::operation(e, &name))?;
        self.log_op(&name, "insert_many", started);
        Ok(result.inserted_ids.len() as u64)
    }

    pub async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        changes: DocumentMap,
    ) -> DocResult<u64> {
        let name = self.prefixed(collection);
        let update = build_update_document(changes);
        let started = Instant::now();
        let result = self
            .handle(&name)
            .update_many(filter, update)
            .await
            .map_err(|e| DocumentStoreError::operation(e, &name))?;
        self.log_op(&name, "update_many", started);
        Ok(result.modified_count)
    }

    pub async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        changes: DocumentMap,
    ) -> DocResult<u64> {
        let name = self.prefixed(collection);
        let update = build_update_document(changes);
        let started = Instant::now();
        let result = self
            .handle(&name)
            .update_one(filter, update)
            .await
            .map_err(|e| DocumentStoreError::operation(e, &name))?;
        self.log_op(&name, "update_one", started);
        Ok(result.modified_count)
    }

    pub async fn delete_many(&self, collection: &str, filter: Document) -> DocResult<u64> {
        let name = self.prefixed(collection);
        let started = Instant::now();
        let result = self
            .handle(&name)
            .delete_many(filter)
            .await
            .map_err(|e| DocumentStoreError::operation(e, &name))?;
        self.log_op(&name, "delete_many", started);
        Ok(result.deleted_count)
    }

    pub async fn delete_one(&self, collection: &str, filter: Document) -> DocResult<u64> {
        let name = self.prefixed(collection);
        let started = Instant::now();
        let result = self
            .handle(&name)
            .delete_one(filter)
            .await
            .map_err(|e| DocumentStoreError::operation(e, &name))?;
        self.log_op(&name, "delete_one", started);
        Ok(result.deleted_count)
    }

    /// Atomic field adjustment via `$inc`; `updated_at` is stamped through
    /// the usual merge rule
    pub async fn increment(
        &self,
        collection: &str,
        filter: Document,
        field: &str,
        amount: i64,
    ) -> DocResult<u64> {
        let mut inc = DocumentMap::new();
        let mut fields = serde_json::Map::new();
        fields.insert(field.to_string(), Value::from(amount));
        inc.insert("$inc".to_string(), Value::Object(fields));
        self.update_many(collection, filter, inc).await
    }

    /// Verify the deployment answers a ping
    pub async fn health_check(&self) -> DocResult<()> {
        self.client
            .database(&self.database)
            .run_command(doc! {"ping": 1})
            .await
            .map_err(DocumentStoreError::unavailable)?;
        Ok(())
    }
}

/// Stamp insert-time timestamps when the caller did not supply them
fn stamp_insert(map: &mut DocumentMap) {
    let now = now_rfc3339();
    if !map.contains_key("created_at") {
        map.insert("created_at".to_string(), Value::String(now.clone()));
    }
    if !map.contains_key("updated_at") {
        map.insert("updated_at".to_string(), Value::String(now));
    }
}

/// Build the update document for a change set.
///
/// Plain field maps become a `$set` stage with `updated_at` added. Change
/// sets already using modifier operators keep them, with the timestamp
/// merged into the existing `$set` stage so other modifiers survive.
fn build_update_document(changes: DocumentMap) -> Document {
    let has_modifiers = changes.keys().any(|k| k.starts_with('$'));
    if has_modifiers {
        let mut update = map_to_document(changes);
        if let Some(Bson::Document(set)) = update.get_mut("$set") {
            set.insert("updated_at", now_rfc3339());
        } else if !update.contains_key("$set") {
            update.insert("$set", doc! {"updated_at": now_rfc3339()});
        }
        update
    } else {
        let mut set = map_to_document(changes);
        set.insert("updated_at", now_rfc3339());
        doc! {"$set": set}
    }
}

/// Convert a wire document, rendering `_id` and aliasing it to `id` for
/// callers that expect the legacy numeric key
fn hydrate(doc: Document) -> DocumentMap {
    let mut map = document_to_map(doc);
    if let Some(id) = map.get("_id").cloned() {
        map.entry("id".to_string()).or_insert(id);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_changes_wrap_in_set_with_timestamp() {
        let mut changes = DocumentMap::new();
        changes.insert("status".to_string(), json!("shipped"));
        let update = build_update_document(changes);
        let set = update.get_document("$set").expect("$set stage");
        assert_eq!(set.get_str("status").expect("status"), "shipped");
        assert!(set.contains_key("updated_at"));
        assert_eq!(update.len(), 1);
    }

    #[test]
    fn modifier_changes_keep_other_stages() {
        let mut changes = DocumentMap::new();
        changes.insert("$inc".to_string(), json!({"stock": -2}));
        changes.insert("$set".to_string(), json!({"status": "reserved"}));
        let update = build_update_document(changes);
        let inc = update.get_document("$inc").expect("$inc survives");
        assert_eq!(inc.get_i32("stock").expect("stock"), -2);
        let set = update.get_document("$set").expect("$set stage");
        assert_eq!(set.get_str("status").expect("status"), "reserved");
        assert!(set.contains_key("updated_at"));
    }

    #[test]
    fn modifier_changes_without_set_gain_one() {
        let mut changes = DocumentMap::new();
        changes.insert("$inc".to_string(), json!({"views": 1}));
        let update = build_update_document(changes);
        assert!(update.get_document("$inc").is_ok());
        let set = update.get_document("$set").expect("$set added");
        assert!(set.contains_key("updated_at"));
    }

    #[test]
    fn insert_stamping_respects_caller_values() {
        let mut map = DocumentMap::new();
        map.insert("created_at".to_string(), json!("2020-01-01T00:00:00Z"));
        stamp_insert(&mut map);
        assert_eq!(map.get("created_at"), Some(&json!("2020-01-01T00:00:00Z")));
        assert!(map.contains_key("updated_at"));
    }

    #[test]
    fn hydrate_aliases_object_id() {
        let oid = bson::oid::ObjectId::new();
        let map = hydrate(doc! {"_id": oid, "name": "Butter"});
        assert_eq!(map.get("_id"), Some(&json!(oid.to_hex())));
        assert_eq!(map.get("id"), Some(&json!(oid.to_hex())));
    }

    #[test]
    fn hydrate_keeps_legacy_numeric_id() {
        let oid = bson::oid::ObjectId::new();
        let map = hydrate(doc! {"_id": oid, "id": 42});
        assert_eq!(map.get("id"), Some(&json!(42)));
    }
}
