//! Fluent filter builder for document collections.
//!
//! Mirrors the relational builder's surface where the concepts line up:
//! comparison predicates, membership, null checks, ranges, ordering and
//! slicing. Predicates accumulate as independent conjuncts and join under
//! `$and` at compile time, so repeated predicates on one field never
//! overwrite each other.
//!
//! The operator map is closed. Only the SQL comparison set translates
//! (`=`, `!=`, `<>`, `>`, `>=`, `<`, `<=`, `LIKE`); anything else is
//! rejected rather than guessed at.

use bson::oid::ObjectId;
use bson::{doc, Bson, Document};
use mongodb::options::{FindOneOptions, FindOptions};
use serde_json::Value;

use crate::connection::DocumentDatabase;
use crate::errors::{DocResult, DocumentStoreError};
use crate::page::Page;
use crate::value::{value_to_bson, DocumentMap};

/// Fluent query state for one collection
#[derive(Clone, Debug)]
pub struct DocumentQuery {
    db: DocumentDatabase,
    collection: String,
    conjuncts: Vec<Document>,
    sort: Document,
    projection: Option<Document>,
    limit_value: Option<i64>,
    skip_value: Option<u64>,
}

impl DocumentQuery {
    pub fn new(db: DocumentDatabase, collection: &str) -> Self {
        let collection = db.prefixed(collection);
        Self {
            db,
            collection,
            conjuncts: Vec::new(),
            sort: Document::new(),
            projection: None,
            limit_value: None,
            skip_value: None,
        }
    }

    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    // ==================== Filters ====================

    /// Equality filter. `id`/`_id` fields normalize to `_id`, converting
    /// 24-hex strings to native object ids.
    pub fn where_eq(self, field: &str, value: Value) -> Self {
        let name = normalize_field(field);
        let condition = filter_value(&name, value);
        self.push_conjunct(name, condition)
    }

    /// Comparison filter through the closed operator map
    pub fn where_cmp(self, field: &str, operator: &str, value: Value) -> DocResult<Self> {
        let name = normalize_field(field);
        let condition = translate_operator(&name, operator, value)?;
        Ok(self.push_conjunct(name, condition))
    }

    pub fn where_in(self, field: &str, values: Vec<Value>) -> Self {
        let name = normalize_field(field);
        let items: Vec<Bson> = values
            .into_iter()
            .map(|v| filter_value(&name, v))
            .collect();
        let mut condition = Document::new();
        condition.insert("$in", Bson::Array(items));
        self.push_conjunct(name, Bson::Document(condition))
    }

    pub fn where_not_in(self, field: &str, values: Vec<Value>) -> Self {
        let name = normalize_field(field);
        let items: Vec<Bson> = values
            .into_iter()
            .map(|v| filter_value(&name, v))
            .collect();
        let mut condition = Document::new();
        condition.insert("$nin", Bson::Array(items));
        self.push_conjunct(name, Bson::Document(condition))
    }

    /// Emits `{field: null}`, which matches both a stored literal null and
    /// an absent field. Callers that must exclude absent fields add
    /// `$exists: true` via [`where_document`].
    ///
    /// [`where_document`]: DocumentQuery::where_document
    pub fn where_null(self, field: &str) -> Self {
        let name = normalize_field(field);
        self.push_conjunct(name, Bson::Null)
    }

    pub fn where_not_null(self, field: &str) -> Self {
        let name = normalize_field(field);
        self.push_conjunct(name, Bson::Document(doc! {"$ne": Bson::Null}))
    }

    pub fn where_between(self, field: &str, low: Value, high: Value) -> Self {
        let name = normalize_field(field);
        let mut condition = Document::new();
        condition.insert("$gte", filter_value(&name, low));
        condition.insert("$lte", filter_value(&name, high));
        self.push_conjunct(name, Bson::Document(condition))
    }

    /// Escape hatch: push a raw filter document as one conjunct
    pub fn where_document(mut self, filter: Document) -> Self {
        self.conjuncts.push(filter);
        self
    }

    /// Case-insensitive substring match across several fields, joined
    /// under `$or`. The term is literal-escaped.
    pub fn search(mut self, fields: &[&str], term: &str) -> Self {
        if fields.is_empty() || term.is_empty() {
            return self;
        }
        let pattern = regex::escape(term);
        let branches: Vec<Document> = fields
            .iter()
            .map(|field| {
                let mut branch = Document::new();
                branch.insert(
                    normalize_field(field),
                    doc! {"$regex": pattern.clone(), "$options": "i"},
                );
                branch
            })
            .collect();
        self.conjuncts.push(doc! {"$or": branches});
        self
    }

    // ==================== Ordering and slicing ====================

    pub fn order_by(mut self, field: &str, direction: &str) -> Self {
        let dir: i32 = if direction.eq_ignore_ascii_case("desc") {
            -1
        } else {
            1
        };
        self.sort.insert(normalize_field(field), dir);
        self
    }

    pub fn select(mut self, fields: &[&str]) -> Self {
        let projection = self.projection.get_or_insert_with(Document::new);
        for field in fields {
            projection.insert(normalize_field(field), 1);
        }
        self
    }

    pub fn limit(mut self, count: i64) -> Self {
        self.limit_value = Some(count);
        self
    }

    pub fn offset(mut self, count: i64) -> Self {
        self.skip_value = Some(count.max(0) as u64);
        self
    }

    pub fn has_filters(&self) -> bool {
        !self.conjuncts.is_empty()
    }

    // ==================== Compiled shapes ====================

    /// The accumulated filter: empty, a single conjunct unwrapped, or all
    /// conjuncts under `$and`
    pub fn filter_document(&self) -> Document {
        match self.conjuncts.len() {
            0 => Document::new(),
            1 => self.conjuncts[0].clone(),
            _ => doc! {"$and": self.conjuncts.clone()},
        }
    }

    fn find_options(&self) -> Option<FindOptions> {
        if self.sort.is_empty()
            && self.projection.is_none()
            && self.limit_value.is_none()
            && self.skip_value.is_none()
        {
            return None;
        }
        let mut options = FindOptions::default();
        if !self.sort.is_empty() {
            options.sort = Some(self.sort.clone());
        }
        options.projection = self.projection.clone();
        options.limit = self.limit_value;
        options.skip = self.skip_value;
        Some(options)
    }

    fn find_one_options(&self) -> Option<FindOneOptions> {
        if self.sort.is_empty() && self.projection.is_none() && self.skip_value.is_none() {
            return None;
        }
        let mut options = FindOneOptions::default();
        if !self.sort.is_empty() {
            options.sort = Some(self.sort.clone());
        }
        options.projection = self.projection.clone();
        options.skip = self.skip_value;
        Some(options)
    }

    fn aggregate_pipeline(&self, accumulator: &str, field: &str) -> Vec<Document> {
        let mut pipeline = Vec::new();
        let filter = self.filter_document();
        if !filter.is_empty() {
            pipeline.push(doc! {"$match": filter});
        }
        let mut totals = Document::new();
        totals.insert(accumulator, format!("${}", field));
        let mut group = Document::new();
        group.insert("_id", Bson::Null);
        group.insert("aggregate", totals);
        pipeline.push(doc! {"$group": group});
        pipeline
    }

    // ==================== Read terminals ====================

    pub async fn get(&self) -> DocResult<Vec<DocumentMap>> {
        self.db
            .find(&self.collection, self.filter_document(), self.find_options())
            .await
    }

    pub async fn first(&self) -> DocResult<Option<DocumentMap>> {
        self.db
            .find_one(
                &self.collection,
                self.filter_document(),
                self.find_one_options(),
            )
            .await
    }

    /// One field of the first matched document
    pub async fn value(&self, field: &str) -> DocResult<Option<Value>> {
        let name = normalize_field(field);
        let mut q = self.clone();
        let mut projection = Document::new();
        projection.insert(name.clone(), 1);
        q.projection = Some(projection);
        let row = q.first().await?;
        Ok(row.and_then(|mut map| map.remove(&name)))
    }

    /// One field across all matched documents
    pub async fn pluck(&self, field: &str) -> DocResult<Vec<Value>> {
        let name = normalize_field(field);
        let mut q = self.clone();
        let mut projection = Document::new();
        projection.insert(name.clone(), 1);
        q.projection = Some(projection);
        let rows = q.get().await?;
        Ok(rows
            .into_iter()
            .map(|mut row| row.remove(&name).unwrap_or(Value::Null))
            .collect())
    }

    /// Matched document count. Ignores ordering and slice state.
    pub async fn count(&self) -> DocResult<i64> {
        let count = self
            .db
            .count(&self.collection, self.filter_document())
            .await?;
        Ok(count as i64)
    }

    pub async fn exists(&self) -> DocResult<bool> {
        let found = self
            .db
            .find_one(&self.collection, self.filter_document(), None)
            .await?;
        Ok(found.is_some())
    }

    async fn aggregate_value(
        &self,
        accumulator: &str,
        field: &str,
        default: Value,
    ) -> DocResult<Value> {
        let pipeline = self.aggregate_pipeline(accumulator, field);
        let rows = self.db.aggregate(&self.collection, pipeline).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|mut row| row.remove("aggregate"))
            .unwrap_or(default))
    }

    /// Defaults to 0 when nothing matched
    pub async fn sum(&self, field: &str) -> DocResult<Value> {
        self.aggregate_value("$sum", field, Value::from(0)).await
    }

    pub async fn avg(&self, field: &str) -> DocResult<Value> {
        self.aggregate_value("$avg", field, Value::Null).await
    }

    pub async fn max(&self, field: &str) -> DocResult<Value> {
        self.aggregate_value("$max", field, Value::Null).await
    }

    pub async fn min(&self, field: &str) -> DocResult<Value> {
        self.aggregate_value("$min", field, Value::Null).await
    }

    /// Count plus a data slice. The count uses only the filter, so slice
    /// bounds and ordering never leak into it.
    pub async fn paginate(&self, per_page: i64, page: i64) -> DocResult<Page> {
        let per_page = per_page.max(1);
        let page = page.max(1);
        let total = self.count().await?;
        let data_q = self
            .clone()
            .limit(per_page)
            .offset((page - 1) * per_page);
        let data = data_q.get().await?;
        Ok(Page::new(data, total, per_page, page))
    }

    // ==================== Write terminals ====================

    pub async fn insert(&self, data: DocumentMap) -> DocResult<Value> {
        self.db.insert_one(&self.collection, data).await
    }

    pub async fn insert_batch(&self, rows: Vec<DocumentMap>) -> DocResult<u64> {
        self.db.insert_many(&self.collection, rows).await
    }

    pub async fn update(&self, changes: DocumentMap) -> DocResult<u64> {
        let filter = self.filter_document();
        if filter.is_empty() {
            tracing::warn!(
                collection = %self.collection,
                "update with empty filter affects every document"
            );
        }
        self.db.update_many(&self.collection, filter, changes).await
    }

    pub async fn delete(&self) -> DocResult<u64> {
        let filter = self.filter_document();
        if filter.is_empty() {
            tracing::warn!(
                collection = %self.collection,
                "delete with empty filter affects every document"
            );
        }
        self.db.delete_many(&self.collection, filter).await
    }

    pub async fn increment(&self, field: &str, amount: i64) -> DocResult<u64> {
        self.db
            .increment(&self.collection, self.filter_document(), field, amount)
            .await
    }

    pub async fn decrement(&self, field: &str, amount: i64) -> DocResult<u64> {
        self.increment(field, -amount).await
    }

    fn push_conjunct(mut self, field: String, condition: Bson) -> Self {
        let mut clause = Document::new();
        clause.insert(field, condition);
        self.conjuncts.push(clause);
        self
    }
}

fn normalize_field(field: &str) -> String {
    if field == "id" {
        "_id".to_string()
    } else {
        field.to_string()
    }
}

/// Convert a filter value, turning 24-hex strings into native object ids
/// when the target field is `_id`
fn filter_value(field: &str, value: Value) -> Bson {
    if field == "_id" {
        if let Value::String(text) = &value {
            if text.len() == 24 && text.bytes().all(|b| b.is_ascii_hexdigit()) {
                if let Ok(oid) = ObjectId::parse_str(text) {
                    return Bson::ObjectId(oid);
                }
            }
        }
    }
    value_to_bson(value)
}

fn translate_operator(field: &str, operator: &str, value: Value) -> DocResult<Bson> {
    let op = operator.trim();
    match op {
        "=" => Ok(filter_value(field, value)),
        "!=" | "<>" => Ok(Bson::Document(doc! {"$ne": filter_value(field, value)})),
        ">" => Ok(Bson::Document(doc! {"$gt": filter_value(field, value)})),
        ">=" => Ok(Bson::Document(doc! {"$gte": filter_value(field, value)})),
        "<" => Ok(Bson::Document(doc! {"$lt": filter_value(field, value)})),
        "<=" => Ok(Bson::Document(doc! {"$lte": filter_value(field, value)})),
        _ if op.eq_ignore_ascii_case("like") => {
            let text = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            Ok(Bson::Document(
                doc! {"$regex": like_to_regex(&text), "$options": "i"},
            ))
        }
        other => Err(DocumentStoreError::UnsupportedOperator(other.to_string())),
    }
}

/// Translate a SQL LIKE pattern to an anchored regex: `%` spans anything,
/// `_` matches one character, everything else is literal
fn like_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() + 4);
    let mut literal = String::new();
    regex.push('^');
    for ch in pattern.chars() {
        match ch {
            '%' | '_' => {
                if !literal.is_empty() {
                    regex.push_str(&regex::escape(&literal));
                    literal.clear();
                }
                regex.push_str(if ch == '%' { ".*" } else { "." });
            }
            other => literal.push(other),
        }
    }
    if !literal.is_empty() {
        regex.push_str(&regex::escape(&literal));
    }
    regex.push('$');
    regex
}
