use bson::{doc, Bson};
use config::{DatabaseConfig, DocumentConfig};
use serde_json::{json, Value};

use document_store::DocumentDatabase;
use sql_store::SqlDatabase;

use crate::errors::RecordError;
use crate::query::{Page, RecordQuery};
use crate::record::{AttributeMap, Record};
use crate::schema::{Cast, Schema};
use crate::store::{RecordStore, StorageBackend};

struct Product;
impl Schema for Product {
    fn table() -> &'static str {
        "products"
    }
    fn entity_name() -> &'static str {
        "product"
    }
    fn soft_deletes() -> bool {
        true
    }
    fn fillable() -> &'static [&'static str] {
        &["name", "price", "images", "active"]
    }
    fn casts() -> &'static [(&'static str, Cast)] {
        &[
            ("price", Cast::Float),
            ("images", Cast::Json),
            ("active", Cast::Bool),
        ]
    }
}

struct Review;
impl Schema for Review {
    fn table() -> &'static str {
        "reviews"
    }
    fn entity_name() -> &'static str {
        "review"
    }
}

fn sql_store_for<S: Schema>() -> RecordStore<S> {
    let db = SqlDatabase::connect(&DatabaseConfig::default())
        .expect("lazy pool construction needs no server");
    RecordStore::new(StorageBackend::Sql(db))
}

async fn document_store_for<S: Schema>() -> RecordStore<S> {
    let db = DocumentDatabase::connect(&DocumentConfig::default())
        .await
        .expect("client construction needs no server");
    RecordStore::new(StorageBackend::Document(db))
}

fn attrs(value: Value) -> AttributeMap {
    match value {
        Value::Object(map) => map,
        _ => panic!("fixture must be an object"),
    }
}

// ==================== Soft-delete scoping ====================

#[tokio::test]
async fn test_default_scope_excludes_trashed_rows_on_sql() {
    let store = sql_store_for::<Product>();
    match store.query() {
        RecordQuery::Sql(q) => {
            assert_eq!(
                q.to_sql(),
                "SELECT * FROM products WHERE deleted_at IS NULL"
            );
        }
        RecordQuery::Document(_) => panic!("expected the relational builder"),
    }
}

#[tokio::test]
async fn test_default_scope_matches_null_or_absent_on_documents() {
    let store = document_store_for::<Product>().await;
    match store.query() {
        RecordQuery::Document(q) => {
            assert_eq!(
                q.filter_document(),
                doc! {"$or": [
                    {"deleted_at": Bson::Null},
                    {"deleted_at": {"$exists": false}},
                ]}
            );
        }
        RecordQuery::Sql(_) => panic!("expected the document builder"),
    }
}

#[tokio::test]
async fn test_trashed_query_carries_no_scope() {
    let store = sql_store_for::<Product>();
    match store.query_with_trashed() {
        RecordQuery::Sql(q) => {
            assert!(!q.has_wheres());
            assert_eq!(q.to_sql(), "SELECT * FROM products");
        }
        RecordQuery::Document(_) => panic!("expected the relational builder"),
    }
}

#[tokio::test]
async fn test_plain_schema_queries_are_unscoped() {
    let store = sql_store_for::<Review>();
    match store.query() {
        RecordQuery::Sql(q) => assert!(!q.has_wheres()),
        RecordQuery::Document(_) => panic!("expected the relational builder"),
    }
}

// ==================== Save semantics ====================

#[tokio::test]
async fn test_clean_save_issues_no_write_on_sql() {
    let store = sql_store_for::<Product>();
    let mut record = Record::<Product>::from_row(attrs(json!({
        "id": 1, "name": "butter", "price": 4.5
    })));
    // The pool is lazy and no server is listening, so any emitted
    // statement would fail; success proves nothing was sent.
    store.save(&mut record).await.expect("clean save is a no-op");
    assert!(!record.is_dirty());
}

#[tokio::test]
async fn test_clean_save_issues_no_write_on_documents() {
    let store = document_store_for::<Product>().await;
    let mut record = Record::<Product>::from_row(attrs(json!({
        "id": "507f1f77bcf86cd799439011", "name": "butter"
    })));
    store.save(&mut record).await.expect("clean save is a no-op");
}

#[tokio::test]
async fn test_dirty_update_without_key_is_refused() {
    let store = sql_store_for::<Product>();
    let mut record = Record::<Product>::from_row(attrs(json!({"name": "butter"})));
    record.set("name", json!("ghee"));
    let err = store.save(&mut record).await.expect_err("no key to address");
    assert!(matches!(err, RecordError::MissingKey));
}

#[tokio::test]
async fn test_delete_on_unpersisted_record_is_a_no_op() {
    let store = sql_store_for::<Product>();
    let mut record = Record::<Product>::new();
    store.delete(&mut record).await.expect("nothing to delete");
    assert!(!record.exists());
}

#[tokio::test]
async fn test_update_emits_dirty_fields_plus_timestamp() {
    // The statement shape save() emits: dirty subset, stamped, addressed
    // by primary key.
    let db = SqlDatabase::connect(&DatabaseConfig::default())
        .expect("lazy pool construction needs no server");
    let mut record = Record::<Product>::from_row(attrs(json!({
        "id": 1, "name": "butter", "price": 4.5
    })));
    record.set("name", json!("salted butter"));
    let mut changes = record.dirty();
    changes.insert("updated_at".to_string(), json!("2024-03-01T10:00:00+00:00"));
    let compiled = db.table("products").where_eq("id", 1).update_statement(&changes);
    assert_eq!(
        compiled.sql,
        "UPDATE products SET name = $1, updated_at = $2 WHERE id = $3"
    );
    assert_eq!(
        compiled.bindings,
        vec![json!("salted butter"), json!("2024-03-01T10:00:00+00:00"), json!(1)]
    );
}

// ==================== Relationship conventions ====================

#[tokio::test]
async fn test_related_query_scopes_and_names_by_convention() {
    let store = sql_store_for::<Review>();
    match store.related_query::<Product>() {
        RecordQuery::Sql(q) => {
            assert_eq!(q.table_name(), "products");
            // Related lookups honor the related schema's soft-delete scope
            assert_eq!(
                q.to_sql(),
                "SELECT * FROM products WHERE deleted_at IS NULL"
            );
        }
        RecordQuery::Document(_) => panic!("expected the relational builder"),
    }
}

#[tokio::test]
async fn test_belongs_to_without_foreign_key_short_circuits() {
    let store = sql_store_for::<Review>();
    let orphan = Record::<Review>::from_row(attrs(json!({"id": 3, "rating": 5})));
    let parent = store
        .belongs_to::<Product>(&orphan)
        .await
        .expect("missing foreign key resolves to none without a lookup");
    assert!(parent.is_none());
}

#[tokio::test]
async fn test_belongs_to_with_null_foreign_key_short_circuits() {
    let store = sql_store_for::<Review>();
    let orphan = Record::<Review>::from_row(attrs(json!({
        "id": 3, "product_id": null
    })));
    assert!(store
        .belongs_to::<Product>(&orphan)
        .await
        .expect("null foreign key resolves to none")
        .is_none());
}

// ==================== Page conversion ====================

#[test]
fn test_page_conversion_preserves_counts() {
    let source = sql_store::Page::new(vec![AttributeMap::new(); 5], 25, 10, 3);
    let page1 = Page::from(source);
    assert_eq!(page1.total, 25);
    assert_eq!(page1.per_page, 10);
    assert_eq!(page1.current_page, 3);
    assert_eq!(page1.last_page, 3);
    assert_eq!(page1.data.len(), 5);

    let page2 = Page::from(document_store::Page::new(Vec::new(), 11, 10, 1));
    assert_eq!(page2.last_page, 2);
}
