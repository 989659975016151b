//! Integration tests for coordinator wiring: configuration, storage driver
//! selection, store scoping, the service container, and HTTP dispatch.
//!
//! Nothing here talks to a live backend. Postgres pools connect lazily and
//! the MongoDB client only parses its URI at construction time, so driver
//! selection and query building are observable without open sockets.

use std::sync::Arc;

use markethaus::prelude::*;
use serde_json::json;

/// Catalog entry with soft deletes enabled
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
        &["name", "price", "active"]
    }
    fn casts() -> &'static [(&'static str, Cast)] {
        &[("price", Cast::Float), ("active", Cast::Bool)]
    }
}

fn postgres_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.database.table_prefix = "sf_".to_string();
    config
}

fn mongodb_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.storage.driver = StorageDriver::Mongodb;
    config.document.collection_prefix = "sf_".to_string();
    config
}

// ==================== Driver selection ====================

#[tokio::test]
async fn test_postgres_driver_selected_from_config() {
    let markethaus = Markethaus::from_config(&postgres_config())
        .await
        .expect("config is valid");
    assert!(matches!(markethaus.backend(), StorageBackend::Sql(_)));
}

#[tokio::test]
async fn test_mongodb_driver_selected_from_config() {
    let markethaus = Markethaus::from_config(&mongodb_config())
        .await
        .expect("uri parses");
    assert!(matches!(markethaus.backend(), StorageBackend::Document(_)));
}

#[tokio::test]
async fn test_invalid_config_rejected_before_connecting() {
    let mut config = AppConfig::default();
    config.database.port = 0;
    let err = Markethaus::from_config(&config)
        .await
        .err()
        .expect("zero port must not validate");
    assert!(matches!(err, MarkethausError::Config(_)));
}

// ==================== Store scoping ====================

#[tokio::test]
async fn test_store_queries_scope_soft_deletes() {
    let markethaus = Markethaus::from_config(&postgres_config())
        .await
        .expect("config is valid");
    let products = markethaus.store::<Product>();
    match products.query() {
        RecordQuery::Sql(query) => {
            assert_eq!(
                query.to_sql(),
                "SELECT * FROM sf_products WHERE deleted_at IS NULL"
            );
        }
        RecordQuery::Document(_) => panic!("postgres driver must yield the relational builder"),
    }
}

#[tokio::test]
async fn test_query_with_trashed_drops_the_scope() {
    let markethaus = Markethaus::from_config(&postgres_config())
        .await
        .expect("config is valid");
    let products = markethaus.store::<Product>();
    match products.query_with_trashed() {
        RecordQuery::Sql(query) => {
            assert_eq!(query.to_sql(), "SELECT * FROM sf_products");
        }
        RecordQuery::Document(_) => panic!("postgres driver must yield the relational builder"),
    }
}

#[tokio::test]
async fn test_store_filters_compose_with_the_scope() {
    let markethaus = Markethaus::from_config(&postgres_config())
        .await
        .expect("config is valid");
    let products = markethaus.store::<Product>();
    let query = products
        .query()
        .where_eq("active", true)
        .order_by("price", "asc")
        .limit(10);
    match query {
        RecordQuery::Sql(query) => {
            assert_eq!(
                query.to_sql(),
                "SELECT * FROM sf_products WHERE deleted_at IS NULL AND active = $1 \
                 ORDER BY price ASC LIMIT 10"
            );
            assert_eq!(query.current_bindings(), vec![json!(true)]);
        }
        RecordQuery::Document(_) => panic!("postgres driver must yield the relational builder"),
    }
}

#[tokio::test]
async fn test_document_stores_prefix_collections_and_scope_deletes() {
    let markethaus = Markethaus::from_config(&mongodb_config())
        .await
        .expect("uri parses");
    let products = markethaus.store::<Product>();
    match products.query() {
        RecordQuery::Document(query) => {
            assert_eq!(query.collection_name(), "sf_products");
            let filter = query.filter_document();
            assert!(filter.contains_key("$or"), "soft-delete scope missing: {filter}");
        }
        RecordQuery::Sql(_) => panic!("mongodb driver must yield the document builder"),
    }
}

// ==================== Service container ====================

struct Pricing {
    vat: f64,
}

#[tokio::test]
async fn test_container_is_shared_across_handles() {
    let markethaus = Markethaus::from_config(&postgres_config())
        .await
        .expect("config is valid");
    let registrar = markethaus.container();
    registrar.singleton::<Pricing, _>(|_| Ok(Pricing { vat: 0.25 }));

    let consumer = markethaus.container();
    let first = consumer.resolve::<Pricing>().expect("bound via other handle");
    let second = consumer.resolve::<Pricing>().expect("still bound");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.vat, 0.25);
}

// ==================== HTTP dispatch ====================

#[tokio::test]
async fn test_router_dispatches_against_container_services() {
    let markethaus = Markethaus::from_config(&postgres_config())
        .await
        .expect("config is valid");
    let container = markethaus.container();
    container.singleton::<Pricing, _>(|_| Ok(Pricing { vat: 0.25 }));

    let mut router = Router::new();
    let services = container.clone();
    router
        .get(
            "/pricing/{amount}",
            FnHandler::new(move |request: Request| {
                let services = services.clone();
                async move {
                    let amount = request
                        .path_param("amount")
                        .and_then(|raw| raw.parse::<f64>().ok())
                        .ok_or_else(|| HttpError::bad_request("amount must be numeric"))?;
                    let pricing = services
                        .resolve::<Pricing>()
                        .map_err(|err| HttpError::internal(err.to_string()))?;
                    Ok::<_, HttpError>(Json(json!({
                        "net": amount,
                        "gross": amount * (1.0 + pricing.vat),
                    })))
                }
            }),
        )
        .expect("pattern is valid");

    let response = router
        .dispatch(Request::get("/pricing/100").expect("valid target"))
        .await
        .expect("route matches");
    let body: serde_json::Value =
        serde_json::from_str(&response.body_text()).expect("handler emits json");
    assert_eq!(body["net"], json!(100.0));
    assert_eq!(body["gross"], json!(125.0));

    let missing = router
        .respond(Request::get("/checkout").expect("valid target"))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}
