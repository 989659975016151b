//! End-to-end storefront wiring: configuration, a storage backend, record
//! stores, the service container, and HTTP dispatch.
//!
//! Needs a reachable PostgreSQL with `products` and `reviews` tables (or set
//! `[storage] driver = "mongodb"` in markethaus.toml to run against MongoDB,
//! where the collections are created on first write):
//!
//! ```bash
//! cargo run --example storefront
//! ```

use std::sync::Arc;

use markethaus::prelude::*;
use serde_json::{json, Value};

/// Storefront product with soft deletes and attribute casts
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
        &["name", "price", "stock", "active", "images"]
    }
    fn casts() -> &'static [(&'static str, Cast)] {
        &[
            ("price", Cast::Float),
            ("stock", Cast::Int),
            ("active", Cast::Bool),
            ("images", Cast::Json),
        ]
    }
}

/// Customer review, linked to a product through `product_id`
struct Review;

impl Schema for Review {
    fn table() -> &'static str {
        "reviews"
    }
    fn entity_name() -> &'static str {
        "review"
    }
    fn fillable() -> &'static [&'static str] {
        &["product_id", "rating", "body"]
    }
}

/// Currency formatting service shared through the container
struct PriceFormatter {
    currency: &'static str,
}

impl PriceFormatter {
    fn format(&self, amount: f64) -> String {
        format!("{:.2} {}", amount, self.currency)
    }
}

fn attrs(value: Value) -> AttributeMap {
    match value {
        Value::Object(map) => map,
        _ => AttributeMap::new(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🛒 Markethaus Storefront Demo\n");

    // Configuration: markethaus.toml when present, library defaults otherwise
    let config = AppConfig::load().unwrap_or_default();

    let markethaus = Markethaus::from_config(&config).await?;
    markethaus.health_check().await?;
    println!("✅ Storage backend ready ({:?})", config.storage.driver);

    // Shared services
    let container = markethaus.container();
    container.singleton::<PriceFormatter, _>(|_| Ok(PriceFormatter { currency: "EUR" }));
    let formatter = container.resolve::<PriceFormatter>()?;
    println!("✅ Services registered");

    let products = markethaus.store::<Product>();
    let reviews = markethaus.store::<Review>();

    // Start from a clean slate
    let stale_reviews = reviews.query().delete().await?;
    let stale_products = products.query_with_trashed().delete().await?;
    if stale_products + stale_reviews > 0 {
        println!(
            "🧹 Cleared {} rows from a previous run",
            stale_products + stale_reviews
        );
    }

    println!("\n=== CRUD Operations ===");

    let mut keyboard = products
        .create(attrs(json!({
            "name": "Mechanical Keyboard",
            "price": 129.9,
            "stock": 12,
            "active": true,
            "images": ["keyboard-front.jpg", "keyboard-side.jpg"],
        })))
        .await?;
    println!(
        "Created: {} at {}",
        keyboard.get("name").unwrap_or(Value::Null),
        formatter.format(129.9)
    );

    // Partial update through dirty tracking: only the touched column is sent
    keyboard.set("price", json!(119.9));
    products.save(&mut keyboard).await?;
    println!("Updated price: {}", formatter.format(119.9));

    products
        .create(attrs(json!({
            "name": "Wireless Mouse",
            "price": 49.5,
            "stock": 80,
            "active": true,
            "images": [],
        })))
        .await?;
    let cable = products
        .create(attrs(json!({
            "name": "USB-C Cable",
            "price": 9.9,
            "stock": 0,
            "active": false,
            "images": [],
        })))
        .await?;

    println!("\n=== Query Operations ===");

    let affordable = products
        .query()
        .where_eq("active", true)
        .where_cmp("price", "<=", 60)?
        .order_by("price", "asc")
        .get()
        .await?;
    println!("Active products at 60 or less: {}", affordable.len());

    let total = products.query().count().await?;
    println!("Products in catalog: {}", total);

    let page = products
        .query()
        .order_by("name", "asc")
        .paginate(2, 1)
        .await?;
    println!(
        "Page {}/{} ({} per page, {} total)",
        page.current_page, page.last_page, page.per_page, page.total
    );

    println!("\n=== Relationships ===");

    if let Some(key) = keyboard.key().cloned() {
        reviews
            .create(attrs(json!({
                "product_id": key,
                "rating": 5,
                "body": "Clicky and responsive.",
            })))
            .await?;
    }
    let keyboard_reviews = products.has_many::<Review>(&keyboard).await?;
    println!("Keyboard reviews: {}", keyboard_reviews.len());

    println!("\n=== Soft Deletes ===");

    let mut retired = cable;
    products.delete(&mut retired).await?;
    let visible = products.query().count().await?;
    let with_trashed = products.query_with_trashed().count().await?;
    println!("Visible: {}, including trashed: {}", visible, with_trashed);
    products.restore(&mut retired).await?;
    println!("Restored: {}", retired.get("name").unwrap_or(Value::Null));

    println!("\n=== HTTP Dispatch ===");

    let mut router = Router::new();
    router.global_middleware(FnMiddleware::new(
        |request: Request, next: Arc<dyn Handler>| async move {
            let method = request.method.clone();
            let path = request.path().to_string();
            let response = next.handle(request).await?;
            println!("  {} {} -> {}", method, path, response.status);
            Ok::<_, HttpError>(response)
        },
    ));

    let catalog = markethaus.store::<Product>();
    router.get(
        "/products",
        FnHandler::new(move |_request: Request| {
            let store = catalog.clone();
            async move {
                let rows = store
                    .query()
                    .where_eq("active", true)
                    .order_by("name", "asc")
                    .get()
                    .await
                    .map_err(|err| HttpError::internal(err.to_string()))?;
                Ok::<_, HttpError>(Json(json!({ "data": rows })))
            }
        }),
    )?;

    let catalog = markethaus.store::<Product>();
    router
        .get(
            "/products/{id}",
            FnHandler::new(move |request: Request| {
                let store = catalog.clone();
                async move {
                    let key = request
                        .path_param("id")
                        .and_then(|raw| raw.parse::<i64>().ok())
                        .ok_or_else(|| HttpError::bad_request("product id must be numeric"))?;
                    let found = store
                        .find(key)
                        .await
                        .map_err(|err| HttpError::internal(err.to_string()))?;
                    let response = match found {
                        Some(record) => Json(record.attributes().clone()).into_response(),
                        None => Response::not_found(),
                    };
                    Ok::<_, HttpError>(response)
                }
            }),
        )?
        .name("products.show");

    let listing = router.respond(Request::get("/products")?).await;
    println!("Listing body: {}", listing.body_text());

    let show_url = router.route_url("products.show", &[("id", "999999")])?;
    router.respond(Request::get(&show_url)?).await;

    println!("\n🎉 Demo complete");
    Ok(())
}
