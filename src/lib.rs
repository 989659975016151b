//! # Markethaus
//!
//! A dual-backend data access core for storefront applications: fluent SQL
//! and document query builders, an active-record layer over PostgreSQL and
//! MongoDB, a typed service container, and an HTTP routing/middleware
//! kernel.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use markethaus::prelude::*;
//!
//! struct Product;
//!
//! impl Schema for Product {
//!     fn table() -> &'static str {
//!         "products"
//!     }
//!
//!     fn entity_name() -> &'static str {
//!         "product"
//!     }
//!
//!     fn fillable() -> &'static [&'static str] {
//!         &["name", "price"]
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load()?;
//!     let markethaus = Markethaus::from_config(&config).await?;
//!
//!     let products = markethaus.store::<Product>();
//!     let product = products
//!         .create(serde_json::Map::from_iter([
//!             ("name".to_string(), serde_json::json!("Salted Butter")),
//!             ("price".to_string(), serde_json::json!(4.5)),
//!         ]))
//!         .await?;
//!
//!     println!("Created product: {:?}", product.get("name"));
//!     Ok(())
//! }
//! ```

/// Conditional debug logging macros
/// These macros only compile in code when the `debug-logging` feature is enabled
#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod core;
pub mod errors;
pub mod prelude;

// Re-export the main public types for convenience
pub use crate::core::Markethaus;
pub use errors::MarkethausError;

// Re-export centralized config
pub use config::{AppConfig, DatabaseConfig, DocumentConfig, HttpConfig, StorageConfig, StorageDriver};

// Re-export the member crates behind the facade
pub use active_record;
pub use document_store;
pub use http_kernel;
pub use service_container;
pub use sql_store;

// Re-export external dependencies used in public API
pub use async_trait;
pub use serde_json;
pub use sqlx;
