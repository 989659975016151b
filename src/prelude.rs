//! Convenience re-exports for common markethaus usage
//!
//! # Example
//!
//! ```rust
//! use markethaus::prelude::*;
//!
//! // Now you have access to all the common markethaus types and traits
//! ```

// Core markethaus components
pub use crate::core::Markethaus;
pub use crate::errors::MarkethausError;

// Re-export centralized config
pub use config::{
    AppConfig, ConfigError, DatabaseConfig, DocumentConfig, HttpConfig, StorageConfig,
    StorageDriver,
};

// Active-record layer
pub use active_record::{
    apply_cast, AttributeMap, Cast, Record, RecordError, RecordQuery, RecordResult, RecordStore,
    Schema, StorageBackend,
};

// Fluent builders and their connection wrappers
pub use document_store::{DocumentDatabase, DocumentMap, DocumentQuery};
pub use sql_store::{RowMap, SqlDatabase, SqlQuery};

// Service container
pub use service_container::{Container, ResolveError};

// HTTP kernel
pub use http_kernel::{
    FnHandler, FnMiddleware, GroupAttributes, Handler, HttpError, IntoResponse, Json, Method,
    Middleware, Request, Response, Router, StatusCode, ValidationErrors, Validator,
};

// Common external dependencies
pub use anyhow;
pub use async_trait;
pub use serde_json;
pub use tokio;

// Commonly used sqlx types for raw escape hatches
pub use sqlx::{PgPool, Row};
