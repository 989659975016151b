//! Error type for the markethaus facade.
//!
//! Member crates raise their own errors; the facade aggregates them so
//! application code can hold one error type.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarkethausError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Relational store error: {0}")]
    Sql(#[from] sql_store::SqlStoreError),

    #[error("Document store error: {0}")]
    Document(#[from] document_store::DocumentStoreError),

    #[error("Record error: {0}")]
    Record(#[from] active_record::RecordError),

    #[error("Service resolution error: {0}")]
    Resolve(#[from] service_container::ResolveError),

    #[error("HTTP error: {0}")]
    Http(#[from] http_kernel::HttpError),
}
