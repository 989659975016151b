use document_store::DocumentStoreError;
use sql_store::SqlStoreError;
use thiserror::Error;

pub type RecordResult<T> = Result<T, RecordError>;

/// Errors raised by the record layer
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("{entity} not found for key {key}")]
    NotFound { entity: String, key: String },

    /// The record carries no primary key value, so there is nothing to
    /// address an update or delete at
    #[error("Record has no primary key value")]
    MissingKey,

    #[error(transparent)]
    Sql(#[from] SqlStoreError),

    #[error(transparent)]
    Document(#[from] DocumentStoreError),
}

impl RecordError {
    pub fn not_found(entity: &str, key: &serde_json::Value) -> Self {
        let key = match key {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Self::NotFound {
            entity: entity.to_string(),
            key,
        }
    }
}
