use thiserror::Error;

pub type DocResult<T> = Result<T, DocumentStoreError>;

/// Errors raised by the document store
#[derive(Debug, Error)]
pub enum DocumentStoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Document operation failed on '{collection}': {message}")]
    OperationFailed { collection: String, message: String },

    /// The operator map is closed: only the SQL comparison set translates
    #[error("Operator '{0}' cannot be translated to a document filter")]
    UnsupportedOperator(String),
}

impl DocumentStoreError {
    pub fn operation(err: mongodb::error::Error, collection: impl Into<String>) -> Self {
        Self::OperationFailed {
            collection: collection.into(),
            message: err.to_string(),
        }
    }

    pub fn unavailable(err: mongodb::error::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}
