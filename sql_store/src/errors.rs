use thiserror::Error;

pub type SqlResult<T> = Result<T, SqlStoreError>;

/// Errors raised by the relational store
#[derive(Debug, Error)]
pub enum SqlStoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Query execution failed: {message} (sql: {sql})")]
    QueryFailed { message: String, sql: String },

    #[error("A transaction is already open on this connection")]
    TransactionOpen,

    #[error("No transaction is open on this connection")]
    NoTransaction,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SqlStoreError {
    /// Wrap an engine failure together with the statement that caused it
    pub fn query(err: sqlx::Error, sql: impl Into<String>) -> Self {
        Self::QueryFailed {
            message: err.to_string(),
            sql: sql.into(),
        }
    }

    pub fn unavailable(err: sqlx::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}
