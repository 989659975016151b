use thiserror::Error;

/// Boxed error type factories may fail with
pub type FactoryError = Box<dyn std::error::Error + Send + Sync>;

pub type ResolveResult<T> = Result<T, ResolveError>;

/// Errors raised while resolving a service
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("No binding registered for type '{type_name}'")]
    NotBound { type_name: &'static str },

    #[error("Building '{type_name}' failed: {source}")]
    BuildFailed {
        type_name: &'static str,
        #[source]
        source: FactoryError,
    },
}

impl ResolveError {
    pub fn not_bound(type_name: &'static str) -> Self {
        Self::NotBound { type_name }
    }

    pub fn build_failed(type_name: &'static str, source: FactoryError) -> Self {
        Self::BuildFailed { type_name, source }
    }
}
