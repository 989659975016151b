//! Kernel errors and the validation contract.

use hyper::{Method, StatusCode};
use serde_json::Value;
use thiserror::Error;

use crate::request::Request;
use crate::response::Response;

pub type HttpResult<T> = Result<T, HttpError>;

/// Errors raised while routing and handling a request.
///
/// A path that matches no route at all is `NotFound`; a path that matches a
/// route under a different method is `MethodNotAllowed`. The two are never
/// conflated.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("No route matches '{path}'")]
    NotFound { path: String },

    #[error("{method} is not allowed for '{path}'")]
    MethodNotAllowed {
        method: Method,
        path: String,
        allowed: Vec<Method>,
    },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HttpError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn method_not_allowed(
        method: Method,
        path: impl Into<String>,
        allowed: Vec<Method>,
    ) -> Self {
        Self::MethodNotAllowed {
            method,
            path: path.into(),
            allowed,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Render the error as the response the outer boundary sends back.
    /// Internal details are logged, not leaked to the client.
    pub fn into_response(self) -> Response {
        match self {
            Self::NotFound { path } => json_response(
                StatusCode::NOT_FOUND,
                serde_json::json!({ "error": "Not Found", "path": path }),
            ),
            Self::MethodNotAllowed {
                method,
                path,
                allowed,
            } => {
                let allow = allowed
                    .iter()
                    .map(Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                json_response(
                    StatusCode::METHOD_NOT_ALLOWED,
                    serde_json::json!({
                        "error": "Method Not Allowed",
                        "method": method.as_str(),
                        "path": path,
                    }),
                )
                .with_header("allow", &allow)
            }
            Self::BadRequest(message) => json_response(
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": "Bad Request", "message": message }),
            ),
            Self::Internal(message) => {
                tracing::error!(error = %message, "request handling failed");
                json_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": "Internal Server Error" }),
                )
            }
        }
    }
}

fn json_response(status: StatusCode, body: Value) -> Response {
    Response::new(status)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
}

/// Field-level validation failures, in the order they were recorded.
/// Returned as a value so callers can render it directly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors {
    entries: Vec<(String, Vec<String>)>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        let field = field.into();
        let message = message.into();
        match self.entries.iter_mut().find(|(name, _)| *name == field) {
            Some((_, messages)) => messages.push(message),
            None => self.entries.push((field, vec![message])),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn messages(&self, field: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, messages)| messages.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(field, messages)| (field.as_str(), messages.as_slice()))
    }

    pub fn to_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (field, messages) in &self.entries {
            map.insert(
                field.clone(),
                Value::Array(messages.iter().cloned().map(Value::String).collect()),
            );
        }
        Value::Object(map)
    }
}

/// Request validation contract. Implementations inspect the request and
/// report failures as values rather than errors.
pub trait Validator: Send + Sync {
    fn validate(&self, request: &Request) -> ValidationErrors;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_responses_for_missing_route_and_missing_method() {
        let not_found = HttpError::not_found("/nowhere").into_response();
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);

        let not_allowed =
            HttpError::method_not_allowed(Method::POST, "/widgets", vec![Method::GET, Method::PUT])
                .into_response();
        assert_eq!(not_allowed.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(not_allowed.header("allow"), Some("GET, PUT"));
    }

    #[test]
    fn test_internal_response_hides_the_message() {
        let response = HttpError::internal("pool exhausted").into_response();
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!response.body_text().contains("pool exhausted"));
    }

    #[test]
    fn test_validation_errors_keep_recording_order() {
        let mut errors = ValidationErrors::new();
        errors.add("name", "is required");
        errors.add("price", "must be positive");
        errors.add("name", "must be unique");

        let fields: Vec<&str> = errors.iter().map(|(field, _)| field).collect();
        assert_eq!(fields, vec!["name", "price"]);
        assert_eq!(
            errors.messages("name"),
            Some(&["is required".to_string(), "must be unique".to_string()][..])
        );
        assert!(errors.messages("sku").is_none());
    }

    #[test]
    fn test_validation_errors_render_as_field_message_map() {
        let mut errors = ValidationErrors::new();
        errors.add("price", "must be positive");
        assert_eq!(
            errors.to_json(),
            serde_json::json!({ "price": ["must be positive"] })
        );
    }
}
