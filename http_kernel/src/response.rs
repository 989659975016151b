//! Response type and handler return-value normalization.

use bytes::Bytes;
use hyper::header::{HeaderName, HeaderValue, LOCATION};
use hyper::{HeaderMap, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::errors::{HttpError, HttpResult, ValidationErrors};

const JSON: &str = "application/json";
const TEXT: &str = "text/plain; charset=utf-8";

/// HTTP response carried through the middleware chain.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    pub fn created() -> Self {
        Self::new(StatusCode::CREATED)
    }

    pub fn no_content() -> Self {
        Self::new(StatusCode::NO_CONTENT)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND)
    }

    pub fn method_not_allowed() -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED)
    }

    /// 200 with a plain-text body
    pub fn text(body: impl Into<String>) -> Self {
        Self::ok()
            .with_header("content-type", TEXT)
            .with_body(body.into())
    }

    /// 200 with a serialized JSON body
    pub fn json<T: Serialize>(value: &T) -> HttpResult<Self> {
        let body = serde_json::to_vec(value)
            .map_err(|err| HttpError::internal(format!("response serialization failed: {err}")))?;
        Ok(Self::ok().with_header("content-type", JSON).with_body(body))
    }

    /// 302 redirect to the given location
    pub fn redirect(location: &str) -> Self {
        let mut response = Self::new(StatusCode::FOUND);
        if let Ok(value) = HeaderValue::from_str(location) {
            response.headers.insert(LOCATION, value);
        }
        response
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a header; invalid names or values are skipped
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) {
            if let Ok(header_value) = HeaderValue::from_str(value) {
                self.headers.insert(header_name, header_value);
            }
        }
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Conversion applied to every handler return value before it leaves the
/// router.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl IntoResponse for Value {
    fn into_response(self) -> Response {
        Response::ok()
            .with_header("content-type", JSON)
            .with_body(self.to_string())
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Response {
        Response::text(self)
    }
}

impl IntoResponse for &str {
    fn into_response(self) -> Response {
        Response::text(self)
    }
}

impl IntoResponse for () {
    fn into_response(self) -> Response {
        Response::no_content()
    }
}

impl<T: IntoResponse> IntoResponse for Option<T> {
    fn into_response(self) -> Response {
        match self {
            Some(value) => value.into_response(),
            None => Response::no_content(),
        }
    }
}

impl<T: IntoResponse> IntoResponse for (StatusCode, T) {
    fn into_response(self) -> Response {
        self.1.into_response().with_status(self.0)
    }
}

/// Wrapper marking an arbitrary serializable value as a JSON response.
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.0) {
            Ok(body) => Response::ok()
                .with_header("content-type", JSON)
                .with_body(body),
            Err(err) => {
                tracing::error!(error = %err, "response serialization failed");
                Response::new(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

impl IntoResponse for ValidationErrors {
    fn into_response(self) -> Response {
        Response::new(StatusCode::UNPROCESSABLE_ENTITY)
            .with_header("content-type", JSON)
            .with_body(serde_json::json!({ "errors": self.to_json() }).to_string())
    }
}
