//! Request representation over hyper's method, URI, and header types.

use std::collections::HashMap;

use bytes::Bytes;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Method, Uri};
use percent_encoding::percent_decode_str;
use serde_json::Value;

use crate::errors::{HttpError, HttpResult, ValidationErrors, Validator};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// An HTTP request as seen by middleware and handlers.
///
/// Query parameters are percent-decoded at construction. Path parameters are
/// attached by the router after the route pattern matches.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub query_params: HashMap<String, String>,
    pub path_params: HashMap<String, String>,
}

impl Request {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        let query_params = parse_query_params(&uri);
        Self {
            method,
            uri,
            headers,
            body,
            query_params,
            path_params: HashMap::new(),
        }
    }

    /// Build a GET request from a path-and-query string
    pub fn get(target: &str) -> HttpResult<Self> {
        let uri = parse_target(target)?;
        Ok(Self::new(Method::GET, uri, HeaderMap::new(), Bytes::new()))
    }

    /// Build a POST request with a raw body
    pub fn post(target: &str, body: impl Into<Bytes>) -> HttpResult<Self> {
        let uri = parse_target(target)?;
        Ok(Self::new(Method::POST, uri, HeaderMap::new(), body.into()))
    }

    /// Build a POST request carrying a form-encoded body
    pub fn post_form(target: &str, fields: &[(&str, &str)]) -> HttpResult<Self> {
        let body = serde_urlencoded::to_string(fields)
            .map_err(|err| HttpError::bad_request(format!("could not encode form body: {err}")))?;
        Ok(Self::post(target, body)?.with_header("content-type", FORM_CONTENT_TYPE))
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
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

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(String::as_str)
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    /// Attach a path parameter; called by the router after a pattern match
    pub fn set_path_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.path_params.insert(name.into(), value.into());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.header("authorization")
            .and_then(|value| value.strip_prefix("Bearer "))
    }

    /// Parse the body as JSON
    pub fn json(&self) -> HttpResult<Value> {
        serde_json::from_slice(&self.body)
            .map_err(|err| HttpError::bad_request(format!("request body is not valid JSON: {err}")))
    }

    /// Parse the body as form fields. Empty unless the content type is
    /// form-urlencoded.
    pub fn form(&self) -> HashMap<String, String> {
        if !self.is_form() || self.body.is_empty() {
            return HashMap::new();
        }
        serde_urlencoded::from_bytes::<Vec<(String, String)>>(&self.body)
            .map(|pairs| pairs.into_iter().collect())
            .unwrap_or_default()
    }

    pub fn form_field(&self, name: &str) -> Option<String> {
        self.form().remove(name)
    }

    /// Fetch one input value, body fields taking precedence over query
    /// parameters.
    pub fn input(&self, name: &str) -> Option<Value> {
        if let Ok(Value::Object(body)) = self.json() {
            if let Some(value) = body.get(name) {
                return Some(value.clone());
            }
        }
        if let Some(value) = self.form_field(name) {
            return Some(Value::String(value));
        }
        self.query_param(name)
            .map(|value| Value::String(value.to_string()))
    }

    /// The method routing should honor. A POST may override itself to
    /// PUT/PATCH/DELETE via a `_method` form field or the
    /// `X-HTTP-Method-Override` header; every other override value is
    /// ignored.
    pub fn effective_method(&self) -> Method {
        if self.method != Method::POST {
            return self.method.clone();
        }
        let requested = self
            .form_field("_method")
            .or_else(|| self.header("x-http-method-override").map(str::to_string));
        match requested {
            Some(ref value) if value.eq_ignore_ascii_case("put") => Method::PUT,
            Some(ref value) if value.eq_ignore_ascii_case("patch") => Method::PATCH,
            Some(ref value) if value.eq_ignore_ascii_case("delete") => Method::DELETE,
            _ => Method::POST,
        }
    }

    pub fn validate(&self, validator: &dyn Validator) -> ValidationErrors {
        validator.validate(self)
    }

    fn is_form(&self) -> bool {
        self.header("content-type")
            .map(|value| value.starts_with(FORM_CONTENT_TYPE))
            .unwrap_or(false)
    }
}

fn parse_target(target: &str) -> HttpResult<Uri> {
    target
        .parse::<Uri>()
        .map_err(|err| HttpError::bad_request(format!("invalid request target '{target}': {err}")))
}

fn parse_query_params(uri: &Uri) -> HashMap<String, String> {
    uri.query()
        .map(|query| {
            query
                .split('&')
                .filter(|pair| !pair.is_empty())
                .filter_map(|pair| {
                    // Split on the first '=' only so values may contain '='
                    let mut parts = pair.splitn(2, '=');
                    Some((
                        decode_component(parts.next()?),
                        decode_component(parts.next().unwrap_or("")),
                    ))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ==================== Query parsing ====================

    #[test]
    fn test_query_params_are_percent_decoded() {
        let request = Request::get("/search?name=John%20Doe&tag=a%2Bb").expect("valid target");
        assert_eq!(request.query_param("name"), Some("John Doe"));
        assert_eq!(request.query_param("tag"), Some("a+b"));
    }

    #[test]
    fn test_plus_decodes_to_space() {
        let request = Request::get("/search?q=salted+butter").expect("valid target");
        assert_eq!(request.query_param("q"), Some("salted butter"));
    }

    #[test]
    fn test_value_may_contain_equals() {
        let request = Request::get("/cb?next=/a=b").expect("valid target");
        assert_eq!(request.query_param("next"), Some("/a=b"));
    }

    #[test]
    fn test_repeated_key_keeps_the_last_value() {
        let request = Request::get("/list?page=1&page=2").expect("valid target");
        assert_eq!(request.query_param("page"), Some("2"));
    }

    #[test]
    fn test_no_query_string_yields_empty_map() {
        let request = Request::get("/plain").expect("valid target");
        assert!(request.query_params.is_empty());
    }

    // ==================== Body access ====================

    #[test]
    fn test_json_body_parses() {
        let request = Request::post("/products", r#"{"name":"Butter"}"#).expect("valid target");
        assert_eq!(request.json().expect("valid json"), json!({"name": "Butter"}));
    }

    #[test]
    fn test_invalid_json_is_a_bad_request() {
        let request = Request::post("/products", "{oops").expect("valid target");
        assert!(matches!(request.json(), Err(HttpError::BadRequest(_))));
    }

    #[test]
    fn test_form_requires_the_content_type() {
        let typed =
            Request::post_form("/products", &[("name", "Salted Butter")]).expect("valid target");
        assert_eq!(typed.form_field("name"), Some("Salted Butter".to_string()));

        let untyped = Request::post("/products", "name=Salted+Butter").expect("valid target");
        assert!(untyped.form().is_empty());
    }

    #[test]
    fn test_input_prefers_json_body_over_query() {
        let request = Request::post("/products?name=FromQuery", r#"{"name":"FromBody"}"#)
            .expect("valid target");
        assert_eq!(request.input("name"), Some(json!("FromBody")));
        assert_eq!(request.input("missing"), None);
    }

    #[test]
    fn test_input_prefers_form_body_over_query() {
        let request =
            Request::post_form("/products?name=FromQuery&page=2", &[("name", "FromForm")])
                .expect("valid target");
        assert_eq!(request.input("name"), Some(json!("FromForm")));
        assert_eq!(request.input("page"), Some(json!("2")));
    }

    // ==================== Headers ====================

    #[test]
    fn test_bearer_token_strips_the_scheme() {
        let request = Request::get("/me")
            .expect("valid target")
            .with_header("authorization", "Bearer tok-123");
        assert_eq!(request.bearer_token(), Some("tok-123"));

        let basic = Request::get("/me")
            .expect("valid target")
            .with_header("authorization", "Basic abc");
        assert_eq!(basic.bearer_token(), None);
    }

    // ==================== Method override ====================

    #[test]
    fn test_post_form_field_overrides_to_delete() {
        let request =
            Request::post_form("/products/1", &[("_method", "DELETE")]).expect("valid target");
        assert_eq!(request.effective_method(), Method::DELETE);
    }

    #[test]
    fn test_override_header_works_without_a_form_body() {
        let request = Request::post("/products/1", "")
            .expect("valid target")
            .with_header("x-http-method-override", "patch");
        assert_eq!(request.effective_method(), Method::PATCH);
    }

    #[test]
    fn test_form_field_wins_over_the_header() {
        let request = Request::post_form("/products/1", &[("_method", "PUT")])
            .expect("valid target")
            .with_header("x-http-method-override", "DELETE");
        assert_eq!(request.effective_method(), Method::PUT);
    }

    #[test]
    fn test_override_outside_the_whitelist_is_ignored() {
        let request =
            Request::post_form("/products/1", &[("_method", "GET")]).expect("valid target");
        assert_eq!(request.effective_method(), Method::POST);

        let connect =
            Request::post_form("/products/1", &[("_method", "CONNECT")]).expect("valid target");
        assert_eq!(connect.effective_method(), Method::POST);
    }

    #[test]
    fn test_only_post_requests_can_override() {
        let request = Request::get("/products/1")
            .expect("valid target")
            .with_header("x-http-method-override", "DELETE");
        assert_eq!(request.effective_method(), Method::GET);
    }
}
