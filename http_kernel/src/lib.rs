//! HTTP routing and middleware kernel for markethaus.
//!
//! Routes are registered per verb (imperatively or through the
//! [`route_table!`] macro), grouped under shared prefixes and middleware,
//! and dispatched first-match-wins. Middleware compose as nested
//! continuations around the route action; handler return values normalize
//! through [`IntoResponse`]. A path matched under the wrong method is
//! reported as method-not-allowed, never as not-found.

pub mod errors;
pub mod middleware;
pub mod request;
pub mod response;
pub mod routing;

pub use errors::{HttpError, HttpResult, ValidationErrors, Validator};
pub use middleware::{compose, ContainerHandler, FnHandler, FnMiddleware, Handler, Middleware};
pub use request::Request;
pub use response::{IntoResponse, Json, Response};
pub use routing::{GroupAttributes, PathPattern, Route, Router};

pub use hyper::{Method, StatusCode};
