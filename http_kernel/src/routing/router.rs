//! Route registration, grouping, and dispatch.

use std::sync::Arc;

use async_trait::async_trait;
use hyper::Method;

use crate::errors::{HttpError, HttpResult};
use crate::middleware::{compose, Handler, Middleware};
use crate::request::Request;
use crate::response::Response;

use super::pattern::PathPattern;
use super::route::Route;

/// Attributes layered onto every route registered inside a group.
#[derive(Default)]
pub struct GroupAttributes {
    prefix: Option<String>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl GroupAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }
}

/// Route table and dispatcher.
///
/// Routes are registered at startup and matched first-registered-first at
/// dispatch. Groups layer a prefix and middleware onto the routes their
/// callback registers; nested groups compose and unwind in LIFO order.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
    global: Vec<Arc<dyn Middleware>>,
    groups: Vec<GroupAttributes>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Middleware that runs for every dispatched request, before group and
    /// route layers
    pub fn global_middleware(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.global.push(Arc::new(middleware));
        self
    }

    pub fn get(&mut self, path: &str, handler: impl Handler + 'static) -> HttpResult<&mut Route> {
        self.register(vec![Method::GET], path, handler)
    }

    pub fn post(&mut self, path: &str, handler: impl Handler + 'static) -> HttpResult<&mut Route> {
        self.register(vec![Method::POST], path, handler)
    }

    pub fn put(&mut self, path: &str, handler: impl Handler + 'static) -> HttpResult<&mut Route> {
        self.register(vec![Method::PUT], path, handler)
    }

    pub fn patch(&mut self, path: &str, handler: impl Handler + 'static) -> HttpResult<&mut Route> {
        self.register(vec![Method::PATCH], path, handler)
    }

    pub fn delete(
        &mut self,
        path: &str,
        handler: impl Handler + 'static,
    ) -> HttpResult<&mut Route> {
        self.register(vec![Method::DELETE], path, handler)
    }

    pub fn options(
        &mut self,
        path: &str,
        handler: impl Handler + 'static,
    ) -> HttpResult<&mut Route> {
        self.register(vec![Method::OPTIONS], path, handler)
    }

    /// Register one route answering several methods
    pub fn match_any(
        &mut self,
        methods: &[Method],
        path: &str,
        handler: impl Handler + 'static,
    ) -> HttpResult<&mut Route> {
        self.register(methods.to_vec(), path, handler)
    }

    /// Register one route answering every standard method
    pub fn any(&mut self, path: &str, handler: impl Handler + 'static) -> HttpResult<&mut Route> {
        self.register(
            vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
                Method::HEAD,
            ],
            path,
            handler,
        )
    }

    /// Layer `attributes` onto every route registered inside `body`. Prior
    /// state is restored afterwards even when the callback fails.
    pub fn group(
        &mut self,
        attributes: GroupAttributes,
        body: impl FnOnce(&mut Router) -> HttpResult<()>,
    ) -> HttpResult<()> {
        self.groups.push(attributes);
        let result = body(self);
        self.groups.pop();
        result
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Rebuild the URL of a named route
    pub fn route_url(&self, name: &str, params: &[(&str, &str)]) -> HttpResult<String> {
        let route = self
            .routes
            .iter()
            .find(|route| route.name.as_deref() == Some(name))
            .ok_or_else(|| HttpError::internal(format!("no route named '{name}'")))?;
        route.pattern.expand(params)
    }

    /// Route the request to its handler through the middleware chain.
    ///
    /// A path that matches a route only under other methods yields
    /// `MethodNotAllowed` carrying those methods; a path matching nothing
    /// yields `NotFound`.
    pub async fn dispatch(&self, mut request: Request) -> HttpResult<Response> {
        let method = request.effective_method();
        let path = normalize_path(request.path());
        let mut allowed: Vec<Method> = Vec::new();

        for route in &self.routes {
            let Some(params) = route.pattern.matches(&path) else {
                continue;
            };
            if !route.methods.contains(&method) {
                for candidate in &route.methods {
                    if !allowed.contains(candidate) {
                        allowed.push(candidate.clone());
                    }
                }
                continue;
            }

            tracing::debug!(
                method = %method,
                path = %path,
                route = route.pattern.source(),
                "dispatching request"
            );
            for (name, value) in params {
                request.set_path_param(name, value);
            }
            let layers: Vec<Arc<dyn Middleware>> = self
                .global
                .iter()
                .chain(route.middleware.iter())
                .cloned()
                .collect();
            let chain = compose(&layers, route.handler.clone());
            return chain.handle(request).await;
        }

        if allowed.is_empty() {
            Err(HttpError::not_found(path))
        } else {
            Err(HttpError::method_not_allowed(method, path, allowed))
        }
    }

    /// Dispatch and convert any routing error into its response, so the
    /// caller always has something to send.
    pub async fn respond(&self, request: Request) -> Response {
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(error) => error.into_response(),
        }
    }

    fn register(
        &mut self,
        methods: Vec<Method>,
        path: &str,
        handler: impl Handler + 'static,
    ) -> HttpResult<&mut Route> {
        let full_path = self.prefixed_path(path);
        let pattern = PathPattern::new(&full_path)?;
        let layered: Vec<Arc<dyn Middleware>> = self
            .groups
            .iter()
            .flat_map(|group| group.middleware.iter().cloned())
            .collect();
        let index = self.routes.len();
        self.routes
            .push(Route::new(methods, pattern, Arc::new(handler), layered));
        Ok(&mut self.routes[index])
    }

    fn prefixed_path(&self, path: &str) -> String {
        let mut full = String::new();
        for group in &self.groups {
            if let Some(prefix) = &group.prefix {
                let trimmed = prefix.trim_matches('/');
                if !trimmed.is_empty() {
                    full.push('/');
                    full.push_str(trimmed);
                }
            }
        }
        let tail = path.trim_start_matches('/');
        if !tail.is_empty() {
            full.push('/');
            full.push_str(tail);
        }
        if full.is_empty() {
            full.push('/');
        }
        full
    }
}

#[async_trait]
impl Handler for Router {
    async fn handle(&self, request: Request) -> HttpResult<Response> {
        self.dispatch(request).await
    }
}

// Trailing slashes are not significant when matching
fn normalize_path(path: &str) -> String {
    if path.len() > 1 {
        path.trim_end_matches('/').to_string()
    } else {
        path.to_string()
    }
}

/// Declarative route registration, equivalent to calling the per-verb
/// methods in order.
///
/// ```
/// use http_kernel::{route_table, FnHandler, HttpError, Request, Response, Router};
///
/// async fn health(_request: Request) -> Result<Response, HttpError> {
///     Ok(Response::text("ok"))
/// }
///
/// let mut router = Router::new();
/// route_table!(router, {
///     GET "/health" => FnHandler::new(health);
///     GET "/health/{probe}" => FnHandler::new(health), named "health.probe";
/// })
/// .unwrap();
/// assert_eq!(router.routes().len(), 2);
/// ```
#[macro_export]
macro_rules! route_table {
    ($router:expr, { $( $method:ident $path:literal => $handler:expr $(, named $name:literal)? ; )* }) => {{
        (|| -> $crate::HttpResult<()> {
            $(
                {
                    let _route = $crate::route_table!(@verb $router, $method, $path, $handler)?;
                    $( _route.name($name); )?
                }
            )*
            Ok(())
        })()
    }};
    (@verb $router:expr, GET, $path:literal, $handler:expr) => { $router.get($path, $handler) };
    (@verb $router:expr, POST, $path:literal, $handler:expr) => { $router.post($path, $handler) };
    (@verb $router:expr, PUT, $path:literal, $handler:expr) => { $router.put($path, $handler) };
    (@verb $router:expr, PATCH, $path:literal, $handler:expr) => { $router.patch($path, $handler) };
    (@verb $router:expr, DELETE, $path:literal, $handler:expr) => { $router.delete($path, $handler) };
    (@verb $router:expr, OPTIONS, $path:literal, $handler:expr) => { $router.options($path, $handler) };
    (@verb $router:expr, ANY, $path:literal, $handler:expr) => { $router.any($path, $handler) };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{FnHandler, FnMiddleware};
    use crate::route_table;
    use hyper::StatusCode;
    use std::sync::Mutex;

    fn text_handler(body: &'static str) -> FnHandler<impl Fn(Request) -> TextFut + Send + Sync> {
        FnHandler::new(move |_request: Request| text_response(body))
    }

    type TextFut = std::pin::Pin<
        Box<dyn std::future::Future<Output = HttpResult<Response>> + Send>,
    >;

    fn text_response(body: &'static str) -> TextFut {
        Box::pin(async move { Ok(Response::text(body)) })
    }

    fn tagging_middleware(
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    ) -> FnMiddleware<
        impl Fn(Request, Arc<dyn Handler>) -> TextFut + Send + Sync,
    > {
        FnMiddleware::new(move |request: Request, next: Arc<dyn Handler>| {
            let log = log.clone();
            let fut: TextFut = Box::pin(async move {
                log.lock().unwrap().push(label.to_string());
                next.handle(request).await
            });
            fut
        })
    }

    // ==================== 404 and 405 ====================

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let mut router = Router::new();
        router.get("/widgets", text_handler("list")).expect("registers");

        let err = router
            .dispatch(Request::get("/gadgets").expect("valid target"))
            .await
            .expect_err("no match");
        assert!(matches!(err, HttpError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_wrong_method_is_method_not_allowed_with_the_allowed_set() {
        let mut router = Router::new();
        router.get("/widgets", text_handler("list")).expect("registers");
        router.put("/widgets", text_handler("replace")).expect("registers");

        let err = router
            .dispatch(Request::post("/widgets", "").expect("valid target"))
            .await
            .expect_err("method mismatch");
        match err {
            HttpError::MethodNotAllowed {
                method, allowed, ..
            } => {
                assert_eq!(method, Method::POST);
                assert_eq!(allowed, vec![Method::GET, Method::PUT]);
            }
            other => panic!("expected MethodNotAllowed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_respond_maps_errors_to_status_codes() {
        let mut router = Router::new();
        router.get("/widgets", text_handler("list")).expect("registers");

        let missing = router
            .respond(Request::get("/gone").expect("valid target"))
            .await;
        assert_eq!(missing.status, StatusCode::NOT_FOUND);

        let wrong_method = router
            .respond(Request::post("/widgets", "").expect("valid target"))
            .await;
        assert_eq!(wrong_method.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(wrong_method.header("allow"), Some("GET"));
    }

    // ==================== Matching order ====================

    #[tokio::test]
    async fn test_first_registered_route_wins() {
        let mut router = Router::new();
        router
            .get("/products/{id}", text_handler("by id"))
            .expect("registers");
        router
            .get("/products/featured", text_handler("featured"))
            .expect("registers");

        let response = router
            .dispatch(Request::get("/products/featured").expect("valid target"))
            .await
            .expect("matches");
        assert_eq!(response.body_text(), "by id");
    }

    #[tokio::test]
    async fn test_path_params_reach_the_handler() {
        let mut router = Router::new();
        router
            .get(
                "/products/{id}",
                FnHandler::new(|request: Request| async move {
                    let id = request.path_param("id").unwrap_or("?").to_string();
                    Ok::<_, HttpError>(Response::text(id))
                }),
            )
            .expect("registers");

        let response = router
            .dispatch(Request::get("/products/42").expect("valid target"))
            .await
            .expect("matches");
        assert_eq!(response.body_text(), "42");
    }

    #[tokio::test]
    async fn test_trailing_slash_on_the_request_is_ignored() {
        let mut router = Router::new();
        router.get("/widgets", text_handler("list")).expect("registers");

        let response = router
            .dispatch(Request::get("/widgets/").expect("valid target"))
            .await
            .expect("matches");
        assert_eq!(response.body_text(), "list");
    }

    #[tokio::test]
    async fn test_any_answers_every_standard_method() {
        let mut router = Router::new();
        router.any("/mirror", text_handler("seen")).expect("registers");

        for method in [Method::GET, Method::PUT, Method::DELETE] {
            let request = Request::get("/mirror")
                .expect("valid target")
                .with_method(method);
            let response = router.dispatch(request).await.expect("matches");
            assert_eq!(response.body_text(), "seen");
        }
    }

    // ==================== Method override ====================

    #[tokio::test]
    async fn test_post_with_override_reaches_the_delete_route() {
        let mut router = Router::new();
        router
            .delete("/products/{id}", text_handler("deleted"))
            .expect("registers");

        let request =
            Request::post_form("/products/1", &[("_method", "DELETE")]).expect("valid target");
        let response = router.dispatch(request).await.expect("matches");
        assert_eq!(response.body_text(), "deleted");
    }

    #[tokio::test]
    async fn test_ignored_override_still_routes_as_post() {
        let mut router = Router::new();
        router.post("/products", text_handler("created")).expect("registers");

        let request =
            Request::post_form("/products", &[("_method", "GET")]).expect("valid target");
        let response = router.dispatch(request).await.expect("matches");
        assert_eq!(response.body_text(), "created");
    }

    // ==================== Groups ====================

    #[tokio::test]
    async fn test_group_prefixes_apply_and_unwind() {
        let mut router = Router::new();
        router
            .group(GroupAttributes::new().prefix("/api"), |api| {
                api.group(GroupAttributes::new().prefix("/v1"), |v1| {
                    v1.get("/products", text_handler("v1 products"))?;
                    Ok(())
                })?;
                api.get("/health", text_handler("healthy"))?;
                Ok(())
            })
            .expect("groups register");
        router.get("/plain", text_handler("plain")).expect("registers");

        let paths: Vec<&str> = router.routes().iter().map(Route::path).collect();
        assert_eq!(paths, vec!["/api/v1/products", "/api/health", "/plain"]);
    }

    #[tokio::test]
    async fn test_middleware_runs_global_then_group_then_route() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut router = Router::new();
        router.global_middleware(tagging_middleware("global", log.clone()));
        router
            .group(
                GroupAttributes::new()
                    .prefix("/admin")
                    .middleware(tagging_middleware("group", log.clone())),
                |admin| {
                    admin
                        .get("/stats", text_handler("stats"))?
                        .middleware(tagging_middleware("route", log.clone()));
                    Ok(())
                },
            )
            .expect("group registers");

        router
            .dispatch(Request::get("/admin/stats").expect("valid target"))
            .await
            .expect("matches");
        assert_eq!(*log.lock().unwrap(), vec!["global", "group", "route"]);
    }

    #[tokio::test]
    async fn test_group_middleware_does_not_leak_to_later_routes() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut router = Router::new();
        router
            .group(
                GroupAttributes::new().middleware(tagging_middleware("group", log.clone())),
                |grouped| {
                    grouped.get("/inside", text_handler("in"))?;
                    Ok(())
                },
            )
            .expect("group registers");
        router.get("/outside", text_handler("out")).expect("registers");

        router
            .dispatch(Request::get("/outside").expect("valid target"))
            .await
            .expect("matches");
        assert!(log.lock().unwrap().is_empty());
    }

    // ==================== Names and reverse lookup ====================

    #[tokio::test]
    async fn test_route_url_reverses_named_routes() {
        let mut router = Router::new();
        router
            .get("/products/{id}", text_handler("show"))
            .expect("registers")
            .name("products.show");

        assert_eq!(
            router
                .route_url("products.show", &[("id", "42")])
                .expect("reverses"),
            "/products/42"
        );
        assert!(router.route_url("products.missing", &[]).is_err());
    }

    #[tokio::test]
    async fn test_route_table_macro_registers_equivalent_routes() {
        let mut router = Router::new();
        route_table!(router, {
            GET "/products" => text_handler("list");
            POST "/products" => text_handler("create");
            GET "/products/{id}" => text_handler("show"), named "products.show";
        })
        .expect("table registers");

        assert_eq!(router.routes().len(), 3);
        assert_eq!(
            router
                .route_url("products.show", &[("id", "7")])
                .expect("reverses"),
            "/products/7"
        );
        let response = router
            .dispatch(Request::post("/products", "").expect("valid target"))
            .await
            .expect("matches");
        assert_eq!(response.body_text(), "create");
    }
}
