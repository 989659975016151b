//! A single registered route.

use std::sync::Arc;

use hyper::Method;

use crate::middleware::{Handler, Middleware};

use super::pattern::PathPattern;

/// One entry in the route table: the methods it answers, its compiled
/// pattern, the action, and the middleware layered on top of it (group
/// layers first, then route-specific layers).
pub struct Route {
    pub(crate) methods: Vec<Method>,
    pub(crate) pattern: PathPattern,
    pub(crate) handler: Arc<dyn Handler>,
    pub(crate) middleware: Vec<Arc<dyn Middleware>>,
    pub(crate) name: Option<String>,
}

impl Route {
    pub(crate) fn new(
        methods: Vec<Method>,
        pattern: PathPattern,
        handler: Arc<dyn Handler>,
        middleware: Vec<Arc<dyn Middleware>>,
    ) -> Self {
        Self {
            methods,
            pattern,
            handler,
            middleware,
            name: None,
        }
    }

    /// Name the route for reverse lookup
    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    /// Append route-specific middleware; it runs after global and group
    /// layers
    pub fn middleware(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn path(&self) -> &str {
        self.pattern.source()
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn route_name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}
