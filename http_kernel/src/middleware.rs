//! Handler and middleware contracts plus the chain composer.
//!
//! Middleware wrap the handler as nested continuations: each layer receives
//! the request and the next handler, and may short-circuit by returning its
//! own response without calling `next`.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use service_container::Container;

use crate::errors::{HttpError, HttpResult};
use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// Final request processor. Route actions and composed chains both
/// implement this.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, request: Request) -> HttpResult<Response>;
}

#[async_trait]
impl<T: Handler + ?Sized> Handler for Arc<T> {
    async fn handle(&self, request: Request) -> HttpResult<Response> {
        (**self).handle(request).await
    }
}

/// Request interceptor wrapping the rest of the chain.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn process(&self, request: Request, next: Arc<dyn Handler>) -> HttpResult<Response>;
}

/// Adapter turning an async function into a handler. The return value goes
/// through [`IntoResponse`] normalization.
pub struct FnHandler<F> {
    func: F,
}

impl<F> FnHandler<F> {
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F, Fut, R> Handler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = HttpResult<R>> + Send,
    R: IntoResponse + Send,
{
    async fn handle(&self, request: Request) -> HttpResult<Response> {
        let value = (self.func)(request).await?;
        Ok(value.into_response())
    }
}

/// Adapter turning an async closure into middleware.
pub struct FnMiddleware<F> {
    func: F,
}

impl<F> FnMiddleware<F> {
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(Request, Arc<dyn Handler>) -> Fut + Send + Sync,
    Fut: Future<Output = HttpResult<Response>> + Send,
{
    async fn process(&self, request: Request, next: Arc<dyn Handler>) -> HttpResult<Response> {
        (self.func)(request, next).await
    }
}

/// Handler that resolves its controller from the service container on every
/// request.
pub struct ContainerHandler<C> {
    container: Arc<Container>,
    _controller: PhantomData<fn() -> C>,
}

impl<C> ContainerHandler<C> {
    pub fn new(container: Arc<Container>) -> Self {
        Self {
            container,
            _controller: PhantomData,
        }
    }
}

#[async_trait]
impl<C: Handler + 'static> Handler for ContainerHandler<C> {
    async fn handle(&self, request: Request) -> HttpResult<Response> {
        let controller = self
            .container
            .resolve::<C>()
            .map_err(|err| HttpError::internal(err.to_string()))?;
        controller.handle(request).await
    }
}

struct ChainLink {
    middleware: Arc<dyn Middleware>,
    next: Arc<dyn Handler>,
}

#[async_trait]
impl Handler for ChainLink {
    async fn handle(&self, request: Request) -> HttpResult<Response> {
        self.middleware.process(request, self.next.clone()).await
    }
}

/// Wrap `action` in `middleware`, outermost first. Execution order equals
/// slice order.
pub fn compose(middleware: &[Arc<dyn Middleware>], action: Arc<dyn Handler>) -> Arc<dyn Handler> {
    let mut next = action;
    for layer in middleware.iter().rev() {
        next = Arc::new(ChainLink {
            middleware: layer.clone(),
            next,
        });
    }
    next
}
