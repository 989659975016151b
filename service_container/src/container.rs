//! Typed service registry.
//!
//! Bindings are keyed by `TypeId` and built by explicit factory closures
//! that receive the container and resolve their own dependencies, so
//! construction wiring is ordinary code rather than reflection. Locks are
//! never held across a factory call; recursive resolution from inside a
//! factory cannot deadlock. Circular factories are not detected and will
//! recurse until the stack runs out.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::errors::{FactoryError, ResolveError, ResolveResult};

type Shared = Arc<dyn Any + Send + Sync>;
type Factory = Arc<dyn Fn(&Container) -> Result<Shared, FactoryError> + Send + Sync>;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Lifetime {
    Transient,
    Singleton,
}

struct Binding {
    factory: Factory,
    lifetime: Lifetime,
}

/// Service container with transient and singleton lifetimes.
///
/// ```
/// use std::sync::Arc;
/// use service_container::Container;
///
/// struct Mailer {
///     sender: String,
/// }
///
/// let container = Container::new();
/// container.singleton::<Mailer, _>(|_| {
///     Ok(Mailer { sender: "noreply@markethaus.test".into() })
/// });
///
/// let mailer = container.resolve::<Mailer>().unwrap();
/// let again = container.resolve::<Mailer>().unwrap();
/// assert!(Arc::ptr_eq(&mailer, &again));
/// ```
#[derive(Default)]
pub struct Container {
    bindings: RwLock<HashMap<TypeId, Binding>>,
    instances: RwLock<HashMap<TypeId, Shared>>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transient binding: the factory runs on every resolve
    pub fn bind<T, F>(&self, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> Result<T, FactoryError> + Send + Sync + 'static,
    {
        self.register::<T, F>(factory, Lifetime::Transient);
    }

    /// Register a singleton binding: the factory runs at most once, the
    /// result is cached for the container's lifetime
    pub fn singleton<T, F>(&self, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> Result<T, FactoryError> + Send + Sync + 'static,
    {
        self.register::<T, F>(factory, Lifetime::Singleton);
    }

    /// Register an existing value as the singleton for its type.
    /// Explicitly provided instances take precedence over factories.
    pub fn instance<T: Send + Sync + 'static>(&self, value: T) {
        let mut instances = self
            .instances
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        instances.insert(TypeId::of::<T>(), Arc::new(value));
    }

    fn register<T, F>(&self, factory: F, lifetime: Lifetime)
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> Result<T, FactoryError> + Send + Sync + 'static,
    {
        tracing::debug!(service = std::any::type_name::<T>(), "binding registered");
        let factory: Factory = Arc::new(move |container| {
            factory(container).map(|value| Arc::new(value) as Shared)
        });
        let mut bindings = self
            .bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        bindings.insert(TypeId::of::<T>(), Binding { factory, lifetime });
    }

    /// Resolve a service, building it if necessary
    pub fn resolve<T: Send + Sync + 'static>(&self) -> ResolveResult<Arc<T>> {
        match self.try_resolve::<T>()? {
            Some(service) => Ok(service),
            None => Err(ResolveError::not_bound(std::any::type_name::<T>())),
        }
    }

    /// Resolve if bound; `Ok(None)` when no binding exists. Factory
    /// failures still surface as errors.
    pub fn try_resolve<T: Send + Sync + 'static>(&self) -> ResolveResult<Option<Arc<T>>> {
        let key = TypeId::of::<T>();

        if let Some(cached) = self.cached_instance::<T>(&key) {
            return Ok(Some(cached));
        }

        // Clone the factory handle out so no lock is held while it runs
        let binding = {
            let bindings = self
                .bindings
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            bindings
                .get(&key)
                .map(|binding| (binding.factory.clone(), binding.lifetime))
        };
        let Some((factory, lifetime)) = binding else {
            return Ok(None);
        };

        let built = factory(self)
            .map_err(|source| ResolveError::build_failed(std::any::type_name::<T>(), source))?;

        let shared = if lifetime == Lifetime::Singleton {
            // Another task may have finished first; the stored instance
            // wins so every resolver sees the same one
            let mut instances = self
                .instances
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            instances.entry(key).or_insert(built).clone()
        } else {
            built
        };

        match shared.downcast::<T>() {
            Ok(service) => Ok(Some(service)),
            Err(_) => Err(ResolveError::not_bound(std::any::type_name::<T>())),
        }
    }

    /// Resolve if bound, otherwise fall back to the supplied default
    pub fn resolve_or<T: Send + Sync + 'static>(&self, default: T) -> ResolveResult<Arc<T>> {
        Ok(match self.try_resolve::<T>()? {
            Some(service) => service,
            None => Arc::new(default),
        })
    }

    pub fn resolve_or_default<T: Default + Send + Sync + 'static>(&self) -> ResolveResult<Arc<T>> {
        self.resolve_or(T::default())
    }

    pub fn contains<T: 'static>(&self) -> bool {
        let key = TypeId::of::<T>();
        let bound = self
            .bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&key);
        bound
            || self
                .instances
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .contains_key(&key)
    }

    /// Drop a binding and any cached instance for the type
    pub fn forget<T: 'static>(&self) {
        tracing::debug!(service = std::any::type_name::<T>(), "binding removed");
        let key = TypeId::of::<T>();
        self.bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
        self.instances
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
    }

    fn cached_instance<T: Send + Sync + 'static>(&self, key: &TypeId) -> Option<Arc<T>> {
        let instances = self
            .instances
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        instances
            .get(key)
            .and_then(|shared| shared.clone().downcast::<T>().ok())
    }
}
