//! Typed service container for markethaus.
//!
//! Services register under their concrete type with factory closures;
//! resolution walks explicit instances first, then bindings. Singletons
//! are cached so every resolver shares one `Arc`.

pub mod container;
pub mod errors;

pub use container::Container;
pub use errors::{FactoryError, ResolveError, ResolveResult};
