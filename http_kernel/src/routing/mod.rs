//! Route table construction and request dispatch.

mod pattern;
mod route;
mod router;

pub use pattern::PathPattern;
pub use route::Route;
pub use router::{GroupAttributes, Router};
