//! Active Record - Backend-neutral record layer
//!
//! Schemas declare static metadata, records carry attribute state with
//! dirty tracking, and stores mediate persistence against whichever
//! storage strategy was injected: relational rows or document collections,
//! one API over both.

pub mod errors;
pub mod query;
pub mod record;
pub mod schema;
pub mod store;

#[cfg(test)]
mod tests;

pub use errors::{RecordError, RecordResult};
pub use query::{Page, RecordQuery};
pub use record::{AttributeMap, Record};
pub use schema::{apply_cast, Accessor, Cast, Mutator, Schema};
pub use store::{RecordStore, StorageBackend};
