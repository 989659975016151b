//! Document Store - Document half of the Markethaus data layer
//!
//! This crate provides the MongoDB connection wrapper, the fluent filter
//! builder with its closed operator map, and the value bridging between
//! JSON attribute maps and BSON documents.

pub mod builder;
pub mod connection;
pub mod errors;
pub mod page;
pub mod value;

pub use builder::DocumentQuery;
pub use connection::DocumentDatabase;
pub use errors::{DocResult, DocumentStoreError};
pub use page::{last_page_for, Page};
pub use value::{bson_to_value, document_to_map, map_to_document, value_to_bson, DocumentMap};
