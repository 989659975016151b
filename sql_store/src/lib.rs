//! SQL Store - Relational half of the Markethaus data layer
//!
//! This crate provides the Postgres connection wrapper, the fluent SQL query
//! builder, and the value bridging between JSON attribute maps and wire types.

pub mod builder;
pub mod connection;
pub mod errors;
pub mod page;
pub mod value;

pub use builder::{CompiledQuery, Connector, JoinKind, Predicate, SortDir, SqlQuery, WhereClause};
pub use connection::SqlDatabase;
pub use errors::{SqlResult, SqlStoreError};
pub use page::{last_page_for, Page};
pub use value::{decode_column, row_to_map, RowMap};

use sqlx::PgPool;

pub type DbPool = PgPool;
