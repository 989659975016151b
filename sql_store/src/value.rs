//! Bridging between `serde_json::Value` attributes and Postgres wire types.
//!
//! Statement parameters travel as JSON values and are probed into native
//! types at bind time; result rows are decoded back into JSON maps using the
//! column type reported by the engine.

use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{Column, Row, TypeInfo};

/// A result row decoded to plain attribute data
pub type RowMap = Map<String, Value>;

/// Bind a JSON value into a sqlx query, probing strings for timestamps and
/// UUIDs the same way hydration produces them. Arrays and objects travel as
/// JSON text.
macro_rules! bind_value {
    ($query:expr, $param:expr) => {
        match $param {
            ::serde_json::Value::String(s) => {
                // Try to parse as RFC3339 timestamp first
                if let Ok(dt) = ::chrono::DateTime::parse_from_rfc3339(&s) {
                    $query.bind(dt.with_timezone(&::chrono::Utc))
                // Try to parse as UUID
                } else if let Ok(uuid) = ::uuid::Uuid::parse_str(&s) {
                    $query.bind(uuid)
                } else {
                    $query.bind(s)
                }
            }
            ::serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    if i >= i32::MIN as i64 && i <= i32::MAX as i64 {
                        $query.bind(i as i32)
                    } else {
                        $query.bind(i)
                    }
                } else if let Some(f) = n.as_f64() {
                    $query.bind(f)
                } else {
                    $query.bind(n.to_string())
                }
            }
            ::serde_json::Value::Bool(b) => $query.bind(b),
            ::serde_json::Value::Null => $query.bind(Option::<String>::None),
            other => $query.bind(other.to_string()),
        }
    };
}
pub(crate) use bind_value;

/// Decode a full row into an attribute map keyed by column name
pub fn row_to_map(row: &PgRow) -> RowMap {
    let mut map = Map::new();
    for (idx, column) in row.columns().iter().enumerate() {
        map.insert(
            column.name().to_string(),
            decode_column(row, idx, column.type_info().name()),
        );
    }
    map
}

/// Decode a single column by its Postgres type name.
///
/// Types outside the mapped set fall through a best-effort probe; anything
/// undecodable (NUMERIC without its feature gate, exotic extensions) lands as
/// null rather than failing the whole row.
pub fn decode_column(row: &PgRow, idx: usize, type_name: &str) -> Value {
    match type_name {
        "BOOL" => match row.try_get::<Option<bool>, _>(idx) {
            Ok(Some(v)) => Value::Bool(v),
            _ => Value::Null,
        },
        "INT2" => match row.try_get::<Option<i16>, _>(idx) {
            Ok(Some(v)) => Value::from(v),
            _ => Value::Null,
        },
        "INT4" => match row.try_get::<Option<i32>, _>(idx) {
            Ok(Some(v)) => Value::from(v),
            _ => Value::Null,
        },
        "INT8" => match row.try_get::<Option<i64>, _>(idx) {
            Ok(Some(v)) => Value::from(v),
            _ => Value::Null,
        },
        "FLOAT4" => match row.try_get::<Option<f32>, _>(idx) {
            Ok(Some(v)) => Value::from(f64::from(v)),
            _ => Value::Null,
        },
        "FLOAT8" => match row.try_get::<Option<f64>, _>(idx) {
            Ok(Some(v)) => Value::from(v),
            _ => Value::Null,
        },
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CITEXT" => {
            match row.try_get::<Option<String>, _>(idx) {
                Ok(Some(v)) => Value::String(v),
                _ => Value::Null,
            }
        }
        "TIMESTAMPTZ" => match row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx) {
            Ok(Some(v)) => Value::String(v.to_rfc3339()),
            _ => Value::Null,
        },
        "TIMESTAMP" => match row.try_get::<Option<chrono::NaiveDateTime>, _>(idx) {
            Ok(Some(v)) => Value::String(v.and_utc().to_rfc3339()),
            _ => Value::Null,
        },
        "DATE" => match row.try_get::<Option<chrono::NaiveDate>, _>(idx) {
            Ok(Some(v)) => Value::String(v.to_string()),
            _ => Value::Null,
        },
        "UUID" => match row.try_get::<Option<uuid::Uuid>, _>(idx) {
            Ok(Some(v)) => Value::String(v.to_string()),
            _ => Value::Null,
        },
        "JSON" | "JSONB" => match row.try_get::<Option<Value>, _>(idx) {
            Ok(Some(v)) => v,
            _ => Value::Null,
        },
        _ => {
            if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
                return Value::from(v);
            }
            if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
                return Value::from(v);
            }
            if let Ok(Some(v)) = row.try_get::<Option<bool>, _>(idx) {
                return Value::Bool(v);
            }
            if let Ok(Some(v)) = row.try_get::<Option<String>, _>(idx) {
                return Value::String(v);
            }
            Value::Null
        }
    }
}
