//! Static model metadata
//!
//! A `Schema` describes one persisted entity: where it lives, which fields
//! callers may mass-assign, how stored values cast on the way out, and which
//! per-field transforms run on reads and writes. Everything is declared
//! statically so a schema type is pure metadata with no instance state.

use serde_json::Value;

/// Per-field read transform: stored value in, caller-facing value out
pub type Accessor = fn(&Value) -> Value;

/// Per-field write transform: caller value in, stored value out.
/// When one is registered for a field it always runs, silently replacing
/// whatever the caller passed.
pub type Mutator = fn(Value) -> Value;

/// Metadata about a persisted entity.
///
/// ```
/// use active_record::{Cast, Schema};
///
/// struct Product;
///
/// impl Schema for Product {
///     fn table() -> &'static str {
///         "products"
///     }
///     fn entity_name() -> &'static str {
///         "product"
///     }
///     fn soft_deletes() -> bool {
///         true
///     }
///     fn fillable() -> &'static [&'static str] {
///         &["name", "price", "images", "active"]
///     }
///     fn casts() -> &'static [(&'static str, Cast)] {
///         &[("price", Cast::Float), ("images", Cast::Json), ("active", Cast::Bool)]
///     }
/// }
/// ```
pub trait Schema: Send + Sync + 'static {
    /// Table (relational) or collection (document) name, without prefix
    fn table() -> &'static str;

    /// Singular entity name, used for foreign-key conventions
    /// (`{entity_name}_id`) and error messages
    fn entity_name() -> &'static str;

    fn primary_key() -> &'static str {
        "id"
    }

    /// Whether saves stamp `created_at`/`updated_at`
    fn uses_timestamps() -> bool {
        true
    }

    /// Whether deletes stamp `deleted_at` instead of removing the row
    fn soft_deletes() -> bool {
        false
    }

    fn deleted_at_column() -> &'static str {
        "deleted_at"
    }

    /// Mass-assignment whitelist. Empty means fall back to
    /// all-but-[`guarded`].
    ///
    /// [`guarded`]: Schema::guarded
    fn fillable() -> &'static [&'static str] {
        &[]
    }

    /// Mass-assignment blacklist, consulted only when [`fillable`] is
    /// empty. Defaults to the conventional primary key column.
    ///
    /// [`fillable`]: Schema::fillable
    fn guarded() -> &'static [&'static str] {
        &["id"]
    }

    /// Field casts applied on hydration (read direction only)
    fn casts() -> &'static [(&'static str, Cast)] {
        &[]
    }

    /// Write transforms, applied on every `set` of the named field
    fn mutators() -> &'static [(&'static str, Mutator)] {
        &[]
    }

    /// Read transforms, applied on every `get` of the named field
    fn accessors() -> &'static [(&'static str, Accessor)] {
        &[]
    }
}

/// Declared attribute casts. Applied after hydration from storage; writes
/// store native values and rely on the backend's own serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cast {
    Int,
    Float,
    Bool,
    String,
    /// Decode a JSON text column back into structured data
    Json,
    /// Normalize to an RFC 3339 string
    DateTime,
}

/// Apply one cast to a stored value. Values that cannot be coerced pass
/// through unchanged; null always stays null.
pub fn apply_cast(cast: Cast, value: Value) -> Value {
    if value.is_null() {
        return value;
    }
    match cast {
        Cast::Int => match &value {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Value::from(i),
                None => n.as_f64().map(|f| Value::from(f as i64)).unwrap_or(value),
            },
            Value::String(s) => s.parse::<i64>().map(Value::from).unwrap_or(value),
            Value::Bool(b) => Value::from(*b as i64),
            _ => value,
        },
        Cast::Float => match &value {
            Value::Number(n) => n.as_f64().map(Value::from).unwrap_or(value),
            Value::String(s) => s.parse::<f64>().map(Value::from).unwrap_or(value),
            _ => value,
        },
        Cast::Bool => match &value {
            Value::Bool(_) => value,
            Value::Number(n) => Value::from(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
            Value::String(s) => match s.as_str() {
                "1" | "t" | "true" | "TRUE" | "True" => Value::from(true),
                "0" | "f" | "false" | "FALSE" | "False" | "" => Value::from(false),
                _ => value,
            },
            _ => value,
        },
        Cast::String => match &value {
            Value::String(_) => value,
            Value::Number(n) => Value::from(n.to_string()),
            Value::Bool(b) => Value::from(b.to_string()),
            _ => value,
        },
        Cast::Json => match &value {
            Value::String(s) => serde_json::from_str(s).unwrap_or(value),
            _ => value,
        },
        Cast::DateTime => match &value {
            Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
                .map(|dt| Value::from(dt.to_rfc3339()))
                .unwrap_or(value),
            Value::Number(n) => n
                .as_i64()
                .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
                .map(|dt| Value::from(dt.to_rfc3339()))
                .unwrap_or(value),
            _ => value,
        },
    }
}

/// Look up the declared cast for a field
pub fn cast_for<S: Schema>(field: &str) -> Option<Cast> {
    S::casts()
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, cast)| *cast)
}

pub(crate) fn mutator_for<S: Schema>(field: &str) -> Option<Mutator> {
    S::mutators()
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, mutator)| *mutator)
}

pub(crate) fn accessor_for<S: Schema>(field: &str) -> Option<Accessor> {
    S::accessors()
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, accessor)| *accessor)
}

/// Mass-assignment check: a non-empty whitelist wins outright, otherwise
/// anything not guarded passes
pub(crate) fn fillable_check<S: Schema>(field: &str) -> bool {
    let fillable = S::fillable();
    if !fillable.is_empty() {
        return fillable.contains(&field);
    }
    !S::guarded().contains(&field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ==================== Cast application ====================

    #[test]
    fn test_int_cast_coerces_strings_and_floats() {
        assert_eq!(apply_cast(Cast::Int, json!("42")), json!(42));
        assert_eq!(apply_cast(Cast::Int, json!(42.9)), json!(42));
        assert_eq!(apply_cast(Cast::Int, json!(7)), json!(7));
        assert_eq!(apply_cast(Cast::Int, json!(true)), json!(1));
        assert_eq!(apply_cast(Cast::Int, json!("not a number")), json!("not a number"));
    }

    #[test]
    fn test_float_cast() {
        assert_eq!(apply_cast(Cast::Float, json!("19.99")), json!(19.99));
        assert_eq!(apply_cast(Cast::Float, json!(5)), json!(5.0));
    }

    #[test]
    fn test_bool_cast_handles_relational_zero_one() {
        assert_eq!(apply_cast(Cast::Bool, json!(1)), json!(true));
        assert_eq!(apply_cast(Cast::Bool, json!(0)), json!(false));
        assert_eq!(apply_cast(Cast::Bool, json!("1")), json!(true));
        assert_eq!(apply_cast(Cast::Bool, json!("false")), json!(false));
        assert_eq!(apply_cast(Cast::Bool, json!(true)), json!(true));
    }

    #[test]
    fn test_json_cast_decodes_stored_text() {
        assert_eq!(
            apply_cast(Cast::Json, json!("[\"a.jpg\",\"b.jpg\"]")),
            json!(["a.jpg", "b.jpg"])
        );
        assert_eq!(
            apply_cast(Cast::Json, json!("{\"w\":100}")),
            json!({"w": 100})
        );
        // Already-structured document values pass through
        assert_eq!(
            apply_cast(Cast::Json, json!(["a.jpg"])),
            json!(["a.jpg"])
        );
        // Broken text stays as-is rather than vanishing
        assert_eq!(apply_cast(Cast::Json, json!("{oops")), json!("{oops"));
    }

    #[test]
    fn test_datetime_cast_normalizes() {
        assert_eq!(
            apply_cast(Cast::DateTime, json!("2024-03-01T10:00:00Z")),
            json!("2024-03-01T10:00:00+00:00")
        );
        assert_eq!(
            apply_cast(Cast::DateTime, json!(0)),
            json!("1970-01-01T00:00:00+00:00")
        );
        assert_eq!(apply_cast(Cast::DateTime, json!("yesterday")), json!("yesterday"));
    }

    #[test]
    fn test_null_passes_every_cast() {
        for cast in [
            Cast::Int,
            Cast::Float,
            Cast::Bool,
            Cast::String,
            Cast::Json,
            Cast::DateTime,
        ] {
            assert_eq!(apply_cast(cast, Value::Null), Value::Null);
        }
    }

    // ==================== Fillable / guarded ====================

    struct Whitelisted;
    impl Schema for Whitelisted {
        fn table() -> &'static str {
            "items"
        }
        fn entity_name() -> &'static str {
            "item"
        }
        fn fillable() -> &'static [&'static str] {
            &["name", "price"]
        }
    }

    struct GuardedOnly;
    impl Schema for GuardedOnly {
        fn table() -> &'static str {
            "items"
        }
        fn entity_name() -> &'static str {
            "item"
        }
        fn guarded() -> &'static [&'static str] {
            &["id", "role"]
        }
    }

    #[test]
    fn test_whitelist_wins_when_declared() {
        assert!(fillable_check::<Whitelisted>("name"));
        assert!(!fillable_check::<Whitelisted>("role"));
        assert!(!fillable_check::<Whitelisted>("id"));
    }

    #[test]
    fn test_guard_list_applies_without_whitelist() {
        assert!(fillable_check::<GuardedOnly>("name"));
        assert!(!fillable_check::<GuardedOnly>("role"));
        assert!(!fillable_check::<GuardedOnly>("id"));
    }
}
