//! Bridging between `serde_json::Value` attributes and BSON documents.
//!
//! Conversion is written out by hand so the mapping stays explicit: strings
//! stay strings (timestamps travel as RFC 3339 text in both directions),
//! object ids render as hex strings, and BSON types this layer never writes
//! (binary, timestamps, min/max keys) read back as null.

use bson::{Bson, Document};
use serde_json::{Map, Value};

/// A document decoded to plain attribute data
pub type DocumentMap = Map<String, Value>;

pub fn value_to_bson(value: Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if i >= i32::MIN as i64 && i <= i32::MAX as i64 {
                    Bson::Int32(i as i32)
                } else {
                    Bson::Int64(i)
                }
            } else {
                Bson::Double(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => Bson::String(s),
        Value::Array(items) => Bson::Array(items.into_iter().map(value_to_bson).collect()),
        Value::Object(map) => Bson::Document(map_to_document(map)),
    }
}

pub fn bson_to_value(bson: Bson) -> Value {
    match bson {
        Bson::Null => Value::Null,
        Bson::Boolean(b) => Value::Bool(b),
        Bson::Int32(i) => Value::from(i),
        Bson::Int64(i) => Value::from(i),
        Bson::Double(f) => Value::from(f),
        Bson::String(s) => Value::String(s),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_value).collect()),
        Bson::Document(doc) => Value::Object(document_to_map(doc)),
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => match chrono::DateTime::from_timestamp_millis(dt.timestamp_millis())
        {
            Some(utc) => Value::String(utc.to_rfc3339()),
            None => Value::Null,
        },
        Bson::RegularExpression(re) => Value::String(re.pattern.to_string()),
        _ => Value::Null,
    }
}

pub fn map_to_document(map: DocumentMap) -> Document {
    let mut doc = Document::new();
    for (key, value) in map {
        doc.insert(key, value_to_bson(value));
    }
    doc
}

pub fn document_to_map(doc: Document) -> DocumentMap {
    let mut map = Map::new();
    for (key, value) in doc {
        map.insert(key, bson_to_value(value));
    }
    map
}

/// Current time in the string form this layer stamps on documents
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
