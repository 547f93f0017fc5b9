//! String-safe BSON to JSON conversion for line-delimited exports.
//!
//! Types JSON cannot represent natively are forced to their display-string
//! form instead of failing the export.

use mongodb::bson::{Bson, DateTime, Document};
use serde_json::{Map, Number, Value as JsonValue};

pub fn document_to_json(doc: &Document) -> JsonValue {
    let mut map = Map::new();
    for (key, value) in doc.iter() {
        map.insert(key.clone(), bson_to_json(value));
    }
    JsonValue::Object(map)
}

pub fn bson_to_json(value: &Bson) -> JsonValue {
    match value {
        Bson::String(s) => JsonValue::String(s.clone()),
        Bson::Int32(n) => JsonValue::Number((*n).into()),
        Bson::Int64(n) => JsonValue::Number((*n).into()),
        Bson::Double(f) => Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or_else(|| JsonValue::String(non_finite_to_string(*f))),
        Bson::Boolean(b) => JsonValue::Bool(*b),
        Bson::Null | Bson::Undefined => JsonValue::Null,
        Bson::Array(arr) => JsonValue::Array(arr.iter().map(bson_to_json).collect()),
        Bson::Document(doc) => document_to_json(doc),
        Bson::ObjectId(oid) => JsonValue::String(oid.to_hex()),
        Bson::DateTime(dt) => JsonValue::String(datetime_to_string(dt)),
        Bson::Decimal128(d) => JsonValue::String(d.to_string()),
        Bson::Binary(bin) => JsonValue::String(hex::encode(&bin.bytes)),
        Bson::RegularExpression(regex) => {
            JsonValue::String(format!("/{}/{}", regex.pattern, regex.options))
        }
        Bson::Timestamp(ts) => JsonValue::String(format!("Timestamp({}, {})", ts.time, ts.increment)),
        Bson::JavaScriptCode(code) => JsonValue::String(code.clone()),
        Bson::JavaScriptCodeWithScope(code) => JsonValue::String(code.code.clone()),
        Bson::Symbol(s) => JsonValue::String(s.clone()),
        Bson::MinKey => JsonValue::String("MinKey".to_string()),
        Bson::MaxKey => JsonValue::String("MaxKey".to_string()),
        other => JsonValue::String(other.to_string()),
    }
}

fn datetime_to_string(dt: &DateTime) -> String {
    dt.try_to_rfc3339_string()
        .unwrap_or_else(|_| dt.timestamp_millis().to_string())
}

fn non_finite_to_string(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_sign_positive() {
        "inf".to_string()
    } else {
        "-inf".to_string()
    }
}
