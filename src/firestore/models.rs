use serde_json::{json, Map, Value};

/// A document fetched from Firestore, decoded to plain JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    /// The document ID (last segment of the resource name).
    pub id: String,
    /// The document's fields as plain JSON.
    pub data: Value,
}

/// Wraps plain JSON data in Firestore's typed `fields` envelope.
pub(crate) fn encode_fields(data: &Value) -> Value {
    let mut fields = Map::new();

    if let Value::Object(map) = data {
        for (key, value) in map {
            fields.insert(key.clone(), encode_value(value));
        }
    }

    json!({ "fields": Value::Object(fields) })
}

fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                // Firestore transports integers as strings.
                json!({ "integerValue": i.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64() })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(_) => json!({ "mapValue": encode_fields(value) }),
    }
}

/// Unwraps a Firestore document (its `fields` member) into plain JSON.
pub(crate) fn decode_fields(document: &Value) -> Value {
    let mut data = Map::new();

    if let Some(Value::Object(fields)) = document.get("fields") {
        for (key, value) in fields {
            data.insert(key.clone(), decode_value(value));
        }
    }

    Value::Object(data)
}

fn decode_value(value: &Value) -> Value {
    let Value::Object(map) = value else {
        return Value::Null;
    };

    if let Some((kind, inner)) = map.iter().next() {
        match kind.as_str() {
            "nullValue" => Value::Null,
            "booleanValue" => inner.clone(),
            "integerValue" => inner
                .as_str()
                .and_then(|s| s.parse::<i64>().ok())
                .map(Value::from)
                .unwrap_or_else(|| inner.clone()),
            "doubleValue" => inner.clone(),
            // Timestamps, byte strings and references stay in their wire
            // representation.
            "stringValue" | "timestampValue" | "bytesValue" | "referenceValue" => inner.clone(),
            "arrayValue" => Value::Array(
                inner
                    .get("values")
                    .and_then(Value::as_array)
                    .map(|values| values.iter().map(decode_value).collect())
                    .unwrap_or_default(),
            ),
            "mapValue" => decode_fields(inner),
            "geoPointValue" => inner.clone(),
            _ => Value::Null,
        }
    } else {
        Value::Null
    }
}

/// The document ID: the last segment of a Firestore resource name.
pub(crate) fn document_id(name: &str) -> String {
    name.rsplit('/').next().unwrap_or_default().to_string()
}
