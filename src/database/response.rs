use std::cmp::Ordering;
use std::fmt;

use serde_json::{Map, Value};

use crate::database::query::QuerySpec;

/// The key of one child node: a string for object children, or a synthesized
/// index when the server returned a JSON array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChildKey {
    Name(String),
    Index(usize),
}

impl fmt::Display for ChildKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildKey::Name(name) => f.write_str(name),
            ChildKey::Index(index) => write!(f, "{index}"),
        }
    }
}

/// One child node of a database response.
#[derive(Clone, Debug, PartialEq)]
pub struct FirebaseKeyValue {
    key: ChildKey,
    value: Value,
}

impl FirebaseKeyValue {
    pub fn key(&self) -> &ChildKey {
        &self.key
    }

    pub fn val(&self) -> &Value {
        &self.value
    }
}

#[derive(Clone, Debug, PartialEq)]
enum ResponseBody {
    /// Ordered child nodes, either keyed or index-synthesized.
    Children(Vec<FirebaseKeyValue>),
    /// Keys only, from a shallow query.
    Keys(Vec<String>),
    /// A scalar (or null) returned verbatim.
    Scalar(Value),
}

/// A normalized database response.
///
/// Wraps either an ordered sequence of children or a raw scalar, labelled
/// with the terminal path segment of the query that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct FirebaseResponse {
    body: ResponseBody,
    query_key: String,
}

impl FirebaseResponse {
    /// Materializes the response back into a plain JSON value.
    ///
    /// Children with synthesized indices (the server returned an array)
    /// reconstruct a plain list; keyed children reconstruct an ordered
    /// mapping preserving the normalized order; shallow responses become a
    /// list of key strings; scalars are returned as-is.
    pub fn val(&self) -> Value {
        match &self.body {
            ResponseBody::Scalar(value) => value.clone(),
            ResponseBody::Keys(keys) => Value::Array(
                keys.iter()
                    .map(|key| Value::String(key.clone()))
                    .collect(),
            ),
            ResponseBody::Children(children) => {
                if matches!(children.first().map(FirebaseKeyValue::key), Some(ChildKey::Index(_))) {
                    Value::Array(children.iter().map(|child| child.value.clone()).collect())
                } else {
                    let mut map = Map::new();
                    for child in children {
                        map.insert(child.key.to_string(), child.value.clone());
                    }
                    Value::Object(map)
                }
            }
        }
    }

    /// The terminal path segment of the query ("query key").
    pub fn key(&self) -> &str {
        &self.query_key
    }

    /// The ordered children, when the response has any.
    pub fn each(&self) -> Option<&[FirebaseKeyValue]> {
        match &self.body {
            ResponseBody::Children(children) => Some(children),
            _ => None,
        }
    }

    /// The child at `index` in normalized order.
    pub fn get(&self, index: usize) -> Option<&FirebaseKeyValue> {
        self.each()?.get(index)
    }
}

/// Converts a raw JSON response into a [`FirebaseResponse`], applying the
/// pending query directives.
///
/// Arrays get synthesized integer indices; scalars pass through verbatim;
/// objects keep server order unless the spec asks for a shallow key listing
/// or an `orderBy` sort.
pub(crate) fn normalize(raw: Value, query_key: String, spec: &QuerySpec) -> FirebaseResponse {
    let body = match raw {
        Value::Array(items) => ResponseBody::Children(
            items
                .into_iter()
                .enumerate()
                .map(|(index, value)| FirebaseKeyValue {
                    key: ChildKey::Index(index),
                    value,
                })
                .collect(),
        ),
        Value::Object(map) => {
            if spec.shallow() {
                ResponseBody::Keys(map.keys().cloned().collect())
            } else {
                let mut entries: Vec<(String, Value)> = map.into_iter().collect();

                if let Some(order) = spec.order_by() {
                    sort_entries(&mut entries, order);
                }

                ResponseBody::Children(
                    entries
                        .into_iter()
                        .map(|(key, value)| FirebaseKeyValue {
                            key: ChildKey::Name(key),
                            value,
                        })
                        .collect(),
                )
            }
        }
        scalar => ResponseBody::Scalar(scalar),
    };

    FirebaseResponse { body, query_key }
}

/// Re-sorts an already-normalized response by a child key value.
pub(crate) fn sort_by_child(
    origin: &FirebaseResponse,
    by_key: &str,
    reverse: bool,
) -> FirebaseResponse {
    let mut entries: Vec<(String, Value)> = origin
        .each()
        .unwrap_or_default()
        .iter()
        .map(|child| (child.key.to_string(), child.value.clone()))
        .collect();

    entries.sort_by(|a, b| {
        let ordering = json_cmp(
            a.1.get(by_key).unwrap_or(&Value::Null),
            b.1.get(by_key).unwrap_or(&Value::Null),
        );
        if reverse {
            ordering.reverse()
        } else {
            ordering
        }
    });

    FirebaseResponse {
        body: ResponseBody::Children(
            entries
                .into_iter()
                .map(|(key, value)| FirebaseKeyValue {
                    key: ChildKey::Name(key),
                    value,
                })
                .collect(),
        ),
        query_key: origin.query_key.clone(),
    }
}

fn sort_entries(entries: &mut [(String, Value)], order: &str) {
    match order {
        "$key" => entries.sort_by(|a, b| a.0.cmp(&b.0)),
        "$value" => entries.sort_by(|a, b| json_cmp(&a.1, &b.1)),
        field => entries.sort_by(|a, b| {
            // Entries lacking the field sort before entries possessing it,
            // and compare among themselves by an empty-string default.
            let (a_present, a_value) = field_sort_key(&a.1, field);
            let (b_present, b_value) = field_sort_key(&b.1, field);
            a_present
                .cmp(&b_present)
                .then_with(|| json_cmp(a_value, b_value))
        }),
    }
}

fn field_sort_key<'a>(child: &'a Value, field: &str) -> (bool, &'a Value) {
    static EMPTY: Value = Value::String(String::new());
    match child.get(field) {
        Some(value) => (true, value),
        None => (false, &EMPTY),
    }
}

/// A strict total order over JSON values: by type rank (Null < Bool < Number
/// < String < Array < Object), then by value within a type. Arrays compare
/// element-wise, objects entry-wise in their own key order; this is the
/// documented tie-break for mixed-type `orderBy` data, which the backend
/// leaves unspecified.
pub(crate) fn json_cmp(a: &Value, b: &Value) -> Ordering {
    fn type_rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(a, b)| json_cmp(a, b))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(x), Value::Object(y)) => x
            .iter()
            .zip(y.iter())
            .map(|((ka, va), (kb, vb))| ka.cmp(kb).then_with(|| json_cmp(va, vb)))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec_with(pairs: &[(&'static str, crate::database::query::QueryValue)]) -> QuerySpec {
        let mut spec = QuerySpec::default();
        for (key, value) in pairs {
            spec.set(*key, value.clone());
        }
        spec
    }

    #[test]
    fn array_responses_synthesize_indices_and_materialize_to_a_list() {
        let response = normalize(json!([10, 20, 30]), "scores".into(), &QuerySpec::default());

        assert_eq!(response.val(), json!([10, 20, 30]));
        assert_eq!(response.key(), "scores");
        assert_eq!(response.get(1).unwrap().key(), &ChildKey::Index(1));
        assert_eq!(response.get(1).unwrap().val(), &json!(20));
    }

    #[test]
    fn scalar_responses_pass_through_verbatim() {
        let response = normalize(json!(42), "answer".into(), &QuerySpec::default());

        assert_eq!(response.val(), json!(42));
        assert!(response.each().is_none());

        let null = normalize(Value::Null, "missing".into(), &QuerySpec::default());
        assert_eq!(null.val(), Value::Null);
    }

    #[test]
    fn objects_without_directives_keep_server_order() {
        let response = normalize(
            json!({"b": 1, "a": 2, "c": 3}),
            "items".into(),
            &QuerySpec::default(),
        );

        let keys: Vec<String> = response
            .each()
            .unwrap()
            .iter()
            .map(|child| child.key().to_string())
            .collect();
        assert_eq!(keys, ["b", "a", "c"]);
    }

    #[test]
    fn shallow_yields_keys_only() {
        let spec = spec_with(&[("shallow", true.into())]);
        let response = normalize(json!({"x": {"a": 1}, "y": {"b": 2}}), "".into(), &spec);

        assert_eq!(response.val(), json!(["x", "y"]));
        assert!(response.each().is_none());
    }

    #[test]
    fn order_by_child_field_sorts_ascending() {
        let spec = spec_with(&[("orderBy", "score".into())]);
        let response = normalize(
            json!({"b": {"score": 2}, "a": {"score": 1}}),
            "players".into(),
            &spec,
        );

        assert_eq!(
            response.val(),
            json!({"a": {"score": 1}, "b": {"score": 2}})
        );
    }

    #[test]
    fn order_by_child_groups_absent_fields_first() {
        let spec = spec_with(&[("orderBy", "score".into())]);
        let response = normalize(
            json!({
                "high": {"score": 9},
                "unscored": {"name": "n"},
                "low": {"score": 1}
            }),
            "players".into(),
            &spec,
        );

        let keys: Vec<String> = response
            .each()
            .unwrap()
            .iter()
            .map(|child| child.key().to_string())
            .collect();
        assert_eq!(keys, ["unscored", "low", "high"]);
    }

    #[test]
    fn order_by_key_and_value() {
        let spec = spec_with(&[("orderBy", "$key".into())]);
        let by_key = normalize(json!({"b": 1, "a": 2}), "".into(), &spec);
        assert_eq!(by_key.val(), json!({"a": 2, "b": 1}));

        let spec = spec_with(&[("orderBy", "$value".into())]);
        let by_value = normalize(json!({"a": 2, "b": 1}), "".into(), &spec);
        assert_eq!(by_value.val(), json!({"b": 1, "a": 2}));
    }

    #[test]
    fn json_cmp_orders_mixed_types_by_rank() {
        let mut values = vec![
            json!("text"),
            json!(null),
            json!([1]),
            json!(3),
            json!(true),
            json!({"k": 1}),
        ];
        values.sort_by(json_cmp);

        assert_eq!(
            values,
            vec![
                json!(null),
                json!(true),
                json!(3),
                json!("text"),
                json!([1]),
                json!({"k": 1}),
            ]
        );
    }

    #[test]
    fn sort_by_child_supports_descending_order() {
        let response = normalize(
            json!({"a": {"score": 1}, "b": {"score": 2}}),
            "players".into(),
            &QuerySpec::default(),
        );

        let sorted = sort_by_child(&response, "score", true);
        assert_eq!(
            sorted.val(),
            json!({"b": {"score": 2}, "a": {"score": 1}})
        );
        assert_eq!(sorted.key(), "players");
    }
}
