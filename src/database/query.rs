use std::fmt;

/// A single query-parameter value.
///
/// The Realtime Database REST API types its query parameters as JSON: string
/// values must be sent wrapped in double quotes, booleans as the bare
/// `true`/`false` tokens, and numbers unquoted.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl QueryValue {
    /// Renders the value the way the backend expects it on the wire, before
    /// percent-encoding.
    pub(crate) fn to_parameter(&self) -> String {
        match self {
            QueryValue::String(s) => format!("\"{}\"", s),
            QueryValue::Integer(n) => n.to_string(),
            QueryValue::Float(x) => x.to_string(),
            QueryValue::Bool(b) => if *b { "true" } else { "false" }.to_string(),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::String(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::String(value)
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        QueryValue::Integer(value)
    }
}

impl From<i32> for QueryValue {
    fn from(value: i32) -> Self {
        QueryValue::Integer(value.into())
    }
}

impl From<u32> for QueryValue {
    fn from(value: u32) -> Self {
        QueryValue::Integer(value.into())
    }
}

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        QueryValue::Float(value)
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        QueryValue::Bool(value)
    }
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_parameter())
    }
}

/// The accumulated ordering/filtering/pagination directives for one request.
///
/// Parameters keep their insertion order on the wire; setting a parameter
/// that is already present replaces its value in place (last write wins, no
/// validation of conflicting combinations).
#[derive(Clone, Debug, Default)]
pub struct QuerySpec {
    params: Vec<(&'static str, QueryValue)>,
}

impl QuerySpec {
    pub(crate) fn set(&mut self, key: &'static str, value: QueryValue) {
        if let Some(slot) = self.params.iter_mut().find(|(name, _)| *name == key) {
            slot.1 = value;
        } else {
            self.params.push((key, value));
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&'static str, &QueryValue)> {
        self.params.iter().map(|(name, value)| (*name, value))
    }

    /// The pending `orderBy` directive, if any.
    pub(crate) fn order_by(&self) -> Option<&str> {
        self.params.iter().find_map(|(name, value)| {
            if *name == "orderBy" {
                match value {
                    QueryValue::String(s) => Some(s.as_str()),
                    _ => None,
                }
            } else {
                None
            }
        })
    }

    /// Whether a shallow response was requested.
    pub(crate) fn shallow(&self) -> bool {
        self.params
            .iter()
            .any(|(name, value)| *name == "shallow" && *value == QueryValue::Bool(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_parameters_are_double_quoted() {
        assert_eq!(QueryValue::from("score").to_parameter(), "\"score\"");
    }

    #[test]
    fn bool_and_number_parameters_are_bare_tokens() {
        assert_eq!(QueryValue::from(true).to_parameter(), "true");
        assert_eq!(QueryValue::from(false).to_parameter(), "false");
        assert_eq!(QueryValue::from(5).to_parameter(), "5");
        assert_eq!(QueryValue::from(2.5).to_parameter(), "2.5");
    }

    #[test]
    fn repeated_keys_replace_in_place() {
        let mut spec = QuerySpec::default();
        spec.set("orderBy", "$key".into());
        spec.set("limitToFirst", 5.into());
        spec.set("orderBy", "$value".into());

        let params: Vec<_> = spec.iter().collect();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0], ("orderBy", &QueryValue::from("$value")));
        assert_eq!(params[1], ("limitToFirst", &QueryValue::from(5)));
    }

    #[test]
    fn order_by_and_shallow_accessors() {
        let mut spec = QuerySpec::default();
        assert_eq!(spec.order_by(), None);
        assert!(!spec.shallow());

        spec.set("orderBy", "score".into());
        spec.set("shallow", true.into());
        assert_eq!(spec.order_by(), Some("score"));
        assert!(spec.shallow());
    }
}
