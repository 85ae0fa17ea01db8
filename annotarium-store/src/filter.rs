//! Query filters and find options evaluated over JSON documents

use serde_json::Value;
use std::cmp::Ordering;

/// Predicate tree matched against a document's JSON value.
#[derive(Debug, Clone)]
pub enum Filter {
    All,
    /// Field (dotted path) equals value
    Eq(String, Value),
    /// Field not equal to value (missing fields match)
    Ne(String, Value),
    /// Field value is one of the given values
    In(String, Vec<Value>),
    /// Array field contains the given value
    Contains(String, Value),
    /// Field is present and non-null
    Exists(String),
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(field.to_string(), value.into())
    }

    pub fn ne(field: &str, value: impl Into<Value>) -> Self {
        Filter::Ne(field.to_string(), value.into())
    }

    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(path, value) => lookup(doc, path) == Some(value),
            Filter::Ne(path, value) => lookup(doc, path) != Some(value),
            Filter::In(path, values) => {
                lookup(doc, path).is_some_and(|v| values.iter().any(|w| w == v))
            }
            Filter::Contains(path, value) => lookup(doc, path)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
            Filter::Exists(path) => lookup(doc, path).is_some_and(|v| !v.is_null()),
            Filter::And(filters) => filters.iter().all(|f| f.matches(doc)),
        }
    }
}

/// Resolve a dotted path inside a JSON document.
pub fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

/// Pagination and sorting applied after filtering.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub sort_by: Option<String>,
    pub descending: bool,
    pub skip: usize,
    pub limit: Option<usize>,
}

impl FindOptions {
    pub fn sorted_by(field: &str, descending: bool) -> Self {
        Self {
            sort_by: Some(field.to_string()),
            descending,
            ..Default::default()
        }
    }

    pub fn page(skip: usize, limit: usize) -> Self {
        Self {
            skip,
            limit: Some(limit),
            ..Default::default()
        }
    }
}

/// Total order over JSON values for sorting: nulls, then numbers, then
/// strings, then everything else by serialized form.
pub fn value_cmp(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .unwrap_or(f64::NAN)
            .partial_cmp(&y.as_f64().unwrap_or(f64::NAN))
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "annotation_id": "abc",
            "taxid": 9606,
            "source_file_info": { "url_path": "https://x/a.gff.gz" },
            "mapped_regions": ["1", "2"],
        })
    }

    #[test]
    fn test_eq_on_nested_path() {
        let filter = Filter::eq("source_file_info.url_path", "https://x/a.gff.gz");
        assert!(filter.matches(&doc()));
        assert!(!Filter::eq("source_file_info.url_path", "other").matches(&doc()));
    }

    #[test]
    fn test_in_and_exists() {
        assert!(Filter::In("taxid".into(), vec![json!(9606), json!(10090)]).matches(&doc()));
        assert!(Filter::Exists("mapped_regions".into()).matches(&doc()));
        assert!(!Filter::Exists("missing".into()).matches(&doc()));
    }

    #[test]
    fn test_and() {
        let filter = Filter::And(vec![
            Filter::eq("annotation_id", "abc"),
            Filter::eq("taxid", 9606),
        ]);
        assert!(filter.matches(&doc()));
    }

    #[test]
    fn test_contains() {
        assert!(Filter::Contains("mapped_regions".into(), json!("1")).matches(&doc()));
        assert!(!Filter::Contains("mapped_regions".into(), json!("MT")).matches(&doc()));
        assert!(!Filter::Contains("annotation_id".into(), json!("abc")).matches(&doc()));
    }

    #[test]
    fn test_ne_matches_missing() {
        assert!(Filter::ne("missing_field", "x").matches(&doc()));
        assert!(!Filter::ne("annotation_id", "abc").matches(&doc()));
    }

    #[test]
    fn test_value_ordering() {
        assert_eq!(value_cmp(&json!(1), &json!(2)), Ordering::Less);
        assert_eq!(value_cmp(&json!("a"), &json!("b")), Ordering::Less);
        assert_eq!(value_cmp(&Value::Null, &json!(0)), Ordering::Less);
    }
}
