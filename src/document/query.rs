//! Document queries
//!
//! [`Query`] is immutable: each `where_*` method returns a new query with one more
//! predicate, and all predicates are ANDed. Evaluation follows document-database
//! semantics: a document lacking the field never matches, and range comparisons only
//! match values of the same type.

use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Comparison applied by a single field predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldOperator {
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
    /// Array field contains the value
    ArrayContains,
    /// Array field contains any of the values
    ArrayContainsAny,
    /// Field equals one of the values
    In,
    /// Field equals none of the values
    NotIn,
}

/// One predicate of a [`Query`]
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    /// Field path; dots address nested maps (`"address.city"`)
    pub field: String,
    /// Comparison
    pub op: FieldOperator,
    /// Operand; an array for the membership operators
    pub value: Value,
}

/// Filtered read of one collection
///
/// # Example
/// ```
/// use firebase_facade::document::Query;
/// use serde_json::json;
///
/// let query = Query::new("cities")
///     .where_equal_to("country", json!("BR"))
///     .where_greater_than("population", json!(1_000_000));
///
/// assert!(query.matches(json!({ "country": "BR", "population": 12_000_000 }).as_object().unwrap()));
/// assert!(!query.matches(json!({ "country": "BR" }).as_object().unwrap()));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    collection: String,
    filters: Vec<FieldFilter>,
}

impl Query {
    /// Unfiltered query over `collection`
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
        }
    }

    /// Collection the query reads
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Predicates in the order they were added
    pub fn filters(&self) -> &[FieldFilter] {
        &self.filters
    }

    fn with_filter(mut self, field: impl Into<String>, op: FieldOperator, value: Value) -> Self {
        self.filters.push(FieldFilter {
            field: field.into(),
            op,
            value,
        });
        self
    }

    /// Filter documents where field equals value
    pub fn where_equal_to(self, field: impl Into<String>, value: Value) -> Self {
        self.with_filter(field, FieldOperator::Equal, value)
    }

    /// Filter documents where field exists and does not equal value
    pub fn where_not_equal_to(self, field: impl Into<String>, value: Value) -> Self {
        self.with_filter(field, FieldOperator::NotEqual, value)
    }

    /// Filter documents where field is less than value
    pub fn where_less_than(self, field: impl Into<String>, value: Value) -> Self {
        self.with_filter(field, FieldOperator::LessThan, value)
    }

    /// Filter documents where field is less than or equal to value
    pub fn where_less_than_or_equal_to(self, field: impl Into<String>, value: Value) -> Self {
        self.with_filter(field, FieldOperator::LessThanOrEqual, value)
    }

    /// Filter documents where field is greater than value
    pub fn where_greater_than(self, field: impl Into<String>, value: Value) -> Self {
        self.with_filter(field, FieldOperator::GreaterThan, value)
    }

    /// Filter documents where field is greater than or equal to value
    pub fn where_greater_than_or_equal_to(self, field: impl Into<String>, value: Value) -> Self {
        self.with_filter(field, FieldOperator::GreaterThanOrEqual, value)
    }

    /// Filter documents where the array field contains value
    pub fn where_array_contains(self, field: impl Into<String>, value: Value) -> Self {
        self.with_filter(field, FieldOperator::ArrayContains, value)
    }

    /// Filter documents where the array field contains any of the values
    pub fn where_array_contains_any(self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.with_filter(field, FieldOperator::ArrayContainsAny, Value::Array(values))
    }

    /// Filter documents where field equals any of the values
    pub fn where_in(self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.with_filter(field, FieldOperator::In, Value::Array(values))
    }

    /// Filter documents where field exists and equals none of the values
    pub fn where_not_in(self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.with_filter(field, FieldOperator::NotIn, Value::Array(values))
    }

    /// Check whether a document's fields satisfy every predicate
    pub fn matches(&self, document: &Map<String, Value>) -> bool {
        self.filters.iter().all(|filter| filter.matches(document))
    }
}

impl FieldFilter {
    fn matches(&self, document: &Map<String, Value>) -> bool {
        let Some(actual) = field_at(document, &self.field) else {
            return false;
        };
        let operands = || self.value.as_array().map(Vec::as_slice).unwrap_or_default();

        match self.op {
            FieldOperator::Equal => values_equal(actual, &self.value),
            FieldOperator::NotEqual => !values_equal(actual, &self.value),
            FieldOperator::LessThan => compare(actual, &self.value) == Some(Ordering::Less),
            FieldOperator::LessThanOrEqual => matches!(
                compare(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FieldOperator::GreaterThan => compare(actual, &self.value) == Some(Ordering::Greater),
            FieldOperator::GreaterThanOrEqual => matches!(
                compare(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FieldOperator::ArrayContains => actual
                .as_array()
                .is_some_and(|items| items.iter().any(|item| values_equal(item, &self.value))),
            FieldOperator::ArrayContainsAny => actual.as_array().is_some_and(|items| {
                items
                    .iter()
                    .any(|item| operands().iter().any(|v| values_equal(item, v)))
            }),
            FieldOperator::In => operands().iter().any(|v| values_equal(actual, v)),
            FieldOperator::NotIn => !operands().iter().any(|v| values_equal(actual, v)),
        }
    }
}

/// Resolve a dotted field path
pub(crate) fn field_at<'a>(document: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = document.get(segments.next()?)?;
    segments.try_fold(first, |node, key| node.as_object()?.get(key))
}

/// Equality with integers and floats compared numerically
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        _ => a == b,
    }
}

/// Ordering between values of the same type; `None` across types
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_empty_query_matches_everything() {
        assert!(Query::new("c").matches(&doc(json!({}))));
    }

    #[test]
    fn test_missing_field_never_matches() {
        let query = Query::new("c").where_not_equal_to("age", json!(3));
        assert!(!query.matches(&doc(json!({ "name": "x" }))));
        assert!(query.matches(&doc(json!({ "age": 4 }))));
    }

    #[test]
    fn test_range_is_type_strict() {
        let query = Query::new("c").where_greater_than("age", json!(18));
        assert!(query.matches(&doc(json!({ "age": 21.5 }))));
        assert!(!query.matches(&doc(json!({ "age": "99" }))));
    }

    #[test]
    fn test_integer_and_float_are_equal() {
        let query = Query::new("c").where_equal_to("n", json!(1));
        assert!(query.matches(&doc(json!({ "n": 1.0 }))));
    }

    #[test]
    fn test_membership_operators() {
        let tags = doc(json!({ "tags": ["a", "b"], "status": "open" }));

        assert!(Query::new("c").where_array_contains("tags", json!("b")).matches(&tags));
        assert!(Query::new("c")
            .where_array_contains_any("tags", vec![json!("z"), json!("a")])
            .matches(&tags));
        assert!(Query::new("c")
            .where_in("status", vec![json!("open"), json!("closed")])
            .matches(&tags));
        assert!(!Query::new("c")
            .where_not_in("status", vec![json!("open")])
            .matches(&tags));
    }

    #[test]
    fn test_dotted_field_path() {
        let query = Query::new("c").where_equal_to("address.city", json!("Recife"));
        assert!(query.matches(&doc(json!({ "address": { "city": "Recife" } }))));
        assert!(!query.matches(&doc(json!({ "address": "Recife" }))));
    }

    #[test]
    fn test_filters_are_anded() {
        let query = Query::new("c")
            .where_greater_than_or_equal_to("age", json!(18))
            .where_less_than("age", json!(65));
        assert!(query.matches(&doc(json!({ "age": 18 }))));
        assert!(!query.matches(&doc(json!({ "age": 65 }))));
        assert_eq!(query.filters().len(), 2);
    }
}
