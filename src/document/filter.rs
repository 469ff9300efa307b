//! Provider-agnostic filters
//!
//! A [`Filter`] is a `(field, operator, value)` triple. [`build_query`] turns an ordered
//! list of filters into a native [`Query`] equal to the AND of all of them.

use crate::document::query::Query;
use serde_json::Value;

/// Comparison operators available to [`Filter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Field equals value
    Equal,
    /// Field exists and differs from value
    NotEqual,
    /// Field is greater than value
    GreaterThan,
    /// Field is greater than or equal to value
    GreaterThanOrEqual,
    /// Field is less than value
    LessThan,
    /// Field is less than or equal to value
    LessThanOrEqual,
    /// Array field contains value
    ArrayContains,
    /// Array field contains any value of the list
    ArrayContainsAny,
    /// Field equals any value of the list
    In,
    /// Field equals no value of the list
    NotIn,
}

impl Operator {
    /// Whether the operator takes a list operand
    pub fn takes_list(self) -> bool {
        matches!(self, Self::ArrayContainsAny | Self::In | Self::NotIn)
    }
}

/// Operand of a [`Filter`]
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// A single value
    Scalar(Value),
    /// A list of values, for membership operators
    List(Vec<Value>),
}

impl FilterValue {
    fn into_scalar(self) -> Value {
        match self {
            Self::Scalar(value) => value,
            Self::List(values) => Value::Array(values),
        }
    }

    fn into_list(self) -> Vec<Value> {
        match self {
            Self::Scalar(value) => vec![value],
            Self::List(values) => values,
        }
    }
}

impl From<Value> for FilterValue {
    fn from(value: Value) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<Value>> for FilterValue {
    fn from(values: Vec<Value>) -> Self {
        Self::List(values)
    }
}

/// One predicate on a document field
///
/// # Example
/// ```
/// use firebase_facade::document::{Filter, Operator};
/// use serde_json::json;
///
/// let adults = Filter::greater_than_or_equal_to("age", 18);
/// let in_brazil = Filter::is_in("country", ["BR", "PT"]);
/// assert_eq!(in_brazil.operator(), Operator::In);
/// # let _ = adults;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    field: String,
    operator: Operator,
    value: FilterValue,
}

impl Filter {
    /// Build a filter from its parts
    ///
    /// # Panics
    /// If `value` is a list for a scalar operator, or a scalar for a list operator
    /// ([`Operator::takes_list`]). Such a filter is a programming error.
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<FilterValue>) -> Self {
        let value = value.into();
        let is_list = matches!(value, FilterValue::List(_));
        assert!(
            is_list == operator.takes_list(),
            "{operator:?} requires a {} operand",
            if operator.takes_list() { "list" } else { "scalar" }
        );
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    fn scalar(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self::new(field, operator, FilterValue::Scalar(value.into()))
    }

    fn list<V: Into<Value>>(
        field: impl Into<String>,
        operator: Operator,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::new(
            field,
            operator,
            FilterValue::List(values.into_iter().map(Into::into).collect()),
        )
    }

    /// `field == value`
    pub fn equal_to(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::scalar(field, Operator::Equal, value)
    }

    /// `field != value`
    pub fn not_equal_to(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::scalar(field, Operator::NotEqual, value)
    }

    /// `field > value`
    pub fn greater_than(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::scalar(field, Operator::GreaterThan, value)
    }

    /// `field >= value`
    pub fn greater_than_or_equal_to(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::scalar(field, Operator::GreaterThanOrEqual, value)
    }

    /// `field < value`
    pub fn less_than(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::scalar(field, Operator::LessThan, value)
    }

    /// `field <= value`
    pub fn less_than_or_equal_to(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::scalar(field, Operator::LessThanOrEqual, value)
    }

    /// Array `field` contains `value`
    pub fn array_contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::scalar(field, Operator::ArrayContains, value)
    }

    /// Array `field` contains any of `values`
    pub fn array_contains_any<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::list(field, Operator::ArrayContainsAny, values)
    }

    /// `field` is one of `values`
    pub fn is_in<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::list(field, Operator::In, values)
    }

    /// `field` is none of `values`
    pub fn not_in<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::list(field, Operator::NotIn, values)
    }

    /// Field path
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Operator
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Operand
    pub fn value(&self) -> &FilterValue {
        &self.value
    }

    fn apply(&self, query: Query) -> Query {
        let field = self.field.clone();
        let value = self.value.clone();
        match self.operator {
            Operator::Equal => query.where_equal_to(field, value.into_scalar()),
            Operator::NotEqual => query.where_not_equal_to(field, value.into_scalar()),
            Operator::GreaterThan => query.where_greater_than(field, value.into_scalar()),
            Operator::GreaterThanOrEqual => {
                query.where_greater_than_or_equal_to(field, value.into_scalar())
            }
            Operator::LessThan => query.where_less_than(field, value.into_scalar()),
            Operator::LessThanOrEqual => {
                query.where_less_than_or_equal_to(field, value.into_scalar())
            }
            Operator::ArrayContains => query.where_array_contains(field, value.into_scalar()),
            Operator::ArrayContainsAny => query.where_array_contains_any(field, value.into_list()),
            Operator::In => query.where_in(field, value.into_list()),
            Operator::NotIn => query.where_not_in(field, value.into_list()),
        }
    }
}

/// Compose `filters`, in order, onto an unfiltered query over `collection`
pub fn build_query(collection: &str, filters: &[Filter]) -> Query {
    filters
        .iter()
        .fold(Query::new(collection), |query, filter| filter.apply(query))
}
