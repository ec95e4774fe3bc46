//! Query conditions and their evaluation
//!
//! Conditions AND together. Ordering applies to the first condition's
//! field only.

use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;

use super::{Fields, StoredDocument, MAX_BATCH_SIZE};
use crate::error::{StoreError, StoreResult};

/// Comparison applied by a [`Condition`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Equal,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    NotEqual,
    ArrayContains,
    In,
    NotIn,
    ArrayContainsAny,
}

impl Comparator {
    /// Whether the compared value must be an array
    pub fn requires_array(&self) -> bool {
        matches!(
            self,
            Comparator::In | Comparator::NotIn | Comparator::ArrayContainsAny
        )
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Comparator::Equal => "==",
            Comparator::LessThan => "<",
            Comparator::LessThanOrEqual => "<=",
            Comparator::GreaterThan => ">",
            Comparator::GreaterThanOrEqual => ">=",
            Comparator::NotEqual => "!=",
            Comparator::ArrayContains => "array-contains",
            Comparator::In => "in",
            Comparator::NotIn => "not-in",
            Comparator::ArrayContainsAny => "array-contains-any",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One `(field, comparator, value)` filter
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Remote field name; dots address nested fields
    pub field: String,
    pub comparator: Comparator,
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, comparator: Comparator, value: Value) -> Self {
        Self {
            field: field.into(),
            comparator,
            value,
        }
    }

    /// Check the value shape the comparator needs
    pub fn validate(&self) -> StoreResult<()> {
        if !self.comparator.requires_array() {
            return Ok(());
        }
        match &self.value {
            Value::Array(items) if items.len() <= MAX_BATCH_SIZE => Ok(()),
            Value::Array(items) => Err(StoreError::InvalidArgument(format!(
                "'{}' accepts at most {} values, got {}",
                self.comparator,
                MAX_BATCH_SIZE,
                items.len()
            ))),
            _ => Err(StoreError::InvalidArgument(format!(
                "'{}' on '{}' requires an array value",
                self.comparator, self.field
            ))),
        }
    }

    /// Evaluate against a document's fields
    pub fn matches(&self, fields: &Fields) -> bool {
        let Some(actual) = lookup(fields, &self.field) else {
            return false;
        };

        match self.comparator {
            Comparator::Equal => same(actual, &self.value),
            Comparator::NotEqual => !same(actual, &self.value),
            Comparator::LessThan => compare(actual, &self.value) == Some(Ordering::Less),
            Comparator::LessThanOrEqual => matches!(
                compare(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Comparator::GreaterThan => compare(actual, &self.value) == Some(Ordering::Greater),
            Comparator::GreaterThanOrEqual => matches!(
                compare(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Comparator::ArrayContains => match actual {
                Value::Array(items) => items.iter().any(|item| same(item, &self.value)),
                _ => false,
            },
            Comparator::In => candidates(&self.value).any(|v| same(actual, v)),
            Comparator::NotIn => !candidates(&self.value).any(|v| same(actual, v)),
            Comparator::ArrayContainsAny => match actual {
                Value::Array(items) => items
                    .iter()
                    .any(|item| candidates(&self.value).any(|v| same(item, v))),
                _ => false,
            },
        }
    }
}

/// Sort direction for the first condition's field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Ascending,
    Descending,
}

/// A filtered, optionally ordered and limited collection read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub conditions: Vec<Condition>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    /// Run the query over an in-memory set of documents
    pub fn apply<I>(&self, documents: I) -> StoreResult<Vec<StoredDocument>>
    where
        I: IntoIterator<Item = StoredDocument>,
    {
        for condition in &self.conditions {
            condition.validate()?;
        }

        let mut results: Vec<StoredDocument> = documents
            .into_iter()
            .filter(|doc| self.conditions.iter().all(|c| c.matches(&doc.fields)))
            .collect();

        if let (Some(order), Some(first)) = (self.order, self.conditions.first()) {
            results.sort_by(|a, b| {
                let ordering = match (lookup(&a.fields, &first.field), lookup(&b.fields, &first.field)) {
                    (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
                    _ => Ordering::Equal,
                };
                match order {
                    Order::Ascending => ordering,
                    Order::Descending => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = self.limit {
            results.truncate(limit);
        }

        Ok(results)
    }
}

fn lookup<'a>(fields: &'a Fields, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = fields.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn candidates(value: &Value) -> impl Iterator<Item = &Value> {
    value.as_array().into_iter().flatten()
}

fn same(a: &Value, b: &Value) -> bool {
    compare(a, b) == Some(Ordering::Equal)
}

/// Order two JSON values of the same kind; numbers compare numerically
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ if a == b => Some(Ordering::Equal),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, value: Value) -> StoredDocument {
        let Value::Object(fields) = value else {
            panic!("fixture must be an object");
        };
        StoredDocument {
            id: id.to_string(),
            fields,
            version: 1,
        }
    }

    fn fixtures() -> Vec<StoredDocument> {
        vec![
            doc("a", json!({"title": "Alpha", "likes": 3, "tags": ["rust"], "meta": {"lang": "en"}})),
            doc("b", json!({"title": "Beta", "likes": 10, "tags": ["go", "rust"]})),
            doc("c", json!({"title": "Gamma", "likes": 1.5, "tags": []})),
        ]
    }

    fn ids(docs: &[StoredDocument]) -> Vec<&str> {
        docs.iter().map(|d| d.id.as_str()).collect()
    }

    #[test]
    fn test_equality_and_ranges() {
        let query = Query {
            conditions: vec![Condition::new("likes", Comparator::GreaterThanOrEqual, json!(3))],
            ..Query::default()
        };
        assert_eq!(ids(&query.apply(fixtures()).unwrap()), vec!["a", "b"]);

        let query = Query {
            conditions: vec![Condition::new("title", Comparator::Equal, json!("Beta"))],
            ..Query::default()
        };
        assert_eq!(ids(&query.apply(fixtures()).unwrap()), vec!["b"]);
    }

    #[test]
    fn test_integer_and_float_compare_numerically() {
        let query = Query {
            conditions: vec![Condition::new("likes", Comparator::LessThan, json!(2))],
            ..Query::default()
        };
        assert_eq!(ids(&query.apply(fixtures()).unwrap()), vec!["c"]);
    }

    #[test]
    fn test_array_comparators() {
        let contains = Condition::new("tags", Comparator::ArrayContains, json!("rust"));
        let any = Condition::new("tags", Comparator::ArrayContainsAny, json!(["go", "zig"]));
        let within = Condition::new("title", Comparator::In, json!(["Alpha", "Gamma"]));
        let outside = Condition::new("title", Comparator::NotIn, json!(["Alpha", "Gamma"]));

        let run = |c: Condition| {
            let query = Query {
                conditions: vec![c],
                ..Query::default()
            };
            ids(&query.apply(fixtures()).unwrap())
                .into_iter()
                .map(str::to_string)
                .collect::<Vec<_>>()
        };

        assert_eq!(run(contains), vec!["a", "b"]);
        assert_eq!(run(any), vec!["b"]);
        assert_eq!(run(within), vec!["a", "c"]);
        assert_eq!(run(outside), vec!["b"]);
    }

    #[test]
    fn test_missing_field_never_matches() {
        let query = Query {
            conditions: vec![Condition::new("meta.lang", Comparator::NotEqual, json!("fr"))],
            ..Query::default()
        };
        assert_eq!(ids(&query.apply(fixtures()).unwrap()), vec!["a"]);
    }

    #[test]
    fn test_order_and_limit_use_first_condition() {
        let query = Query {
            conditions: vec![
                Condition::new("likes", Comparator::GreaterThan, json!(0)),
                Condition::new("title", Comparator::NotEqual, json!("Beta")),
            ],
            order: Some(Order::Descending),
            limit: Some(1),
        };
        assert_eq!(ids(&query.apply(fixtures()).unwrap()), vec!["a"]);

        let query = Query {
            order: Some(Order::Ascending),
            limit: None,
            ..query
        };
        assert_eq!(ids(&query.apply(fixtures()).unwrap()), vec!["c", "a"]);
    }

    #[test]
    fn test_array_comparator_requires_array_value() {
        let query = Query {
            conditions: vec![Condition::new("title", Comparator::In, json!("Alpha"))],
            ..Query::default()
        };
        let err = query.apply(fixtures()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[test]
    fn test_in_rejects_oversized_lists() {
        let values: Vec<u32> = (0..11).collect();
        let condition = Condition::new("likes", Comparator::In, json!(values));
        assert!(condition.validate().is_err());
    }
}
