//! Query clause evaluation for in-memory document filtering and ordering.

use bson::{Bson, Document, datetime::DateTime};
use std::{cmp::Ordering, collections::HashMap};

use docmodel_core::{
    error::DocumentStoreError,
    query::{Clause, FieldOp, QueryVisitor},
};

/// Comparable view of a BSON value. Integers and floats compare as numbers.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(items) => Comparable::Array(
                items
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>(),
            ),
            Bson::Document(document) => Comparable::Map(
                document
                    .iter()
                    .map(|(key, value)| (key.as_str(), Comparable::from(value)))
                    .collect::<HashMap<_, _>>(),
            ),
            _ => Comparable::Null,
        }
    }
}

impl Comparable<'_> {
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Bool(_) => 1,
            Comparable::Number(_) => 2,
            Comparable::DateTime(_) => 3,
            Comparable::String(_) => 4,
            Comparable::Array(_) => 5,
            Comparable::Map(_) => 6,
        }
    }

    /// Total order used for sorting: values of different kinds order by kind.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Comparable::Array(left), Comparable::Array(right)) => left
                .iter()
                .zip(right)
                .map(|(left, right)| left.sort_cmp(right))
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| left.len().cmp(&right.len())),
            _ => self
                .partial_cmp(other)
                .unwrap_or_else(|| self.rank().cmp(&other.rank())),
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a dotted column path (`meta.address.city`) inside a document.
pub(crate) fn lookup<'d>(document: &'d Document, path: &str) -> Option<&'d Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Whether the document satisfies every clause.
    pub fn matches(document: &'a Document, clauses: &[Clause]) -> bool {
        DocumentEvaluator::new(document)
            .visit_and(clauses)
            .unwrap_or(false)
    }
}

impl QueryVisitor for DocumentEvaluator<'_> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, clauses: &[Clause]) -> Result<Self::Output, Self::Error> {
        for clause in clauses {
            if !self.visit(clause)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_clause(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error> {
        let Some(field_value) = lookup(self.document, field) else {
            return Ok(false);
        };
        let left = Comparable::from(field_value);
        let right = Comparable::from(value);

        Ok(match op {
            FieldOp::Eq => left == right,
            FieldOp::Lt => left.partial_cmp(&right) == Some(Ordering::Less),
            FieldOp::Lte => matches!(
                left.partial_cmp(&right),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FieldOp::Gt => left.partial_cmp(&right) == Some(Ordering::Greater),
            FieldOp::Gte => matches!(
                left.partial_cmp(&right),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FieldOp::ArrayContains => match left {
                Comparable::Array(items) => items.iter().any(|item| item == &right),
                _ => false,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docmodel_core::query::Filter;

    fn sample() -> Document {
        doc! {
            "age": 31_i64,
            "score": 4.5,
            "tags": ["red", "blue"],
            "meta": { "address": { "city": "Oslo" } },
        }
    }

    #[test]
    fn comparisons_normalize_numbers() {
        let document = sample();

        assert!(DocumentEvaluator::matches(&document, &[Filter::eq("age", 31)]));
        assert!(DocumentEvaluator::matches(&document, &[Filter::gt("score", 4)]));
        assert!(DocumentEvaluator::matches(&document, &[Filter::lte("age", 31.0)]));
        assert!(!DocumentEvaluator::matches(&document, &[Filter::lt("age", 31)]));
        assert!(!DocumentEvaluator::matches(&document, &[Filter::gt("age", "30")]));
    }

    #[test]
    fn clauses_are_conjunctive() {
        let document = sample();

        assert!(DocumentEvaluator::matches(
            &document,
            &[Filter::gte("age", 18), Filter::array_contains("tags", "blue")]
        ));
        assert!(!DocumentEvaluator::matches(
            &document,
            &[Filter::gte("age", 18), Filter::array_contains("tags", "green")]
        ));
    }

    #[test]
    fn dotted_paths_reach_nested_maps() {
        let document = sample();

        assert_eq!(
            lookup(&document, "meta.address.city"),
            Some(&Bson::String("Oslo".into()))
        );
        assert_eq!(lookup(&document, "meta.address.zip"), None);
        assert_eq!(lookup(&document, "age.value"), None);
        assert!(DocumentEvaluator::matches(
            &document,
            &[Filter::eq("meta.address.city", "Oslo")]
        ));
    }

    #[test]
    fn missing_fields_never_match() {
        let document = sample();

        assert!(!DocumentEvaluator::matches(&document, &[Filter::eq("nickname", Bson::Null)]));
        assert!(!DocumentEvaluator::matches(&document, &[Filter::array_contains("age", 31)]));
    }

    #[test]
    fn sort_order_ranks_kinds() {
        let null = Bson::Null;
        let number = Bson::Int64(3);
        let text = Bson::String("a".into());

        assert_eq!(Comparable::from(&null).sort_cmp(&Comparable::from(&number)), Ordering::Less);
        assert_eq!(Comparable::from(&text).sort_cmp(&Comparable::from(&number)), Ordering::Greater);
        assert_eq!(Comparable::from(&number).sort_cmp(&Comparable::from(&number)), Ordering::Equal);
    }
}
