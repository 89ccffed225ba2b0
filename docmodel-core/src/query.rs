//! Backend query representation.
//!
//! A [`Query`] is the materialized form of a query set: a conjunction of [`Clause`]s on stored
//! column paths, an ordered list of sorts, an optional limit and an optional `start_after`
//! cursor. Backends translate it through [`QueryVisitor`].
//!
//! ```ignore
//! use docmodel::query::{Filter, Query, SortDirection};
//!
//! let query = Query::builder()
//!     .filter(Filter::gt("age", 18))
//!     .filter(Filter::array_contains("tags", "admin"))
//!     .sort("age", SortDirection::Desc)
//!     .limit(10)
//!     .build();
//! ```

use bson::Bson;
use std::fmt::{self, Display};

use crate::error::DocumentStoreError;

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

/// One ordering key: a stored column path and a direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

/// Comparison operators accepted by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldOp {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    /// The stored array holds the value.
    ArrayContains,
}

impl FieldOp {
    /// The backend operator symbol.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldOp::Lt => "<",
            FieldOp::Lte => "<=",
            FieldOp::Gt => ">",
            FieldOp::Gte => ">=",
            FieldOp::Eq => "==",
            FieldOp::ArrayContains => "array_contains",
        }
    }

    /// Maps the trailing token of a filter key (`age__gte`) to an operator.
    pub fn from_lookup(token: &str) -> Option<Self> {
        match token {
            "lt" => Some(FieldOp::Lt),
            "lte" => Some(FieldOp::Lte),
            "gt" => Some(FieldOp::Gt),
            "gte" => Some(FieldOp::Gte),
            "eq" => Some(FieldOp::Eq),
            "contains" => Some(FieldOp::ArrayContains),
            _ => None,
        }
    }
}

impl Display for FieldOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One backend filter: `(field, op, value)` with `field` a dotted column path.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub field: String,
    pub op: FieldOp,
    pub value: Bson,
}

impl Clause {
    pub fn new(field: impl Into<String>, op: FieldOp, value: impl Into<Bson>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// The clause as the backend sees it, e.g. `("age", ">", 5)`.
    pub fn as_tuple(&self) -> (&str, &'static str, &Bson) {
        (&self.field, self.op.as_str(), &self.value)
    }
}

/// Constructors for single clauses.
pub struct Filter;

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Clause {
        Clause::new(field, FieldOp::Eq, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Clause {
        Clause::new(field, FieldOp::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Clause {
        Clause::new(field, FieldOp::Lte, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Clause {
        Clause::new(field, FieldOp::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Clause {
        Clause::new(field, FieldOp::Gte, value)
    }

    /// Matches documents whose array at `field` holds `value`.
    pub fn array_contains(field: impl Into<String>, value: impl Into<Bson>) -> Clause {
        Clause::new(field, FieldOp::ArrayContains, value)
    }
}

/// A structured query against one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Clauses that must all match.
    pub filters: Vec<Clause>,
    /// Sorts applied in order; later entries break ties of earlier ones.
    pub sorts: Vec<Sort>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
    /// Only return documents ordered after the document with this identifier.
    pub start_after: Option<String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }

    /// Whether the query selects the whole collection.
    pub fn is_unfiltered(&self) -> bool {
        self.filters.is_empty() && self.limit.is_none() && self.start_after.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    /// Adds a clause; clauses accumulate.
    pub fn filter(mut self, clause: Clause) -> Self {
        self.query.filters.push(clause);
        self
    }

    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sorts.push(Sort { field: field.into(), direction });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn start_after(mut self, id: impl Into<String>) -> Self {
        self.query.start_after = Some(id.into());
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

/// Translates query filters into a backend's own representation.
pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    /// Combines the translations of every clause of a query.
    fn visit_and(&mut self, clauses: &[Clause]) -> Result<Self::Output, Self::Error>;

    fn visit_clause(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit(&mut self, clause: &Clause) -> Result<Self::Output, Self::Error> {
        self.visit_clause(&clause.field, &clause.op, &clause.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_tokens_map_to_backend_operators() {
        let symbols = ["lt", "lte", "gt", "gte", "eq", "contains"]
            .into_iter()
            .map(|token| FieldOp::from_lookup(token).map(|op| op.as_str()))
            .collect::<Vec<_>>();

        assert_eq!(
            symbols,
            [Some("<"), Some("<="), Some(">"), Some(">="), Some("=="), Some("array_contains")]
        );
        assert_eq!(FieldOp::from_lookup("name"), None);
    }

    #[test]
    fn builder_accumulates_clauses_and_sorts() {
        let query = Query::builder()
            .filter(Filter::gt("age", 5))
            .filter(Filter::eq("name", "a"))
            .sort("age", SortDirection::Desc)
            .sort("name", SortDirection::Asc)
            .limit(3)
            .build();

        assert_eq!(query.filters[0].as_tuple(), ("age", ">", &Bson::Int32(5)));
        assert_eq!(query.filters.len(), 2);
        assert_eq!(query.sorts.len(), 2);
        assert!(!query.is_unfiltered());
        assert!(Query::new().is_unfiltered());
    }
}
