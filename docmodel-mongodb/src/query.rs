//! Query translation into MongoDB filter and sort documents.

use bson::{Bson, Document, doc};

use docmodel_core::{
    error::DocumentStoreError,
    query::{Clause, FieldOp, QueryVisitor, Sort, SortDirection},
};

use crate::sanitizer::ValueSanitizer;

/// Translates query clauses into a MongoDB filter document.
pub(crate) struct MongoQueryTranslator;

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, clauses: &[Clause]) -> Result<Self::Output, Self::Error> {
        match clauses {
            [] => Ok(doc! {}),
            [clause] => self.visit(clause),
            _ => Ok(doc! {
                "$and": clauses
                    .iter()
                    .map(|clause| self.visit(clause))
                    .collect::<Result<Vec<_>, _>>()?,
            }),
        }
    }

    fn visit_clause(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error> {
        let key = ValueSanitizer::sanitize_path(field);
        let value = ValueSanitizer::sanitize_value(value);
        let is_null = matches!(value, Bson::Null);
        let mut condition = match op {
            FieldOp::Eq => doc! { "$eq": value },
            FieldOp::Gt => doc! { "$gt": value },
            FieldOp::Gte => doc! { "$gte": value },
            FieldOp::Lt => doc! { "$lt": value },
            FieldOp::Lte => doc! { "$lte": value },
            FieldOp::ArrayContains => doc! { "$elemMatch": { "$eq": value } },
        };
        // `null` alone would also match documents missing the field.
        if is_null {
            condition.insert("$exists", true);
        }

        Ok(doc! { key: condition })
    }
}

/// Sort document for `sorts`, with the document key as final tie-breaker.
pub(crate) fn sort_document(sorts: &[Sort]) -> Document {
    let mut document = Document::new();
    for sort in sorts {
        document.insert(
            ValueSanitizer::sanitize_path(&sort.field),
            match sort.direction {
                SortDirection::Asc => 1,
                SortDirection::Desc => -1,
            },
        );
    }
    document.insert("_id", 1);
    document
}

/// Filter selecting documents ordered after `cursor_id` under `sorts`.
///
/// `cursor` is the stored cursor document, if it still exists. Without it, or without
/// sorts, only the document key is compared.
pub(crate) fn start_after_filter(
    sorts: &[Sort],
    cursor_id: &str,
    cursor: Option<&Document>,
) -> Document {
    let Some(cursor) = cursor.filter(|_| !sorts.is_empty()) else {
        return doc! { "_id": { "$gt": cursor_id } };
    };

    let key = |sort: &Sort| ValueSanitizer::sanitize_path(&sort.field);
    let value = |sort: &Sort| {
        let mut current = Some(Bson::Document(cursor.clone()));
        for segment in key(sort).split('.') {
            current = current
                .as_ref()
                .and_then(Bson::as_document)
                .and_then(|document| document.get(segment))
                .cloned();
        }
        current.unwrap_or(Bson::Null)
    };

    let mut branches = Vec::new();
    for (index, sort) in sorts.iter().enumerate() {
        let mut branch = Document::new();
        for previous in &sorts[..index] {
            branch.insert(key(previous), doc! { "$eq": value(previous) });
        }
        let op = match sort.direction {
            SortDirection::Asc => "$gt",
            SortDirection::Desc => "$lt",
        };
        branch.insert(key(sort), doc! { op: value(sort) });
        branches.push(branch);
    }

    let mut tie = Document::new();
    for sort in sorts {
        tie.insert(key(sort), doc! { "$eq": value(sort) });
    }
    tie.insert("_id", doc! { "$gt": cursor_id });
    branches.push(tie);

    doc! { "$or": branches }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmodel_core::query::Filter;

    #[test]
    fn clauses_translate_to_operators() {
        let filter = MongoQueryTranslator
            .visit_and(&[Filter::gt("age", 5), Filter::array_contains("tags", "red")])
            .unwrap();

        assert_eq!(
            filter,
            doc! {
                "$and": [
                    { "age": { "$gt": 5 } },
                    { "tags": { "$elemMatch": { "$eq": "red" } } },
                ]
            }
        );
    }

    #[test]
    fn null_comparisons_require_the_field() {
        let filter = MongoQueryTranslator
            .visit_and(&[Filter::eq("nickname", Bson::Null)])
            .unwrap();

        assert_eq!(
            filter,
            doc! { "nickname": { "$eq": Bson::Null, "$exists": true } }
        );
    }

    #[test]
    fn empty_queries_match_everything() {
        assert_eq!(MongoQueryTranslator.visit_and(&[]).unwrap(), doc! {});
    }

    #[test]
    fn sorts_end_with_the_document_key() {
        let sorts = [Sort {
            field: "age".into(),
            direction: SortDirection::Desc,
        }];

        assert_eq!(sort_document(&sorts), doc! { "age": -1, "_id": 1 });
    }

    #[test]
    fn cursor_without_sorts_compares_keys() {
        assert_eq!(
            start_after_filter(&[], "abc", None),
            doc! { "_id": { "$gt": "abc" } }
        );
    }

    #[test]
    fn cursor_with_sorts_uses_keyset_branches() {
        let sorts = [Sort {
            field: "age".into(),
            direction: SortDirection::Asc,
        }];
        let cursor = doc! { "_id": "abc", "age": 31 };

        assert_eq!(
            start_after_filter(&sorts, "abc", Some(&cursor)),
            doc! {
                "$or": [
                    { "age": { "$gt": 31 } },
                    { "age": { "$eq": 31 }, "_id": { "$gt": "abc" } },
                ]
            }
        );
    }
}
