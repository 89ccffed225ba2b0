//! Managers and query sets: the typed query builder and executor.
//!
//! A [`Manager`] is the collection-level entry point for one model. It hands out
//! [`QuerySet`]s, which accumulate filter clauses, sorts and a limit until they are executed.
//!
//! Filter keys follow `field[__subfield...][__operator]` with operator one of `lt`, `lte`, `gt`,
//! `gte`, `eq` or `contains`; a trailing token that is not an operator is a sub-field and the
//! operator defaults to `eq`. Sub-fields address keys inside map fields.
//!
//! ```ignore
//! let managers = store.objects(&user)?;
//!
//! let page = managers
//!     .filter(fields! { "age__gte" => 18, "address__city" => "Berlin" })?
//!     .order_by("-age")?
//!     .limit(20)
//!     .fetch()
//!     .await?;
//!
//! let bob = managers.get(fields! { "id" => bob_id }).await?;
//! managers.update(fields! { "id" => bob_id, "age" => 41 }).await?;
//! ```
//!
//! `create` and `save` write every declared field, applying defaults and required checks to
//! all of them. `update` writes only the fields it is given and merges them into the stored
//! document; fields it is not given are left untouched and are not validated.

use bson::{Bson, Document};
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use uuid::Uuid;

use crate::{
    backend::{StoreBackend, StoredDocument},
    collection::CollectionRef,
    error::{DocumentStoreError, DocumentStoreResult},
    field::{Field, FieldKind},
    model::{Instance, LOOKUP_SEPARATOR, Model, PRIMARY_KEY},
    page::Paginator,
    path::{self, CollectionPath},
    query::{Clause, FieldOp, Query, Sort, SortDirection},
    store::ModelStore,
    value::Value,
};

/// A fresh 128-bit random identifier in lowercase hex.
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Parses one `key = value` filter into a backend clause on stored column paths.
pub fn parse_clause(model: &Model, key: &str, value: Value) -> DocumentStoreResult<Clause> {
    let mut segments = key.split(LOOKUP_SEPARATOR).collect::<Vec<_>>();
    let trailing = segments
        .last()
        .copied()
        .filter(|_| segments.len() > 1);
    let op = match trailing.and_then(FieldOp::from_lookup) {
        Some(op) => {
            segments.pop();
            op
        }
        None => FieldOp::Eq,
    };

    let (name, subfields) = segments
        .split_first()
        .ok_or_else(|| DocumentStoreError::config(format!("invalid filter `{key}`")))?;
    let field = model.field(name)?;
    if field.is_id() {
        return Err(DocumentStoreError::config(format!(
            "cannot filter {} on `{}`, look documents up by identifier instead",
            model.name(),
            key
        )));
    }

    let column = column_path(model, field, subfields, key)?;

    let value = if subfields.is_empty() && op != FieldOp::ArrayContains {
        field.to_stored(&value)?
    } else {
        value.to_bson()?
    };

    Ok(Clause::new(column, op, value))
}

/// Parses an ordering key: a field path with an optional leading `-` for descending order.
pub fn parse_sort(model: &Model, key: &str) -> DocumentStoreResult<Sort> {
    let (direction, key) = match key.strip_prefix('-') {
        Some(key) => (SortDirection::Desc, key),
        None => (SortDirection::Asc, key),
    };

    let segments = key.split(LOOKUP_SEPARATOR).collect::<Vec<_>>();
    let (name, subfields) = segments
        .split_first()
        .map_or(("", &[][..]), |(name, rest)| (*name, rest));
    let field = model.field(name)?;
    if field.is_id() {
        return Err(DocumentStoreError::config(format!(
            "cannot order {} by `{}`, results are already in identifier order",
            model.name(),
            key
        )));
    }

    let field = column_path(model, field, subfields, key)?;

    Ok(Sort { field, direction })
}

/// Dotted stored path of `field` followed by `subfields`. Only map fields have sub-fields.
fn column_path(
    model: &Model,
    field: &Field,
    subfields: &[&str],
    key: &str,
) -> DocumentStoreResult<String> {
    if !subfields.is_empty() && !matches!(field.kind(), FieldKind::Map) {
        return Err(DocumentStoreError::config(format!(
            "{}.{} is a {} and has no sub-field for `{}`",
            model.name(),
            field.name(),
            field.kind().name(),
            key
        )));
    }

    Ok(std::iter::once(field.column())
        .chain(subfields.iter().copied())
        .collect::<Vec<_>>()
        .join("."))
}

/// Sizes of the paging rounds a delete went through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub batches: Vec<usize>,
}

impl DeleteReport {
    pub fn total(&self) -> usize {
        self.batches.iter().sum()
    }

    pub fn rounds(&self) -> usize {
        self.batches.len()
    }
}

#[derive(Debug)]
pub struct Manager<'a, B: StoreBackend> {
    store: &'a ModelStore<B>,
    model: Model,
    name: String,
    path: Option<CollectionPath>,
}

impl<B: StoreBackend> Clone for Manager<'_, B> {
    fn clone(&self) -> Self {
        Self {
            store: self.store,
            model: self.model.clone(),
            name: self.name.clone(),
            path: self.path.clone(),
        }
    }
}

impl<'a, B: StoreBackend> Manager<'a, B> {
    pub(crate) fn new(store: &'a ModelStore<B>, model: Model, name: &str) -> Self {
        Self {
            store,
            model,
            name: name.to_string(),
            path: None,
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The collection this manager reads and writes: its explicit scope if it has one,
    /// otherwise the model's current base path.
    pub fn collection_path(&self) -> CollectionPath {
        self.path
            .clone()
            .unwrap_or_else(|| self.model.path())
    }

    /// A manager scoped to the sub-collection under `parent`. The model's shared base path
    /// is not touched.
    pub fn under(&self, parent: &Instance) -> DocumentStoreResult<Self> {
        let path = path::nested_path(&self.model, parent)?;

        Ok(Self {
            path: Some(path),
            ..self.clone()
        })
    }

    pub fn all(&self) -> QuerySet<'a, B> {
        QuerySet::new(self.clone())
    }

    pub fn filter(&self, clauses: Vec<(String, Value)>) -> DocumentStoreResult<QuerySet<'a, B>> {
        self.all().filter(clauses)
    }

    /// Fetches exactly one instance.
    ///
    /// A lookup on the identifier alone reads the document directly; the identifier cannot
    /// be combined with other clauses.
    pub async fn get(&self, clauses: Vec<(String, Value)>) -> DocumentStoreResult<Instance> {
        let (ids, others): (Vec<_>, Vec<_>) = clauses
            .into_iter()
            .partition(|(key, _)| key == PRIMARY_KEY || key == "id__eq");

        match (ids.as_slice(), others.is_empty()) {
            ([], _) => self.filter(others)?.get().await,
            ([(_, id)], true) => {
                let id = self.identifier(id)?;
                self.get_by_id(&id).await
            }
            _ => Err(DocumentStoreError::config(format!(
                "{} lookup by identifier cannot be combined with other clauses",
                self.model.name()
            ))),
        }
    }

    pub async fn get_by_id(&self, id: &str) -> DocumentStoreResult<Instance> {
        let id = self.identifier(&Value::from(id))?;

        let path = self.collection_path().document(id.clone());
        let document = self
            .store
            .document(path.clone())
            .get()
            .await?;

        if !document.exists() {
            return Err(DocumentStoreError::DocumentNotFound(
                format!("with id {id}"),
                path.collection().to_string(),
            ));
        }

        self.store.materialize(&self.model, document).await
    }

    /// Validates every declared field, writes the full document and returns the saved
    /// instance. An identifier is generated when none is given.
    pub async fn create(&self, values: Vec<(String, Value)>) -> DocumentStoreResult<Instance> {
        let mut instance = self.model.new_instance(values)?;
        self.save(&mut instance).await?;

        Ok(instance)
    }

    /// Merges the given fields into an existing document. The identifier is required.
    pub async fn update(&self, values: Vec<(String, Value)>) -> DocumentStoreResult<()> {
        let mut id = None;
        let mut data = Document::new();

        for (name, value) in values {
            if name == PRIMARY_KEY {
                id = Some(self.identifier(&value)?);
                continue;
            }

            let field = self.model.field(&name)?;
            data.insert(field.column(), field.lookup_value(value)?);
        }

        let id = id.ok_or_else(|| {
            DocumentStoreError::config(format!("{} update requires an identifier", self.model.name()))
        })?;
        let path = self.collection_path().document(id);

        log::debug!("updating {} ({} fields)", path, data.len());
        self.store.document(path).update(data).await
    }

    /// Deletes every document in the collection, paging through it.
    pub async fn delete(&self) -> DocumentStoreResult<DeleteReport> {
        self.all().delete().await
    }

    /// Writes every field of `instance`, assigning an identifier if it has none.
    ///
    /// Instances remember the collection they were loaded from or saved to; unsaved
    /// instances go to this manager's collection.
    pub async fn save(&self, instance: &mut Instance) -> DocumentStoreResult<()> {
        self.check_instance(instance)?;

        let mut data = Document::new();
        let mut canonical = Vec::new();
        for field in self.model.fields().iter().filter(|field| !field.is_id()) {
            let value = instance
                .get(field.name())
                .cloned()
                .unwrap_or_default();
            let (native, stored) = field.coerce(value)?;
            data.insert(field.column(), stored);
            canonical.push((field.name().to_string(), native));
        }

        let collection = instance
            .stored_collection()
            .cloned()
            .unwrap_or_else(|| self.collection_path());
        let id = instance
            .id()
            .map(str::to_string)
            .unwrap_or_else(generate_id);
        let path = collection.document(id.clone());

        log::debug!("writing {}", path);
        self.store.document(path).set(data).await?;

        for (name, value) in canonical {
            instance.set_value(&name, value);
        }
        instance.set_id(Some(id));
        instance.set_collection(Some(collection));

        Ok(())
    }

    /// Deletes the stored document of `instance` and clears its identifier.
    pub async fn delete_instance(&self, instance: &mut Instance) -> DocumentStoreResult<()> {
        self.check_instance(instance)?;

        let Some(id) = instance.id().map(str::to_string) else {
            return Err(DocumentStoreError::config(format!(
                "{} instance has no identifier to delete",
                self.model.name()
            )));
        };
        let path = instance
            .stored_collection()
            .cloned()
            .unwrap_or_else(|| self.collection_path())
            .document(id);

        log::debug!("deleting {}", path);
        self.store.document(path).delete().await?;
        instance.set_id(None);

        Ok(())
    }

    pub fn paginate(&self, page_size: usize) -> DocumentStoreResult<Paginator<'a, B>> {
        self.all().paginate(page_size)
    }

    fn identifier(&self, value: &Value) -> DocumentStoreResult<String> {
        let field = self.model.field(PRIMARY_KEY)?;
        match field.to_stored(value)? {
            Bson::String(id) if !id.is_empty() => Ok(id),
            _ => Err(DocumentStoreError::config(format!(
                "{} identifier must not be empty",
                self.model.name()
            ))),
        }
    }

    fn check_instance(&self, instance: &Instance) -> DocumentStoreResult<()> {
        if instance.model() != &self.model {
            return Err(DocumentStoreError::config(format!(
                "{} manager cannot handle {} instances",
                self.model.name(),
                instance.model().name()
            )));
        }

        Ok(())
    }
}

/// A lazily executed query over one model's collection.
#[derive(Debug)]
pub struct QuerySet<'a, B: StoreBackend> {
    manager: Manager<'a, B>,
    filters: Vec<Clause>,
    sorts: Vec<Sort>,
    limit: Option<usize>,
    start_after: Option<String>,
}

impl<B: StoreBackend> Clone for QuerySet<'_, B> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            filters: self.filters.clone(),
            sorts: self.sorts.clone(),
            limit: self.limit,
            start_after: self.start_after.clone(),
        }
    }
}

impl<'a, B: StoreBackend> QuerySet<'a, B> {
    fn new(manager: Manager<'a, B>) -> Self {
        Self {
            manager,
            filters: Vec::new(),
            sorts: Vec::new(),
            limit: None,
            start_after: None,
        }
    }

    pub fn manager(&self) -> &Manager<'a, B> {
        &self.manager
    }

    /// Adds filter clauses to the ones already present.
    pub fn filter(mut self, clauses: Vec<(String, Value)>) -> DocumentStoreResult<Self> {
        for (key, value) in clauses {
            let clause = parse_clause(&self.manager.model, &key, value)?;
            self.filters.push(clause);
        }

        Ok(self)
    }

    /// Adds a sort; `-field` sorts descending. Sorts apply in call order.
    pub fn order_by(mut self, key: &str) -> DocumentStoreResult<Self> {
        let sort = parse_sort(&self.manager.model, key)?;
        self.sorts.push(sort);

        Ok(self)
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) fn max_results(&self) -> Option<usize> {
        self.limit
    }

    pub(crate) fn start_after(mut self, id: impl Into<String>) -> Self {
        self.start_after = Some(id.into());
        self
    }

    pub fn where_clauses(&self) -> &[Clause] {
        &self.filters
    }

    /// The backend query this query set runs.
    pub fn build(&self) -> Query {
        Query {
            filters: self.filters.clone(),
            sorts: self.sorts.clone(),
            limit: self.limit,
            start_after: self.start_after.clone(),
        }
    }

    pub fn collection(&self) -> CollectionRef<'a, B> {
        self.manager
            .store
            .collection(self.manager.collection_path())
            .with_query(self.build())
    }

    async fn documents(&self) -> DocumentStoreResult<Vec<StoredDocument>> {
        let collection = self.collection();
        log::debug!(
            "querying {} ({} clauses, {} sorts, limit {:?})",
            collection.path(),
            self.filters.len(),
            self.sorts.len(),
            self.limit
        );

        collection.get().await
    }

    pub async fn fetch(&self) -> DocumentStoreResult<Vec<Instance>> {
        let documents = self.documents().await?;

        let mut instances = Vec::with_capacity(documents.len());
        for document in documents {
            instances.push(
                self.manager
                    .store
                    .materialize(&self.manager.model, document)
                    .await?,
            );
        }

        Ok(instances)
    }

    /// Requires exactly one match.
    pub async fn get(&self) -> DocumentStoreResult<Instance> {
        let mut documents = self.documents().await?;

        match documents.len() {
            0 => Err(DocumentStoreError::DocumentNotFound(
                self.describe(),
                self.manager.collection_path().to_string(),
            )),
            1 => {
                let document = documents.remove(0);
                self.manager
                    .store
                    .materialize(&self.manager.model, document)
                    .await
            }
            count => Err(DocumentStoreError::MultipleResults(
                count,
                self.manager.collection_path().to_string(),
            )),
        }
    }

    /// The first match, if any.
    pub async fn first(&self) -> DocumentStoreResult<Option<Instance>> {
        let mut documents = self.clone().limit(1).documents().await?;

        match documents.pop() {
            Some(document) => Ok(Some(
                self.manager
                    .store
                    .materialize(&self.manager.model, document)
                    .await?,
            )),
            None => Ok(None),
        }
    }

    /// Streams matching instances. The stream is single-pass; re-run the query to
    /// iterate again.
    pub fn stream(self) -> BoxStream<'a, DocumentStoreResult<Instance>> {
        let store = self.manager.store;
        let model = self.manager.model.clone();

        self.collection()
            .stream()
            .and_then(move |document| {
                let model = model.clone();
                async move { store.materialize(&model, document).await }
            })
            .boxed()
    }

    /// Deletes the matching documents.
    ///
    /// A query without filters, limit or cursor deletes the whole collection in rounds of
    /// `delete_batch_size` documents until a round comes back short.
    pub async fn delete(&self) -> DocumentStoreResult<DeleteReport> {
        let backend = self.manager.store.backend();
        let mut report = DeleteReport::default();

        if !self.build().is_unfiltered() {
            let paths = self
                .documents()
                .await?
                .into_iter()
                .map(|document| document.reference().clone())
                .collect::<Vec<_>>();
            let count = paths.len();
            if count > 0 {
                backend.delete_documents(paths).await?;
            }

            log::debug!("deleted {} matching documents", count);
            report.batches.push(count);
            return Ok(report);
        }

        let path = self.manager.collection_path();
        let batch_size = self.manager.store.config().delete_batch_size;
        loop {
            let paths = self
                .manager
                .store
                .collection(path.clone())
                .limit(batch_size)
                .get()
                .await?
                .into_iter()
                .map(|document| document.reference().clone())
                .collect::<Vec<_>>();
            let count = paths.len();
            if count > 0 {
                backend.delete_documents(paths).await?;
            }

            report.batches.push(count);
            log::debug!(
                "delete round {} removed {} documents from {}",
                report.rounds(),
                count,
                path
            );

            if count < batch_size {
                break;
            }
        }

        Ok(report)
    }

    pub fn paginate(self, page_size: usize) -> DocumentStoreResult<Paginator<'a, B>> {
        Paginator::new(self, page_size)
    }

    fn describe(&self) -> String {
        let clauses = self
            .filters
            .iter()
            .map(|clause| {
                let (field, op, value) = clause.as_tuple();
                format!("{field} {op} {value}")
            })
            .collect::<Vec<_>>();

        format!("matching [{}]", clauses.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{field::Field, model::ModelSchema, registry::Registry};

    fn person() -> Model {
        Registry::new()
            .register(
                ModelSchema::builder("Person")
                    .field("name", Field::text())
                    .field("age", Field::integer().column_name("years"))
                    .field("tags", Field::list().blank())
                    .field("meta", Field::map().blank()),
            )
            .unwrap()
    }

    #[test]
    fn operator_suffix_builds_backend_clause() {
        let model = person();

        let clause = parse_clause(&model, "age__gt", Value::from(5)).unwrap();
        assert_eq!(clause.as_tuple(), ("years", ">", &Bson::Int64(5)));

        let clause = parse_clause(&model, "age", Value::from(5)).unwrap();
        assert_eq!(clause.as_tuple(), ("years", "==", &Bson::Int64(5)));

        let clause = parse_clause(&model, "name__eq", Value::from("a")).unwrap();
        assert_eq!(clause.as_tuple(), ("name", "==", &Bson::String("a".into())));
    }

    #[test]
    fn values_are_coerced_through_the_field() {
        let model = person();

        let clause = parse_clause(&model, "age__lte", Value::from("42")).unwrap();

        assert_eq!(clause.value, Bson::Int64(42));
        assert!(matches!(
            parse_clause(&model, "age", Value::List(vec![])),
            Err(DocumentStoreError::ValueType(..))
        ));
    }

    #[test]
    fn sub_fields_and_contains_skip_field_coercion() {
        let model = person();

        let clause = parse_clause(&model, "meta__address__city", Value::from("Oslo")).unwrap();
        assert_eq!(
            clause.as_tuple(),
            ("meta.address.city", "==", &Bson::String("Oslo".into()))
        );

        let clause = parse_clause(&model, "meta__score__gte", Value::from(3)).unwrap();
        assert_eq!(clause.as_tuple(), ("meta.score", ">=", &Bson::Int64(3)));

        let clause = parse_clause(&model, "tags__contains", Value::from("red")).unwrap();
        assert_eq!(
            clause.as_tuple(),
            ("tags", "array_contains", &Bson::String("red".into()))
        );
    }

    #[test]
    fn unknown_fields_and_identifier_filters_are_rejected() {
        let model = person();

        assert!(matches!(
            parse_clause(&model, "nickname", Value::from("x")),
            Err(DocumentStoreError::Configuration(_))
        ));
        assert!(matches!(
            parse_clause(&model, "id", Value::from("x")),
            Err(DocumentStoreError::Configuration(_))
        ));
    }

    #[test]
    fn only_map_fields_take_sub_fields() {
        let model = person();

        assert!(matches!(
            parse_clause(&model, "name__foo", Value::from("x")),
            Err(DocumentStoreError::Configuration(_))
        ));
        assert!(matches!(
            parse_clause(&model, "tags__first__gte", Value::from(1)),
            Err(DocumentStoreError::Configuration(_))
        ));
        assert!(matches!(
            parse_sort(&model, "age__gt"),
            Err(DocumentStoreError::Configuration(_))
        ));
        assert!(parse_sort(&model, "-meta__rank").is_ok());
    }

    #[test]
    fn leading_dash_sorts_descending() {
        let model = person();

        assert_eq!(
            parse_sort(&model, "-age").unwrap(),
            Sort {
                field: "years".into(),
                direction: SortDirection::Desc
            }
        );
        assert_eq!(
            parse_sort(&model, "meta__rank").unwrap(),
            Sort {
                field: "meta.rank".into(),
                direction: SortDirection::Asc
            }
        );
        assert!(parse_sort(&model, "id").is_err());
    }

    #[test]
    fn generated_identifiers_are_hex() {
        let id = generate_id();

        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, generate_id());
    }
}
