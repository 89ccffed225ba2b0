//! Collection and document references bound to a backend.
//!
//! These are the raw, untyped handles the query executor works with. A [`CollectionRef`]
//! accumulates filters, sorts and a limit, then streams the matching documents; a
//! [`DocumentRef`] reads and writes a single document.
//!
//! ```ignore
//! let users = store.collection(CollectionPath::root("users"));
//!
//! let adults = users
//!     .where_("age", FieldOp::Gte, 18)
//!     .order_by("age", SortDirection::Desc)
//!     .limit(10)
//!     .get()
//!     .await?;
//!
//! users.document("u1").update(doc! { "age": 31 }).await?;
//! ```

use bson::{Bson, Document};
use futures::stream::{self, BoxStream, StreamExt};

use crate::{
    backend::{StoreBackend, StoredDocument},
    error::DocumentStoreResult,
    path::{CollectionPath, DocumentPath},
    query::{Clause, FieldOp, Query, Sort, SortDirection},
};

#[derive(Debug)]
pub struct CollectionRef<'a, B: StoreBackend> {
    backend: &'a B,
    path: CollectionPath,
    query: Query,
}

impl<'a, B: StoreBackend> CollectionRef<'a, B> {
    pub fn new(backend: &'a B, path: CollectionPath) -> Self {
        Self {
            backend,
            path,
            query: Query::default(),
        }
    }

    pub fn path(&self) -> &CollectionPath {
        &self.path
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Replaces the accumulated query.
    pub fn with_query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    pub fn document(&self, id: impl Into<String>) -> DocumentRef<'a, B> {
        DocumentRef::new(self.backend, self.path.document(id))
    }

    pub fn where_(mut self, field: impl Into<String>, op: FieldOp, value: impl Into<Bson>) -> Self {
        self.query
            .filters
            .push(Clause::new(field, op, value));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sorts.push(Sort {
            field: field.into(),
            direction,
        });
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

    /// Runs the query and collects every matching document.
    pub async fn get(&self) -> DocumentStoreResult<Vec<StoredDocument>> {
        self.backend
            .query_documents(&self.path, self.query.clone())
            .await
    }

    /// Runs the query when first polled and yields the matching documents once.
    pub fn stream(self) -> BoxStream<'a, DocumentStoreResult<StoredDocument>> {
        let Self { backend, path, query } = self;

        stream::once(async move { backend.query_documents(&path, query).await })
            .flat_map(|result| match result {
                Ok(documents) => stream::iter(documents.into_iter().map(Ok)).left_stream(),
                Err(err) => stream::iter(std::iter::once(Err(err))).right_stream(),
            })
            .boxed()
    }
}

#[derive(Debug)]
pub struct DocumentRef<'a, B: StoreBackend> {
    backend: &'a B,
    path: DocumentPath,
}

impl<'a, B: StoreBackend> DocumentRef<'a, B> {
    pub fn new(backend: &'a B, path: DocumentPath) -> Self {
        Self { backend, path }
    }

    pub fn id(&self) -> &str {
        self.path.id()
    }

    pub fn path(&self) -> &DocumentPath {
        &self.path
    }

    /// A sub-collection nested under this document.
    pub fn collection(&self, name: impl Into<String>) -> CollectionRef<'a, B> {
        CollectionRef::new(self.backend, self.path.child(name))
    }

    pub async fn get(&self) -> DocumentStoreResult<StoredDocument> {
        self.backend.get_document(&self.path).await
    }

    pub async fn set(&self, data: Document) -> DocumentStoreResult<()> {
        self.backend
            .set_document(&self.path, data)
            .await
    }

    pub async fn update(&self, data: Document) -> DocumentStoreResult<()> {
        self.backend
            .update_document(&self.path, data)
            .await
    }

    pub async fn delete(&self) -> DocumentStoreResult<()> {
        self.backend.delete_document(&self.path).await
    }
}
