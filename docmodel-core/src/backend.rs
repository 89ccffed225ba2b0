//! Storage backend abstraction.
//!
//! The [`StoreBackend`] trait is the only interface the model layer depends on. It addresses
//! documents by [`DocumentPath`] and collections by [`CollectionPath`], so backends must
//! support hierarchical sub-collections: a collection path alternates collection names and
//! document identifiers.
//!
//! Payloads are flat or nested [`bson::Document`]s. The document identifier is the key the
//! document is stored under and is never part of the payload.
//!
//! # Examples
//!
//! ```ignore
//! use docmodel::backend::StoreBackend;
//! use docmodel::path::CollectionPath;
//! use bson::doc;
//!
//! let users = CollectionPath::root("users");
//! backend.set_document(&users.document("u1"), doc! { "name": "Alice" }).await?;
//!
//! let stored = backend.get_document(&users.document("u1")).await?;
//! assert!(stored.exists());
//! ```

use async_trait::async_trait;
use bson::Document;
use std::{fmt::Debug, sync::Arc};

use crate::{
    error::DocumentStoreResult,
    path::{CollectionPath, DocumentPath},
    query::Query,
};

/// A document as returned by a backend read. Reads of missing documents return a snapshot
/// with no data instead of failing.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    path: DocumentPath,
    data: Option<Document>,
}

impl StoredDocument {
    pub fn new(path: DocumentPath, data: Document) -> Self {
        Self { path, data: Some(data) }
    }

    pub fn missing(path: DocumentPath) -> Self {
        Self { path, data: None }
    }

    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    /// The stored key/value map; empty when the document does not exist.
    pub fn to_map(&self) -> Document {
        self.data.clone().unwrap_or_default()
    }

    pub fn data(&self) -> Option<&Document> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<Document> {
        self.data
    }

    pub fn id(&self) -> &str {
        self.path.id()
    }

    /// Address of the document, usable to read it again.
    pub fn reference(&self) -> &DocumentPath {
        &self.path
    }
}

/// Abstract interface for hierarchical document storage backends.
///
/// Implementations must be thread-safe. The model layer performs no retries and does not
/// translate transport failures: they should be reported as
/// [`DocumentStoreError::Backend`](crate::error::DocumentStoreError::Backend).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Reads one document. A missing document is not an error.
    async fn get_document(&self, path: &DocumentPath) -> DocumentStoreResult<StoredDocument>;

    /// Creates or fully replaces a document.
    async fn set_document(&self, path: &DocumentPath, data: Document) -> DocumentStoreResult<()>;

    /// Merges `data` into the top level of an existing document.
    ///
    /// Fails with [`DocumentStoreError::DocumentNotFound`](crate::error::DocumentStoreError::DocumentNotFound)
    /// when the document does not exist.
    async fn update_document(&self, path: &DocumentPath, data: Document) -> DocumentStoreResult<()>;

    /// Deletes a document. Deleting a missing document succeeds.
    async fn delete_document(&self, path: &DocumentPath) -> DocumentStoreResult<()>;

    /// Deletes several documents in one call.
    async fn delete_documents(&self, paths: Vec<DocumentPath>) -> DocumentStoreResult<()>;

    /// Runs a query against the documents directly inside `collection`.
    ///
    /// Results follow `query.sorts`, then document identifier order.
    async fn query_documents(
        &self,
        collection: &CollectionPath,
        query: Query,
    ) -> DocumentStoreResult<Vec<StoredDocument>>;

    /// Releases any resources held by the backend.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn get_document(&self, path: &DocumentPath) -> DocumentStoreResult<StoredDocument> {
        (*self).get_document(path).await
    }

    async fn set_document(&self, path: &DocumentPath, data: Document) -> DocumentStoreResult<()> {
        (*self).set_document(path, data).await
    }

    async fn update_document(&self, path: &DocumentPath, data: Document) -> DocumentStoreResult<()> {
        (*self).update_document(path, data).await
    }

    async fn delete_document(&self, path: &DocumentPath) -> DocumentStoreResult<()> {
        (*self).delete_document(path).await
    }

    async fn delete_documents(&self, paths: Vec<DocumentPath>) -> DocumentStoreResult<()> {
        (*self).delete_documents(paths).await
    }

    async fn query_documents(
        &self,
        collection: &CollectionPath,
        query: Query,
    ) -> DocumentStoreResult<Vec<StoredDocument>> {
        (*self)
            .query_documents(collection, query)
            .await
    }
}

#[async_trait]
impl<B> StoreBackend for Arc<B>
where
    B: StoreBackend,
{
    async fn get_document(&self, path: &DocumentPath) -> DocumentStoreResult<StoredDocument> {
        (**self).get_document(path).await
    }

    async fn set_document(&self, path: &DocumentPath, data: Document) -> DocumentStoreResult<()> {
        (**self).set_document(path, data).await
    }

    async fn update_document(&self, path: &DocumentPath, data: Document) -> DocumentStoreResult<()> {
        (**self).update_document(path, data).await
    }

    async fn delete_document(&self, path: &DocumentPath) -> DocumentStoreResult<()> {
        (**self).delete_document(path).await
    }

    async fn delete_documents(&self, paths: Vec<DocumentPath>) -> DocumentStoreResult<()> {
        (**self).delete_documents(paths).await
    }

    async fn query_documents(
        &self,
        collection: &CollectionPath,
        query: Query,
    ) -> DocumentStoreResult<Vec<StoredDocument>> {
        (**self)
            .query_documents(collection, query)
            .await
    }
}

/// Factory for backend instances.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
