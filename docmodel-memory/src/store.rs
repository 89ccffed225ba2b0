//! In-memory storage implementation for hierarchical document stores.
//!
//! Documents are kept per collection path, keyed by identifier, behind an async-aware
//! read-write lock. Sub-collections are independent of their parent document: deleting a
//! document leaves the collections nested under it in place.

use async_trait::async_trait;
use bson::Document;
use mea::rwlock::RwLock;
use std::{cmp::Ordering, collections::BTreeMap, sync::Arc};

use docmodel_core::{
    backend::{StoreBackend, StoreBackendBuilder, StoredDocument},
    error::{DocumentStoreError, DocumentStoreResult},
    path::{CollectionPath, DocumentPath},
    query::{Query, SortDirection},
};

use crate::evaluator::{Comparable, DocumentEvaluator, lookup};

type CollectionMap = BTreeMap<String, Document>;
type StoreMap = BTreeMap<CollectionPath, CollectionMap>;

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable; clones share the same underlying data.
///
/// Queries scan every document of the collection. Results are ordered by the query's sorts,
/// then by identifier.
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel::{backend::StoreBackend, path::CollectionPath};
/// use bson::doc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = InMemoryStore::new();
///     let alice = CollectionPath::root("users").document("alice");
///
///     store.set_document(&alice, doc! { "name": "Alice", "age": 30 }).await?;
///     assert!(store.get_document(&alice).await?.exists());
///
///     Ok(())
/// }
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection path -> (document id -> document)
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Number of documents directly inside `collection`.
    pub async fn len(&self, collection: &CollectionPath) -> usize {
        self.store
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Every collection path currently holding at least one document.
    pub async fn collections(&self) -> Vec<CollectionPath> {
        self.store
            .read()
            .await
            .iter()
            .filter(|(_, documents)| !documents.is_empty())
            .map(|(path, _)| path.clone())
            .collect()
    }
}

fn compare(left: &Document, right: &Document, query: &Query) -> Ordering {
    query
        .sorts
        .iter()
        .map(|sort| {
            let null = bson::Bson::Null;
            let left = Comparable::from(lookup(left, &sort.field).unwrap_or(&null));
            let right = Comparable::from(lookup(right, &sort.field).unwrap_or(&null));

            match sort.direction {
                SortDirection::Asc => left.sort_cmp(&right),
                SortDirection::Desc => right.sort_cmp(&left),
            }
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn get_document(&self, path: &DocumentPath) -> DocumentStoreResult<StoredDocument> {
        let store = self.store.read().await;

        Ok(
            match store
                .get(path.collection())
                .and_then(|documents| documents.get(path.id()))
            {
                Some(document) => StoredDocument::new(path.clone(), document.clone()),
                None => StoredDocument::missing(path.clone()),
            },
        )
    }

    async fn set_document(&self, path: &DocumentPath, data: Document) -> DocumentStoreResult<()> {
        self.store
            .write()
            .await
            .entry(path.collection().clone())
            .or_default()
            .insert(path.id().to_string(), data);

        Ok(())
    }

    async fn update_document(&self, path: &DocumentPath, data: Document) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let Some(document) = store
            .get_mut(path.collection())
            .and_then(|documents| documents.get_mut(path.id()))
        else {
            return Err(DocumentStoreError::DocumentNotFound(
                path.id().to_string(),
                path.collection().to_string(),
            ));
        };

        for (key, value) in data {
            document.insert(key, value);
        }

        Ok(())
    }

    async fn delete_document(&self, path: &DocumentPath) -> DocumentStoreResult<()> {
        if let Some(documents) = self.store.write().await.get_mut(path.collection()) {
            documents.remove(path.id());
        }

        Ok(())
    }

    async fn delete_documents(&self, paths: Vec<DocumentPath>) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;

        for path in paths {
            if let Some(documents) = store.get_mut(path.collection()) {
                documents.remove(path.id());
            }
        }

        Ok(())
    }

    async fn query_documents(
        &self,
        collection: &CollectionPath,
        query: Query,
    ) -> DocumentStoreResult<Vec<StoredDocument>> {
        let store = self.store.read().await;
        let Some(documents) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut matched = documents
            .iter()
            .filter(|(_, document)| DocumentEvaluator::matches(document, &query.filters))
            .collect::<Vec<_>>();

        // Stable, so identifier order breaks ties.
        matched.sort_by(|(_, left), (_, right)| compare(left, right, &query));

        // The cursor document is positioned by its sort keys even when the filters exclude it.
        if let Some(cursor) = &query.start_after {
            match documents.get(cursor) {
                Some(anchor) => matched.retain(|(id, document)| {
                    compare(document, anchor, &query)
                        .then_with(|| id.as_str().cmp(cursor.as_str()))
                        .is_gt()
                }),
                None => matched.retain(|(id, _)| id.as_str() > cursor.as_str()),
            }
        }

        log::debug!(
            "memory query on {} matched {} of {} documents",
            collection,
            matched.len(),
            documents.len()
        );

        Ok(matched
            .into_iter()
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|(id, document)| StoredDocument::new(collection.document(id.clone()), document.clone()))
            .collect())
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel::backend::StoreBackendBuilder;
///
/// #[tokio::main]
/// async fn main() {
///     let store = InMemoryStore::builder().build().await.unwrap();
/// }
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}
