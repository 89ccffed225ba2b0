use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection,
    options::{ClientOptions, FindOptions},
};
use std::collections::BTreeMap;

use docmodel_core::{
    backend::{StoreBackend, StoreBackendBuilder, StoredDocument},
    error::{DocumentStoreError, DocumentStoreResult},
    path::{CollectionPath, DocumentPath},
    query::{Query, QueryVisitor},
};

use crate::{
    query::{MongoQueryTranslator, sort_document, start_after_filter},
    sanitizer::ValueSanitizer,
};

/// Document store backed by a MongoDB database.
///
/// Every collection path maps to one MongoDB collection named after the path string, so
/// `users/u1/orders` is stored apart from `users`. Document identifiers are kept in `_id`.
#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

fn backend_error(error: mongodb::error::Error) -> DocumentStoreError {
    DocumentStoreError::Backend(error.to_string())
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection: &CollectionPath) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(&ValueSanitizer::sanitize_string(&collection.to_string()))
    }

    fn prepare_document(&self, id: &str, document: Document) -> DocumentStoreResult<Document> {
        ValueSanitizer::sanitize_value(&Bson::Document(document))
            .as_document()
            .cloned()
            .map(|document| {
                document
                    .into_iter()
                    .chain([("_id".to_string(), Bson::String(id.to_string()))])
                    .collect()
            })
            .ok_or_else(|| DocumentStoreError::InvalidDocument("Expected document".into()))
    }

    fn restore_document(&self, document: Document) -> DocumentStoreResult<(String, Document)> {
        let id = match document.get("_id") {
            Some(Bson::String(id)) => id.clone(),
            Some(other) => other.to_string(),
            None => {
                return Err(DocumentStoreError::InvalidDocument(
                    "Stored document has no _id".into(),
                ));
            }
        };

        let data = ValueSanitizer::restore_value(&Bson::Document(
            document
                .into_iter()
                .filter(|(key, _)| key != "_id")
                .collect(),
        ))
        .as_document()
        .cloned()
        .unwrap_or_default();

        Ok((id, data))
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn get_document(&self, path: &DocumentPath) -> DocumentStoreResult<StoredDocument> {
        let found = self
            .get_collection(path.collection())
            .find_one(doc! { "_id": path.id() })
            .await
            .map_err(backend_error)?;

        Ok(match found {
            Some(document) => StoredDocument::new(path.clone(), self.restore_document(document)?.1),
            None => StoredDocument::missing(path.clone()),
        })
    }

    async fn set_document(&self, path: &DocumentPath, data: Document) -> DocumentStoreResult<()> {
        self.get_collection(path.collection())
            .replace_one(
                doc! { "_id": path.id() },
                self.prepare_document(path.id(), data)?,
            )
            .upsert(true)
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn update_document(&self, path: &DocumentPath, data: Document) -> DocumentStoreResult<()> {
        let collection = self.get_collection(path.collection());

        let matched = if data.is_empty() {
            collection
                .count_documents(doc! { "_id": path.id() })
                .await
                .map_err(backend_error)?
        } else {
            collection
                .update_one(
                    doc! { "_id": path.id() },
                    doc! { "$set": self.prepare_document(path.id(), data)? },
                )
                .await
                .map_err(backend_error)?
                .matched_count
        };

        if matched == 0 {
            return Err(DocumentStoreError::DocumentNotFound(
                path.id().to_string(),
                path.collection().to_string(),
            ));
        }

        Ok(())
    }

    async fn delete_document(&self, path: &DocumentPath) -> DocumentStoreResult<()> {
        self.get_collection(path.collection())
            .delete_one(doc! { "_id": path.id() })
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn delete_documents(&self, paths: Vec<DocumentPath>) -> DocumentStoreResult<()> {
        let mut grouped: BTreeMap<CollectionPath, Vec<String>> = BTreeMap::new();
        for path in paths {
            grouped
                .entry(path.collection().clone())
                .or_default()
                .push(path.id().to_string());
        }

        for (collection, ids) in grouped {
            self.get_collection(&collection)
                .delete_many(doc! { "_id": { "$in": ids } })
                .await
                .map_err(backend_error)?;
        }

        Ok(())
    }

    async fn query_documents(
        &self,
        collection: &CollectionPath,
        query: Query,
    ) -> DocumentStoreResult<Vec<StoredDocument>> {
        let mongo_collection = self.get_collection(collection);

        let mut filter = MongoQueryTranslator.visit_and(&query.filters)?;
        if let Some(cursor_id) = &query.start_after {
            let cursor = if query.sorts.is_empty() {
                None
            } else {
                mongo_collection
                    .find_one(doc! { "_id": cursor_id.as_str() })
                    .await
                    .map_err(backend_error)?
            };
            let after = start_after_filter(&query.sorts, cursor_id, cursor.as_ref());

            filter = if filter.is_empty() {
                after
            } else {
                doc! { "$and": [filter, after] }
            };
        }

        let mut options = FindOptions::default();
        options.sort = Some(sort_document(&query.sorts));
        if let Some(limit) = query.limit {
            options.limit = Some(limit as i64);
        }

        log::debug!("mongodb query on {}: {}", collection, filter);

        mongo_collection
            .find(filter)
            .with_options(options)
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)?
            .into_iter()
            .map(|document| {
                let (id, data) = self.restore_document(document)?;
                Ok(StoredDocument::new(collection.document(id), data))
            })
            .collect()
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.shutdown().await
    }
}

/// Connects a [`MongoDbStore`] from a connection string and database name.
pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;
        let client = Client::with_options(options)
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        log::debug!("connected mongodb store to database {}", self.database);

        Ok(MongoDbStore::new(client, self.database))
    }
}
