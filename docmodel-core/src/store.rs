//! Main entry point binding models to a backend.
//!
//! ```ignore
//! use docmodel::prelude::*;
//!
//! let store = ModelStore::new(InMemoryStore::builder().build().await?);
//!
//! let alice = store
//!     .objects(&user)?
//!     .create(fields! { "name" => "Alice", "age" => 31 })
//!     .await?;
//!
//! let adults = store
//!     .objects(&user)?
//!     .filter(fields! { "age__gte" => 18 })?
//!     .fetch()
//!     .await?;
//! ```

use crate::{
    backend::{StoreBackend, StoredDocument},
    collection::{CollectionRef, DocumentRef},
    config::StoreConfig,
    error::{DocumentStoreError, DocumentStoreResult},
    manager::Manager,
    materialize::Materializer,
    model::{DEFAULT_MANAGER, Instance, Model},
    path::{CollectionPath, DocumentPath},
};

#[derive(Debug)]
pub struct ModelStore<B: StoreBackend> {
    backend: B,
    config: StoreConfig,
}

impl<B: StoreBackend> ModelStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            config: StoreConfig::default(),
        }
    }

    pub fn with_config(backend: B, config: StoreConfig) -> DocumentStoreResult<Self> {
        config.validate()?;
        Ok(Self { backend, config })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn collection(&self, path: CollectionPath) -> CollectionRef<'_, B> {
        CollectionRef::new(&self.backend, path)
    }

    pub fn document(&self, path: DocumentPath) -> DocumentRef<'_, B> {
        DocumentRef::new(&self.backend, path)
    }

    /// The default manager of `model`.
    pub fn objects(&self, model: &Model) -> DocumentStoreResult<Manager<'_, B>> {
        self.manager(model, DEFAULT_MANAGER)
    }

    /// A manager `model` declared under `name`.
    pub fn manager(&self, model: &Model, name: &str) -> DocumentStoreResult<Manager<'_, B>> {
        if model.is_abstract() {
            return Err(DocumentStoreError::config(format!(
                "Manager isn't accessible via abstract model {}",
                model.name()
            )));
        }
        if !model.has_manager(name) {
            return Err(DocumentStoreError::config(format!(
                "{} has no manager {}",
                model.name(),
                name
            )));
        }

        Ok(Manager::new(self, model.clone(), name))
    }

    /// Converts a stored document into an instance of `model`, resolving references.
    pub async fn materialize(
        &self,
        model: &Model,
        document: StoredDocument,
    ) -> DocumentStoreResult<Instance> {
        Materializer::new(&self.backend, self.config.max_reference_depth)
            .materialize(model, document)
            .await
    }

    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await?;

        Ok(())
    }
}
