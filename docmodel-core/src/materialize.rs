//! Conversion of stored documents back into model instances.
//!
//! Every stored key is matched to the field whose column it is. Keys no field claims are
//! skipped with a warning. Reference fields are resolved by fetching the referenced document
//! and materializing it recursively. A reference declared against an abstract model is read
//! back as the concrete subtype stored in the referenced collection. The whole materialization
//! fails if any reference along the way is missing, revisits a document already on the chain,
//! or exceeds the configured depth. No partially populated instance is ever returned.

use futures::future::{BoxFuture, FutureExt};

use crate::{
    backend::{StoreBackend, StoredDocument},
    error::{DocumentStoreError, DocumentStoreResult},
    model::{Instance, Model},
    path::DocumentPath,
    value::Value,
};

#[derive(Debug)]
pub struct Materializer<'a, B: StoreBackend> {
    backend: &'a B,
    max_depth: usize,
}

impl<'a, B: StoreBackend> Materializer<'a, B> {
    pub fn new(backend: &'a B, max_depth: usize) -> Self {
        Self { backend, max_depth }
    }

    /// Builds an instance of `model` from an existing stored document.
    pub async fn materialize(
        &self,
        model: &Model,
        document: StoredDocument,
    ) -> DocumentStoreResult<Instance> {
        self.resolve(model, document, Vec::new()).await
    }

    fn resolve<'s>(
        &'s self,
        model: &'s Model,
        document: StoredDocument,
        chain: Vec<DocumentPath>,
    ) -> BoxFuture<'s, DocumentStoreResult<Instance>> {
        async move {
            let path = document.reference().clone();

            if chain.contains(&path) {
                return Err(DocumentStoreError::ReferenceCycle(path.to_string()));
            }
            if chain.len() > self.max_depth {
                return Err(DocumentStoreError::ReferenceCycle(format!(
                    "{path} (more than {} nested references)",
                    self.max_depth
                )));
            }
            let model = if model.is_abstract() {
                let subtype =
                    model.concrete_subtype(path.collection().collection_name().unwrap_or_default())?;
                log::debug!("reading {} as {}, a subtype of {}", path, subtype.name(), model.name());
                subtype
            } else {
                model.clone()
            };

            let Some(data) = document.into_data() else {
                return Err(DocumentStoreError::DocumentNotFound(
                    path.id().to_string(),
                    path.collection().to_string(),
                ));
            };

            let mut instance = Instance::empty(&model);
            for (column, stored) in data {
                let Some(field) = model.field_by_column(&column) else {
                    log::warn!(
                        "ignoring key `{}` of {} not declared by {}",
                        column,
                        path,
                        model.name()
                    );
                    continue;
                };

                let value = match (field.reference_target(), field.to_native(stored)?) {
                    (Some(target), Value::String(reference)) => {
                        let mut chain = chain.clone();
                        chain.push(path.clone());
                        Value::from(self.follow(target, &reference, chain).await?)
                    }
                    (_, value) => value,
                };

                instance.set_value(field.name(), value);
            }

            instance.set_id(Some(path.id().to_string()));
            instance.set_collection(Some(path.collection().clone()));

            Ok(instance)
        }
        .boxed()
    }

    async fn follow(
        &self,
        target: &Model,
        reference: &str,
        chain: Vec<DocumentPath>,
    ) -> DocumentStoreResult<Instance> {
        let path = DocumentPath::parse(reference)?;
        log::debug!("resolving reference {} as {}", path, target.name());

        let document = self.backend.get_document(&path).await?;
        if !document.exists() {
            return Err(DocumentStoreError::DanglingReference(path.to_string()));
        }

        self.resolve(target, document, chain).await
    }
}
