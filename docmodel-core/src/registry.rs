use dashmap::{DashMap, mapref::entry::Entry};

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    model::{Model, ModelSchema},
};

/// Declared models keyed by type name.
#[derive(Debug, Default)]
pub struct Registry {
    models: DashMap<String, Model>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the model's metadata from `schema` and records it.
    ///
    /// Fails with a configuration error when the declaration is invalid or a model with the
    /// same type name is already registered.
    pub fn register(&self, schema: impl Into<ModelSchema>) -> DocumentStoreResult<Model> {
        let schema = schema.into();

        match self.models.entry(schema.type_name().to_string()) {
            Entry::Occupied(entry) => Err(DocumentStoreError::config(format!(
                "model {} is already registered",
                entry.key()
            ))),
            Entry::Vacant(entry) => {
                let model = Model::from_schema(schema)?;
                entry.insert(model.clone());
                Ok(model)
            }
        }
    }

    pub fn get(&self, type_name: &str) -> Option<Model> {
        self.models
            .get(type_name)
            .map(|entry| entry.value().clone())
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.models.contains_key(type_name)
    }

    /// Every registered model, in no particular order.
    pub fn models(&self) -> Vec<Model> {
        self.models
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}
