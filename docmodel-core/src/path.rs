//! Hierarchical collection paths and base-path resolution for models.
//!
//! A collection path alternates collection names and document identifiers, always ending on a
//! collection name: `("users",)`, `("users", "4f2a…", "orders")`. A [`DocumentPath`] appends one
//! identifier to a collection path.
//!
//! Every concrete model carries a base path, initially `(collection_name,)`. The base path can be
//! rebound under a persisted parent instance with [`set_base_path`], which makes the model read
//! and write under `parent_path + (parent_id, collection_name)`. That binding is shared by every
//! caller using the model: concurrent callers rebinding the same model race. Callers that need
//! isolation use [`crate::manager::Manager::under`], which threads the path explicitly, or hold a
//! [`BasePathGuard`] from [`scoped_base_path`] so the previous binding is restored on drop.

use std::fmt::{self, Display};

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    model::{Instance, Model},
};

/// Separator used when a path is rendered or stored as a single string.
pub const PATH_SEPARATOR: char = '/';

/// An ordered sequence of path segments addressing a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct CollectionPath(Vec<String>);

impl CollectionPath {
    /// A top-level collection.
    pub fn root(collection_name: impl Into<String>) -> Self {
        Self(vec![collection_name.into()])
    }

    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Name of the innermost collection.
    pub fn collection_name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Path of the document `id` inside this collection.
    pub fn document(&self, id: impl Into<String>) -> DocumentPath {
        DocumentPath {
            collection: self.clone(),
            id: id.into(),
        }
    }

    /// Parses a slash-joined collection path. The segment count must be odd.
    pub fn parse(path: &str) -> DocumentStoreResult<Self> {
        let segments = split_segments(path)?;
        if segments.len() % 2 == 0 {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "`{path}` is not a collection path"
            )));
        }

        Ok(Self(segments))
    }
}

impl Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

/// The address of a single document: its collection path plus its identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath {
    collection: CollectionPath,
    id: String,
}

impl DocumentPath {
    pub fn new(collection: CollectionPath, id: impl Into<String>) -> Self {
        Self {
            collection,
            id: id.into(),
        }
    }

    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// A sub-collection nested under this document.
    pub fn child(&self, collection_name: impl Into<String>) -> CollectionPath {
        let mut segments = self.collection.0.clone();
        segments.push(self.id.clone());
        segments.push(collection_name.into());
        CollectionPath(segments)
    }

    /// Parses a slash-joined document path, the stored form of a reference.
    pub fn parse(path: &str) -> DocumentStoreResult<Self> {
        let mut segments = split_segments(path)?;
        if segments.len() % 2 != 0 {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "`{path}` is not a document path"
            )));
        }

        let id = segments.pop().unwrap_or_default();
        Ok(Self {
            collection: CollectionPath(segments),
            id,
        })
    }
}

impl Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

fn split_segments(path: &str) -> DocumentStoreResult<Vec<String>> {
    let segments = path
        .split(PATH_SEPARATOR)
        .map(str::to_string)
        .collect::<Vec<_>>();

    if segments.iter().any(String::is_empty) {
        return Err(DocumentStoreError::InvalidDocument(format!(
            "`{path}` contains an empty path segment"
        )));
    }

    Ok(segments)
}

/// Where an instance lives: the collection it belongs to and its identifier, if it has one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstancePath {
    pub collection: CollectionPath,
    pub id: Option<String>,
}

impl InstancePath {
    /// Path segments with the identifier slot, which is `None` for an unsaved instance.
    pub fn segments(&self) -> Vec<Option<&str>> {
        self.collection
            .segments()
            .iter()
            .map(|segment| Some(segment.as_str()))
            .chain(std::iter::once(self.id.as_deref()))
            .collect()
    }

    /// Number of non-null segments. Even exactly when the instance is addressable.
    pub fn concrete_len(&self) -> usize {
        self.collection.len() + usize::from(self.id.is_some())
    }

    pub fn to_document_path(&self) -> Option<DocumentPath> {
        self.id
            .as_ref()
            .map(|id| self.collection.document(id.clone()))
    }
}

/// Computes `type(instance).path + (instance.id,)`.
///
/// Instances that were loaded from or saved to an explicitly scoped collection report that
/// collection instead of the model's current base path.
pub fn model_path(instance: &Instance) -> InstancePath {
    InstancePath {
        collection: instance.collection_path(),
        id: instance.id().map(str::to_string),
    }
}

/// Computes the collection path `model` takes when nested under `parent`.
pub fn nested_path(model: &Model, parent: &Instance) -> DocumentStoreResult<CollectionPath> {
    if model.is_abstract() {
        return Err(DocumentStoreError::config(format!(
            "abstract model {} has no collection path",
            model.name()
        )));
    }

    let parent_path = model_path(parent);
    if parent_path.concrete_len() % 2 != 0 {
        return Err(DocumentStoreError::config(format!(
            "cannot nest {} under an unsaved {} instance",
            model.name(),
            parent.model().name()
        )));
    }

    match parent_path.to_document_path() {
        Some(document) => Ok(document.child(model.collection_name())),
        None => Err(DocumentStoreError::config(format!(
            "cannot nest {} under an unsaved {} instance",
            model.name(),
            parent.model().name()
        ))),
    }
}

/// Rebinds `model` to live under `parent` for every caller.
pub fn set_base_path(model: &Model, parent: &Instance) -> DocumentStoreResult<()> {
    let path = nested_path(model, parent)?;
    log::debug!("rebinding {} base path to {}", model.name(), path);
    model.replace_path(path);

    Ok(())
}

/// Restores `model` to its top-level collection.
pub fn reset_base_path(model: &Model) {
    if model.is_abstract() {
        return;
    }

    log::debug!("resetting {} base path", model.name());
    model.replace_path(CollectionPath::root(model.collection_name()));
}

/// Rebinds `model` under `parent` until the returned guard is dropped.
pub fn scoped_base_path(model: &Model, parent: &Instance) -> DocumentStoreResult<BasePathGuard> {
    let path = nested_path(model, parent)?;
    log::debug!("scoping {} base path to {}", model.name(), path);
    let previous = model.replace_path(path);

    Ok(BasePathGuard {
        model: model.clone(),
        previous: Some(previous),
    })
}

/// Restores a model's previous base path when dropped.
#[must_use = "the base path is restored as soon as the guard is dropped"]
#[derive(Debug)]
pub struct BasePathGuard {
    model: Model,
    previous: Option<CollectionPath>,
}

impl BasePathGuard {
    pub fn model(&self) -> &Model {
        &self.model
    }
}

impl Drop for BasePathGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            log::debug!("restoring {} base path to {}", self.model.name(), previous);
            self.model.replace_path(previous);
        }
    }
}
