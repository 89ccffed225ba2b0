//! Model declaration, per-model metadata and model instances.
//!
//! A model is declared once through a [`ModelSchema`] and registered with a
//! [`Registry`](crate::registry::Registry), which turns the schema into a [`Model`]: a cheap,
//! shareable handle on the model's metadata (ordered field descriptors, managers, abstractness,
//! collection name and current base path).
//!
//! ```ignore
//! let registry = Registry::new();
//!
//! let timestamped = registry.register(
//!     ModelSchema::builder("Timestamped")
//!         .abstract_model(true)
//!         .field("created", Field::timestamp().blank()),
//! )?;
//!
//! let user = registry.register(
//!     ModelSchema::builder("User")
//!         .extends(&timestamped)
//!         .field("name", Field::text().max_length(40))
//!         .field("active", Field::boolean().default(true)),
//! )?;
//!
//! assert_eq!(user.collection_name(), "user");
//! ```

use heck::ToSnakeCase;
use parking_lot::RwLock;
use std::{
    collections::{BTreeMap, HashSet},
    fmt,
    sync::{Arc, Weak},
};

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    field::Field,
    path::{self, BasePathGuard, CollectionPath, DocumentPath, InstancePath, PATH_SEPARATOR},
    value::Value,
};

/// Name of the identifier field every concrete model receives.
pub const PRIMARY_KEY: &str = "id";

/// Name of the manager attached when a model declares none.
pub const DEFAULT_MANAGER: &str = "objects";

/// Separator between a field name and its sub-fields or operator in filter keys.
pub const LOOKUP_SEPARATOR: &str = "__";

/// The declaration of a model, consumed by registration.
#[derive(Debug, Clone)]
pub struct ModelSchema {
    type_name: String,
    collection_name: Option<String>,
    is_abstract: bool,
    parents: Vec<Model>,
    fields: Vec<(String, Field)>,
    managers: Vec<String>,
}

impl ModelSchema {
    pub fn builder(type_name: impl Into<String>) -> ModelSchemaBuilder {
        ModelSchemaBuilder::new(type_name)
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

#[derive(Debug, Clone)]
pub struct ModelSchemaBuilder {
    schema: ModelSchema,
}

impl ModelSchemaBuilder {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            schema: ModelSchema {
                type_name: type_name.into(),
                collection_name: None,
                is_abstract: false,
                parents: Vec::new(),
                fields: Vec::new(),
                managers: Vec::new(),
            },
        }
    }

    /// Declares a field. Declaration order is kept.
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.schema.fields.push((name.into(), field));
        self
    }

    /// Inherits the fields of an abstract model.
    pub fn extends(mut self, parent: &Model) -> Self {
        self.schema.parents.push(parent.clone());
        self
    }

    pub fn abstract_model(mut self, is_abstract: bool) -> Self {
        self.schema.is_abstract = is_abstract;
        self
    }

    /// Overrides the snake-case collection name derived from the type name.
    pub fn collection_name(mut self, collection_name: impl Into<String>) -> Self {
        self.schema.collection_name = Some(collection_name.into());
        self
    }

    /// Declares a named manager. The default manager is only attached when none is declared.
    pub fn manager(mut self, name: impl Into<String>) -> Self {
        self.schema.managers.push(name.into());
        self
    }

    pub fn build(self) -> ModelSchema {
        self.schema
    }
}

impl From<ModelSchemaBuilder> for ModelSchema {
    fn from(builder: ModelSchemaBuilder) -> Self {
        builder.build()
    }
}

struct ModelMeta {
    type_name: String,
    collection_name: String,
    is_abstract: bool,
    parent: Option<Model>,
    fields: Vec<Field>,
    managers: Vec<String>,
    path: RwLock<CollectionPath>,
    children: RwLock<Vec<Weak<ModelMeta>>>,
}

/// Handle on a registered model's metadata. Clones share the same metadata.
#[derive(Clone)]
pub struct Model(Arc<ModelMeta>);

impl Model {
    pub(crate) fn from_schema(schema: ModelSchema) -> DocumentStoreResult<Self> {
        let ModelSchema {
            type_name,
            collection_name,
            is_abstract,
            parents,
            fields: declared,
            managers: declared_managers,
        } = schema;

        if type_name.is_empty() {
            return Err(DocumentStoreError::config("model type name must not be empty"));
        }

        let parent = match parents.as_slice() {
            [] => None,
            [parent] if parent.is_abstract() => Some(parent.clone()),
            [parent] => {
                return Err(DocumentStoreError::config(format!(
                    "{type_name} cannot inherit from a non-abstract model {}",
                    parent.name()
                )));
            }
            _ => {
                return Err(DocumentStoreError::config(format!(
                    "{type_name} declares more than one parent model"
                )));
            }
        };

        let collection_name = collection_name.unwrap_or_else(|| type_name.to_snake_case());

        let mut fields = parent
            .iter()
            .flat_map(|parent| parent.fields().iter().filter(|field| !field.is_id()))
            .map(|field| {
                let mut field = field.clone();
                let name = field.name().to_string();
                field.bind(&type_name, &name);
                field
            })
            .collect::<Vec<_>>();

        let mut declared_names = HashSet::new();
        for (name, mut field) in declared {
            if field.is_id() || name == PRIMARY_KEY {
                return Err(DocumentStoreError::config(format!(
                    "{type_name}.{name}: the identifier field is added automatically and cannot be declared"
                )));
            }
            if name.is_empty() || name.contains(LOOKUP_SEPARATOR) {
                return Err(DocumentStoreError::config(format!(
                    "{type_name}: invalid field name `{name}`"
                )));
            }
            if !declared_names.insert(name.clone()) {
                return Err(DocumentStoreError::config(format!(
                    "{type_name}.{name} is declared more than once"
                )));
            }

            field.bind(&type_name, &name);
            field.check_options()?;

            match fields.iter_mut().find(|existing| existing.name() == name) {
                Some(inherited) => *inherited = field,
                None => fields.push(field),
            }
        }

        let mut columns = HashSet::new();
        if let Some(field) = fields.iter().find(|field| !columns.insert(field.column().to_string())) {
            return Err(DocumentStoreError::config(format!(
                "{type_name}: column `{}` is used by more than one field",
                field.column()
            )));
        }

        let mut managers = Vec::new();
        for manager in declared_managers {
            if managers.contains(&manager) || fields.iter().any(|field| field.name() == manager) {
                return Err(DocumentStoreError::config(format!(
                    "{type_name}: manager `{manager}` clashes with another attribute"
                )));
            }
            managers.push(manager);
        }
        if managers.is_empty() {
            managers.push(DEFAULT_MANAGER.to_string());
        }

        let path = if is_abstract {
            CollectionPath::default()
        } else {
            if collection_name.is_empty() || collection_name.contains(PATH_SEPARATOR) {
                return Err(DocumentStoreError::config(format!(
                    "{type_name}: invalid collection name `{collection_name}`"
                )));
            }

            let mut id = Field::id();
            id.bind(&type_name, PRIMARY_KEY);
            fields.push(id);

            CollectionPath::root(collection_name.clone())
        };

        log::debug!(
            "declared model {} (abstract: {}, collection: {}, fields: {})",
            type_name,
            is_abstract,
            collection_name,
            fields.len()
        );

        let model = Model(Arc::new(ModelMeta {
            type_name,
            collection_name,
            is_abstract,
            parent,
            fields,
            managers,
            path: RwLock::new(path),
            children: RwLock::new(Vec::new()),
        }));
        if let Some(parent) = model.parent() {
            let mut children = parent.0.children.write();
            children.retain(|child| child.strong_count() > 0);
            children.push(Arc::downgrade(&model.0));
        }

        Ok(model)
    }

    pub fn name(&self) -> &str {
        &self.0.type_name
    }

    pub fn collection_name(&self) -> &str {
        &self.0.collection_name
    }

    pub fn is_abstract(&self) -> bool {
        self.0.is_abstract
    }

    /// Field descriptors in declaration order, inherited fields first, identifier last.
    pub fn fields(&self) -> &[Field] {
        &self.0.fields
    }

    pub fn find_field(&self, name: &str) -> Option<&Field> {
        self.0
            .fields
            .iter()
            .find(|field| field.name() == name)
    }

    pub fn field(&self, name: &str) -> DocumentStoreResult<&Field> {
        self.find_field(name).ok_or_else(|| {
            DocumentStoreError::config(format!("{} has no field {}", self.name(), name))
        })
    }

    /// The field stored under `column` in a backend document.
    pub fn field_by_column(&self, column: &str) -> Option<&Field> {
        self.0
            .fields
            .iter()
            .filter(|field| !field.is_id())
            .find(|field| field.column() == column)
    }

    /// The identifier field; `None` for abstract models.
    pub fn primary_key(&self) -> Option<&Field> {
        self.0.fields.iter().find(|field| field.is_id())
    }

    pub fn managers(&self) -> &[String] {
        &self.0.managers
    }

    pub fn has_manager(&self, name: &str) -> bool {
        self.0
            .managers
            .iter()
            .any(|manager| manager == name)
    }

    pub fn parent(&self) -> Option<&Model> {
        self.0.parent.as_ref()
    }

    /// Whether this model is `other` or inherits from it.
    pub fn is_subtype_of(&self, other: &Model) -> bool {
        let mut current = Some(self);
        while let Some(model) = current {
            if model == other {
                return true;
            }
            current = model.parent();
        }
        false
    }

    /// Live models declared with this one as their parent.
    pub fn children(&self) -> Vec<Model> {
        self.0
            .children
            .read()
            .iter()
            .filter_map(Weak::upgrade)
            .map(Model)
            .collect()
    }

    /// The concrete model stored in `collection_name` that is this model or inherits from it.
    ///
    /// Used to pick the model a stored reference to an abstract target is read back as.
    pub fn concrete_subtype(&self, collection_name: &str) -> DocumentStoreResult<Model> {
        let mut pending = vec![self.clone()];
        let mut found = Vec::new();
        while let Some(model) = pending.pop() {
            if !model.is_abstract() && model.collection_name() == collection_name {
                found.push(model.clone());
            }
            pending.extend(model.children());
        }

        match found.as_slice() {
            [model] => Ok(model.clone()),
            [] => Err(DocumentStoreError::config(format!(
                "no model derived from {} is stored in collection `{collection_name}`",
                self.name()
            ))),
            _ => Err(DocumentStoreError::config(format!(
                "collection `{collection_name}` is ambiguous for {}: {}",
                self.name(),
                found.iter().map(Model::name).collect::<Vec<_>>().join(", ")
            ))),
        }
    }

    /// The current base path. Empty for abstract models.
    pub fn path(&self) -> CollectionPath {
        self.0.path.read().clone()
    }

    pub(crate) fn replace_path(&self, path: CollectionPath) -> CollectionPath {
        std::mem::replace(&mut *self.0.path.write(), path)
    }

    /// Rebinds this model under `parent` for every caller. See [`path::set_base_path`].
    pub fn set_base_path(&self, parent: &Instance) -> DocumentStoreResult<()> {
        path::set_base_path(self, parent)
    }

    pub fn reset_base_path(&self) {
        path::reset_base_path(self)
    }

    /// Rebinds this model under `parent` until the guard is dropped.
    pub fn scoped_base_path(&self, parent: &Instance) -> DocumentStoreResult<BasePathGuard> {
        path::scoped_base_path(self, parent)
    }

    /// Constructs an unsaved instance without touching the store.
    ///
    /// Omitted fields take their configured default, or null. The identifier starts null
    /// unless supplied.
    pub fn new_instance(&self, values: Vec<(String, Value)>) -> DocumentStoreResult<Instance> {
        if self.is_abstract() {
            return Err(DocumentStoreError::config(format!(
                "Can't create instance of abstract model {}",
                self.name()
            )));
        }

        let mut instance = Instance::empty(self);
        for (name, value) in values {
            instance.set(&name, value)?;
        }
        for field in self.fields() {
            if let (Some(default), Some(slot)) =
                (field.default_value(), instance.values.get_mut(field.name()))
            {
                if slot.is_null() {
                    *slot = default.clone();
                }
            }
        }

        Ok(instance)
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Model {}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.0.type_name)
            .field("collection_name", &self.0.collection_name)
            .field("abstract", &self.0.is_abstract)
            .field("path", &*self.0.path.read())
            .finish()
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One in-memory record of a concrete model.
#[derive(Clone)]
pub struct Instance {
    model: Model,
    values: BTreeMap<String, Value>,
    collection: Option<CollectionPath>,
}

impl Instance {
    pub(crate) fn empty(model: &Model) -> Self {
        Self {
            model: model.clone(),
            values: model
                .fields()
                .iter()
                .map(|field| (field.name().to_string(), Value::Null))
                .collect(),
            collection: None,
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// The identifier, `None` until the instance is saved or loaded.
    pub fn id(&self) -> Option<&str> {
        self.values
            .get(PRIMARY_KEY)
            .and_then(Value::as_str)
    }

    /// The value of a field; `None` for names the model does not declare.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Assigns a field. Values are validated when the instance is written, except the
    /// identifier, which is canonicalized to a string immediately.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> DocumentStoreResult<()> {
        let field = self.model.field(name)?;
        let value = value.into();
        let value = if field.is_id() {
            field.to_native(field.to_stored(&value)?)?
        } else {
            value
        };

        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Declared non-identifier fields and their values, in declaration order.
    pub fn values(&self) -> Vec<(&str, &Value)> {
        self.model
            .fields()
            .iter()
            .filter(|field| !field.is_id())
            .map(|field| (field.name(), self.slot(field.name())))
            .collect()
    }

    /// Every field including the identifier, in declaration order.
    pub fn fields(&self) -> Vec<(&str, &Value)> {
        self.model
            .fields()
            .iter()
            .map(|field| (field.name(), self.slot(field.name())))
            .collect()
    }

    fn slot(&self, name: &str) -> &Value {
        const NULL: &Value = &Value::Null;
        self.values.get(name).unwrap_or(NULL)
    }

    /// The collection this instance was loaded from or saved to, else the model's base path.
    pub fn collection_path(&self) -> CollectionPath {
        self.collection
            .clone()
            .unwrap_or_else(|| self.model.path())
    }

    pub fn model_path(&self) -> InstancePath {
        path::model_path(self)
    }

    /// Address of the stored document. Fails for unsaved instances.
    pub fn document_path(&self) -> DocumentStoreResult<DocumentPath> {
        self.model_path().to_document_path().ok_or_else(|| {
            DocumentStoreError::config(format!(
                "{} instance has no identifier, save it before referencing it",
                self.model.name()
            ))
        })
    }

    pub(crate) fn set_id(&mut self, id: Option<String>) {
        self.values.insert(
            PRIMARY_KEY.to_string(),
            id.map(Value::String).unwrap_or(Value::Null),
        );
    }

    /// The collection this instance was loaded from or saved to, if any.
    pub fn stored_collection(&self) -> Option<&CollectionPath> {
        self.collection.as_ref()
    }

    pub(crate) fn set_collection(&mut self, collection: Option<CollectionPath>) {
        self.collection = collection;
    }

    pub(crate) fn set_value(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.model == other.model && self.values == other.values
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct(self.model.name());
        for (name, value) in self.fields() {
            debug.field(name, value);
        }
        debug.finish()
    }
}
