//! Convenient re-exports of commonly used types from docmodel.
//!
//! ```ignore
//! use docmodel::prelude::*;
//! ```
//!
//! This provides access to:
//! - Model declaration and registration
//! - Managers, query sets and pagination
//! - Native values and the `fields!` macro
//! - Store backends and builders
//! - Error types

pub use docmodel_core::{
    backend::{StoreBackend, StoreBackendBuilder, StoredDocument},
    config::StoreConfig,
    error::{DocumentStoreError, DocumentStoreResult},
    field::{Field, FieldKind, FieldOption},
    fields,
    manager::{DeleteReport, Manager, QuerySet},
    model::{Instance, Model, ModelSchema},
    page::{Page, Paginator},
    path::{CollectionPath, DocumentPath},
    query::{FieldOp, Filter, Query, QueryVisitor, Sort, SortDirection},
    registry::Registry,
    store::ModelStore,
    value::{GeoPoint, Value},
};
