//! Main docmodel crate: typed models over hierarchical document stores.
//!
//! This crate is the primary entry point for users of the docmodel framework. It re-exports
//! the core types from the sub-crates and gives access to the storage backends.
//!
//! # Features
//!
//! - **Declared models** - Typed fields with defaults, required checks and length limits
//! - **Nested collections** - Models can live under a parent document, scoped or explicit
//! - **Django-style lookups** - `age__gte`, `address__city`, `tags__contains`
//! - **References** - Fields pointing at other documents, resolved on read
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let registry = Registry::new();
//!     let user = registry.register(
//!         ModelSchema::builder("User")
//!             .field("name", Field::text().max_length(40))
//!             .field("age", Field::integer().blank()),
//!     )?;
//!     let post = registry.register(
//!         ModelSchema::builder("Post")
//!             .field("title", Field::text())
//!             .field("author", Field::reference(&user)),
//!     )?;
//!
//!     let store = ModelStore::new(InMemoryStore::builder().build().await?);
//!     let users = store.objects(&user)?;
//!
//!     let alice = users.create(fields! { "name" => "Alice", "age" => 31 }).await?;
//!     store
//!         .objects(&post)?
//!         .create(fields! { "title" => "Hello", "author" => &alice })
//!         .await?;
//!
//!     let adults = users
//!         .filter(fields! { "age__gte" => 18 })?
//!         .order_by("-age")?
//!         .fetch()
//!         .await?;
//!     println!("{adults:?}");
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Nested collections
//!
//! A model can be placed under a saved parent instance, either for one manager:
//!
//! ```ignore
//! let orders = store.objects(&order)?.under(&alice)?;
//! orders.create(fields! { "total" => 12 }).await?;
//! ```
//!
//! or for every caller until the guard is dropped:
//!
//! ```ignore
//! let _scope = order.scoped_base_path(&alice)?;
//! store.objects(&order)?.create(fields! { "total" => 12 }).await?;
//! ```
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)

pub mod prelude;

pub use docmodel_core::{
    backend, collection, config, error, field, fields, manager, materialize, model, page, path,
    query, registry, store, validator, value,
};

// Re-export BSON and chrono types for convenience
pub use bson;
pub use chrono;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docmodel_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmodel_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
