//! In-memory document storage backend for docmodel.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait
//! with hierarchical collection paths. It is meant for development, tests and small
//! single-process deployments.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using an async-aware RwLock
//! - **Sub-collections** - Any document can hold nested collections
//! - **Full query support** - Conjunctive filters, multi-key sorting, limits and cursors
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Registry::new();
//!     let user = registry.register(ModelSchema::builder("User").field("name", Field::text()))?;
//!
//!     let store = ModelStore::new(InMemoryStore::builder().build().await?);
//!     store.objects(&user)?.create(fields! { "name" => "Alice" }).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_memory;

pub mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
