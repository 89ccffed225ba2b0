//! A typed model layer over hierarchical, schemaless document stores.
//!
//! This crate is the core of the docmodel project and provides:
//!
//! - **Native values** ([`value`]) - The closed set of values a model field can hold
//! - **Field descriptors** ([`field`], [`validator`]) - Typed converters with per-kind options
//! - **Models** ([`model`], [`registry`]) - Schema declaration, metadata and instances
//! - **Collection paths** ([`path`]) - Hierarchical paths and nested base-path scoping
//! - **Store backend abstraction** ([`backend`], [`collection`]) - The interface backends implement
//! - **Queries** ([`query`], [`manager`], [`page`]) - Filter/order/limit building and execution
//! - **Materialization** ([`materialize`]) - Stored documents back into typed instances
//! - **Store** ([`store`], [`config`]) - The entry point binding models to a backend
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docmodel::prelude::*;
//!
//! let registry = Registry::new();
//! let user = registry.register(
//!     ModelSchema::builder("User")
//!         .field("name", Field::text().max_length(40))
//!         .field("age", Field::integer().blank()),
//! )?;
//!
//! let store = ModelStore::new(InMemoryStore::builder().build().await?);
//! let alice = store
//!     .objects(&user)?
//!     .create(fields! { "name" => "Alice", "age" => 31 })
//!     .await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_core;

pub mod backend;
pub mod collection;
pub mod config;
pub mod error;
pub mod field;
pub mod manager;
pub mod materialize;
pub mod model;
pub mod page;
pub mod path;
pub mod query;
pub mod registry;
pub mod store;
pub mod validator;
pub mod value;
