//! In-memory document storage backend for docmodel.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is meant for
//! development, tests and small embedded deployments.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Query documents** - Equality, comparison, membership and logical operators with dotted paths
//! - **Update operators** - `$set`, `$unset`, `$inc`, `$push` and `$setOnInsert`, with upserts
//! - **Unique indexes** - Duplicate values are rejected with `ModelError::DuplicateKey`
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{connection::Connection, memory::InMemoryStore, model::Instance};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder().namespace("app").build().await?;
//!     let connection = Connection::new(backend);
//!
//!     let mut user = Instance::<User>::with_connection(connection, doc! { "first_name": "Ann", "age": 31 })?;
//!     user.save().await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_memory;

pub mod error;
mod evaluator;
pub mod store;
mod update;

pub use error::MemoryStoreError;
pub use store::{InMemoryStore, InMemoryStoreBuilder};
