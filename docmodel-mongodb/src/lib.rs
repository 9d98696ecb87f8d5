//! MongoDB backend implementation for docmodel.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait.
//! Filters, update documents and options are forwarded to the driver as written, and
//! driver errors reach the caller unchanged inside `ModelError::Backend`.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docmodel = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Connection
//!
//! The builder parses a standard `mongodb://` or `mongodb+srv://` connection string.
//! No connection is made until the first operation.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::{backend::StoreBackendBuilder, connection::Connection, mongodb::MongoDbStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStore::builder("mongodb://localhost:27017", "my_database")
//!         .build()
//!         .await?;
//!     let connection = Connection::new(store);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_mongodb;

pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
