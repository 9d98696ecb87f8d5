//! Schema-validated models over document stores.
//!
//! This crate is the primary entry point for users of docmodel. It re-exports the core
//! types from the sub-crates, the `Model` derive, and the storage backends, and it
//! establishes the process-wide connection that model instances use.
//!
//! # Features
//!
//! - **Declared fields** - String, number, list, date and boolean fields with size, required, unique and item type constraints
//! - **Validated assignment** - Invalid values are rejected when set, before anything reaches the store
//! - **Validated persistence** - Inserts and updates are checked against the model before dispatch
//! - **Multiple backends** - In-memory and MongoDB storage behind one backend trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::prelude::*;
//! use bson::doc;
//!
//! #[derive(Model)]
//! #[field(first_name, string, size = 20, required)]
//! #[field(age, number, required)]
//! pub struct User;
//!
//! #[tokio::main]
//! async fn main() -> ModelResult<()> {
//!     docmodel::connect("memory://", "app").await?;
//!
//!     // Stored in the `users` collection.
//!     let mut user = Instance::<User>::new(doc! { "first_name": "Alice", "age": 31 }).await?;
//!     user.save().await?;
//!
//!     // Rejected before the store is contacted: `age` is required.
//!     let users = user.collection();
//!     assert!(users.insert_one(doc! { "first_name": "Bob" }, None).await.is_err());
//!
//!     docmodel::close().await
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)

pub mod prelude;

pub use docmodel_core::{
    backend, collection, config, connection, constraint, error, field, model, naming, options, schema,
};
pub use docmodel_macros::Model;

// Re-export BSON types for convenience
pub use bson;

use docmodel_core::{
    backend::StoreBackendBuilder,
    config::ConnectionConfig,
    connection::{self as state, Connection},
    error::{ModelError, ModelResult},
};

/// In-memory storage backend implementations.
pub mod memory {
    pub use docmodel_memory::{InMemoryStore, InMemoryStoreBuilder, MemoryStoreError};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmodel_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}

/// Opens a connection for `config` without installing it.
///
/// The URI scheme selects the backend: `memory://` for [`memory::InMemoryStore`],
/// `mongodb://` and `mongodb+srv://` for the MongoDB backend.
///
/// # Errors
///
/// Returns [`ModelError::Configuration`] for an unknown scheme, or for a MongoDB URI
/// when the `mongodb` feature is disabled, and [`ModelError::Initialization`] if the
/// backend cannot be created.
pub async fn open(config: &ConnectionConfig) -> ModelResult<Connection> {
    match config.scheme() {
        Some("memory") => {
            let store = memory::InMemoryStore::builder()
                .namespace(&config.database)
                .build()
                .await?;

            Ok(Connection::new(store))
        }
        #[cfg(feature = "mongodb")]
        Some("mongodb" | "mongodb+srv") => {
            let store = crate::mongodb::MongoDbStore::builder(&config.uri, &config.database)
                .build()
                .await?;

            Ok(Connection::new(store))
        }
        #[cfg(not(feature = "mongodb"))]
        Some("mongodb" | "mongodb+srv") => Err(ModelError::Configuration(
            "MongoDB URIs require the `mongodb` feature".to_string(),
        )),
        _ => Err(ModelError::Configuration(format!(
            "unsupported connection URI `{}`",
            config.uri
        ))),
    }
}

/// Connects to `uri`, selecting `database`, and installs the connection process-wide.
pub async fn connect(uri: &str, database: &str) -> ModelResult<Connection> {
    connect_with(ConnectionConfig::new(uri, database)).await
}

/// Connects with `config` and installs the connection process-wide.
///
/// A previously installed connection is replaced and shut down. Handles still referring
/// to it, including instances created on it, report `NotConnected` from then on.
pub async fn connect_with(config: ConnectionConfig) -> ModelResult<Connection> {
    let connection = open(&config).await?;

    tracing::info!(database = %config.database, "connected");

    if let Some(previous) = state::install(connection.clone()).await {
        previous.shutdown().await?;
    }

    Ok(connection)
}

/// Removes the process-wide connection and shuts its backend down.
pub async fn close() -> ModelResult<()> {
    state::close().await
}
