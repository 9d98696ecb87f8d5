//! Storage backend abstraction for model persistence.
//!
//! This module defines the traits that abstract over document store drivers, allowing
//! models to be persisted to any store that can execute the standard single- and
//! multi-document operations.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`DynStoreBackend`]: A trait for dynamic dispatch over backend implementations
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! Backends receive filters and update documents exactly as the caller wrote them.
//! Validation happens in the facade ([`crate::collection::ModelCollection`]) before a
//! backend is ever called, so backends never see a payload that failed validation
//! unless the caller bypassed it.

use async_trait::async_trait;
use bson::Document;
use std::fmt::Debug;

use crate::{
    error::ModelResult,
    options::{
        DeleteOptions, DeleteResult, FindOneOptions, FindOptions, InsertManyOptions,
        InsertManyResult, InsertOneOptions, InsertOneResult, UpdateOptions, UpdateResult,
    },
};

/// Abstract interface for document store drivers.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from multiple
/// async tasks. Whether concurrent writes to the same document are safe is up to the
/// underlying store.
///
/// # Error Handling
///
/// Driver errors should be returned through [`ModelError::backend`](crate::error::ModelError::backend)
/// so callers can recover the original error by downcasting.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Name of the logical database this backend is bound to.
    fn namespace(&self) -> &str;

    /// Returns every document in `collection` matching `filter`.
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> ModelResult<Vec<Document>>;

    /// Returns the first document in `collection` matching `filter`, if any.
    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        options: FindOneOptions,
    ) -> ModelResult<Option<Document>>;

    /// Inserts a single document. A missing `_id` is generated by the backend.
    async fn insert_one(
        &self,
        collection: &str,
        document: Document,
        options: InsertOneOptions,
    ) -> ModelResult<InsertOneResult>;

    /// Inserts a batch of documents.
    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
        options: InsertManyOptions,
    ) -> ModelResult<InsertManyResult>;

    /// Applies `update` to the first document matching `filter`.
    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> ModelResult<UpdateResult>;

    /// Applies `update` to every document matching `filter`.
    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> ModelResult<UpdateResult>;

    /// Deletes the first document matching `filter`.
    async fn delete_one(
        &self,
        collection: &str,
        filter: Document,
        options: DeleteOptions,
    ) -> ModelResult<DeleteResult>;

    /// Deletes every document matching `filter`.
    async fn delete_many(
        &self,
        collection: &str,
        filter: Document,
        options: DeleteOptions,
    ) -> ModelResult<DeleteResult>;

    /// Creates an ascending index on `field`, optionally enforcing uniqueness.
    ///
    /// If `unique` is true and existing documents violate the constraint, the backend
    /// may return an error.
    async fn create_index(&self, collection: &str, field: &str, unique: bool) -> ModelResult<()>;

    /// Drops a collection and all its documents.
    async fn drop_collection(&self, name: &str) -> ModelResult<()>;

    /// Lists the names of all collections in the namespace.
    async fn list_collections(&self) -> ModelResult<Vec<String>>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// Called at most once per [`Connection`](crate::connection::Connection), even while
    /// other handles to the backend are alive. The default implementation is a no-op,
    /// but backends with external connections should override this.
    async fn shutdown(&self) -> ModelResult<()> {
        Ok(())
    }
}

#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    fn namespace(&self) -> &str;
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> ModelResult<Vec<Document>>;
    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        options: FindOneOptions,
    ) -> ModelResult<Option<Document>>;
    async fn insert_one(
        &self,
        collection: &str,
        document: Document,
        options: InsertOneOptions,
    ) -> ModelResult<InsertOneResult>;
    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
        options: InsertManyOptions,
    ) -> ModelResult<InsertManyResult>;
    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> ModelResult<UpdateResult>;
    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> ModelResult<UpdateResult>;
    async fn delete_one(
        &self,
        collection: &str,
        filter: Document,
        options: DeleteOptions,
    ) -> ModelResult<DeleteResult>;
    async fn delete_many(
        &self,
        collection: &str,
        filter: Document,
        options: DeleteOptions,
    ) -> ModelResult<DeleteResult>;
    async fn create_index(&self, collection: &str, field: &str, unique: bool) -> ModelResult<()>;
    async fn drop_collection(&self, name: &str) -> ModelResult<()>;
    async fn list_collections(&self) -> ModelResult<Vec<String>>;
    async fn shutdown(&self) -> ModelResult<()>;
}

#[async_trait]
impl<B: StoreBackend + Send + Sync + 'static> DynStoreBackend for B {
    fn namespace(&self) -> &str {
        StoreBackend::namespace(self)
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> ModelResult<Vec<Document>> {
        StoreBackend::find(self, collection, filter, options).await
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        options: FindOneOptions,
    ) -> ModelResult<Option<Document>> {
        StoreBackend::find_one(self, collection, filter, options).await
    }

    async fn insert_one(
        &self,
        collection: &str,
        document: Document,
        options: InsertOneOptions,
    ) -> ModelResult<InsertOneResult> {
        StoreBackend::insert_one(self, collection, document, options).await
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
        options: InsertManyOptions,
    ) -> ModelResult<InsertManyResult> {
        StoreBackend::insert_many(self, collection, documents, options).await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> ModelResult<UpdateResult> {
        StoreBackend::update_one(self, collection, filter, update, options).await
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> ModelResult<UpdateResult> {
        StoreBackend::update_many(self, collection, filter, update, options).await
    }

    async fn delete_one(
        &self,
        collection: &str,
        filter: Document,
        options: DeleteOptions,
    ) -> ModelResult<DeleteResult> {
        StoreBackend::delete_one(self, collection, filter, options).await
    }

    async fn delete_many(
        &self,
        collection: &str,
        filter: Document,
        options: DeleteOptions,
    ) -> ModelResult<DeleteResult> {
        StoreBackend::delete_many(self, collection, filter, options).await
    }

    async fn create_index(&self, collection: &str, field: &str, unique: bool) -> ModelResult<()> {
        StoreBackend::create_index(self, collection, field, unique).await
    }

    async fn drop_collection(&self, name: &str) -> ModelResult<()> {
        StoreBackend::drop_collection(self, name).await
    }

    async fn list_collections(&self) -> ModelResult<Vec<String>> {
        StoreBackend::list_collections(self).await
    }

    async fn shutdown(&self) -> ModelResult<()> {
        StoreBackend::shutdown(self).await
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> ModelResult<Self::Backend>;
}
