//! The persistence facade: validated pass-through to a backend collection.
//!
//! [`ModelCollection`] is bound to one collection and typed by the model whose schema
//! guards it. Reads go straight to the backend. Writes are validated against the
//! model's declared fields first, unless the caller sets
//! `bypass_document_validation`; a payload that fails validation never reaches the
//! backend.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::prelude::*;
//! use bson::doc;
//!
//! let users = connection.collection::<User>();
//! users.insert_one(doc! { "first_name": "Ann", "age": 31 }, None).await?;
//!
//! // Rejected before any network call: `age` is required.
//! assert!(users.insert_one(doc! { "first_name": "Bob" }, None).await.is_err());
//! ```

use std::{fmt, marker::PhantomData};

use bson::{Bson, Document};

use crate::{
    connection::Connection,
    constraint::type_name,
    error::{ModelError, ModelResult},
    options::{
        DeleteOptions, DeleteResult, FindOneOptions, FindOptions, InsertManyOptions,
        InsertManyResult, InsertOneOptions, InsertOneResult, UpdateOptions, UpdateResult,
    },
    schema::{Model, Schema},
};

/// A collection guarded by the schema of `M`.
pub struct ModelCollection<M: Model> {
    name: String,
    connection: Connection,
    _marker: PhantomData<fn() -> M>,
}

impl<M: Model> ModelCollection<M> {
    pub(crate) fn new(name: String, connection: Connection) -> Self {
        Self {
            name,
            connection,
            _marker: PhantomData,
        }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn schema(&self) -> &'static Schema {
        M::schema()
    }

    fn check(&self, operation: &'static str, bypass: Option<bool>, validate: impl FnOnce(&Schema) -> ModelResult<()>) -> ModelResult<()> {
        if bypass == Some(true) {
            tracing::warn!(collection = %self.name, operation, "document validation bypassed");
            return Ok(());
        }

        validate(M::schema()).inspect_err(|err| {
            tracing::debug!(collection = %self.name, operation, error = %err, "document rejected");
        })
    }

    /// Returns every document matching `filter`. No validation is applied.
    pub async fn find(
        &self,
        filter: impl Into<Option<Document>>,
        options: impl Into<Option<FindOptions>>,
    ) -> ModelResult<Vec<Document>> {
        tracing::debug!(collection = %self.name, "find");

        self.connection
            .open_backend()?
            .find(
                &self.name,
                filter.into().unwrap_or_default(),
                options.into().unwrap_or_default(),
            )
            .await
    }

    /// Returns the first document matching `filter`, or the first document of the
    /// collection when no filter is given. No validation is applied.
    pub async fn find_one(
        &self,
        filter: impl Into<Option<Document>>,
        options: impl Into<Option<FindOneOptions>>,
    ) -> ModelResult<Option<Document>> {
        tracing::debug!(collection = %self.name, "find_one");

        self.connection
            .open_backend()?
            .find_one(
                &self.name,
                filter.into().unwrap_or_default(),
                options.into().unwrap_or_default(),
            )
            .await
    }

    /// Inserts one document after validating every declared field.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Validation`] without contacting the backend if a declared
    /// field is missing or invalid, or the backend's error if the insert fails.
    pub async fn insert_one(
        &self,
        document: Document,
        options: impl Into<Option<InsertOneOptions>>,
    ) -> ModelResult<InsertOneResult> {
        let options = options.into().unwrap_or_default();

        self.check("insert_one", options.bypass_document_validation, |schema| {
            Ok(schema.validate_document(&document)?)
        })?;

        tracing::debug!(collection = %self.name, "insert_one");

        self.connection
            .open_backend()?
            .insert_one(&self.name, document, options)
            .await
    }

    /// Inserts a batch of documents after validating each of them.
    ///
    /// `documents` must convert into a BSON array of documents (a `Vec<Document>` does).
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotIterable`] before any validation if `documents` is not an
    /// array of documents, and [`ModelError::Validation`] for the first invalid document.
    pub async fn insert_many(
        &self,
        documents: impl Into<Bson>,
        options: impl Into<Option<InsertManyOptions>>,
    ) -> ModelResult<InsertManyResult> {
        let documents = into_documents(documents.into())?;
        let options = options.into().unwrap_or_default();

        self.check("insert_many", options.bypass_document_validation, |schema| {
            documents
                .iter()
                .try_for_each(|document| schema.validate_document(document))
                .map_err(ModelError::from)
        })?;

        tracing::debug!(collection = %self.name, count = documents.len(), "insert_many");

        self.connection
            .open_backend()?
            .insert_many(&self.name, documents, options)
            .await
    }

    /// Updates the first document matching `filter` after validating `update`.
    ///
    /// With `upsert`, the document that would be inserted is validated too.
    pub async fn update_one(
        &self,
        filter: Document,
        update: Document,
        options: impl Into<Option<UpdateOptions>>,
    ) -> ModelResult<UpdateResult> {
        let options = options.into().unwrap_or_default();

        self.check("update_one", options.bypass_document_validation, |schema| {
            Ok(match options.upsert {
                Some(true) => schema.validate_upsert(&filter, &update)?,
                _ => schema.validate_update(&update)?,
            })
        })?;

        tracing::debug!(collection = %self.name, "update_one");

        self.connection
            .open_backend()?
            .update_one(&self.name, filter, update, options)
            .await
    }

    /// Updates every document matching `filter` after validating `update`.
    pub async fn update_many(
        &self,
        filter: Document,
        update: Document,
        options: impl Into<Option<UpdateOptions>>,
    ) -> ModelResult<UpdateResult> {
        let options = options.into().unwrap_or_default();

        self.check("update_many", options.bypass_document_validation, |schema| {
            Ok(match options.upsert {
                Some(true) => schema.validate_upsert(&filter, &update)?,
                _ => schema.validate_update(&update)?,
            })
        })?;

        tracing::debug!(collection = %self.name, "update_many");

        self.connection
            .open_backend()?
            .update_many(&self.name, filter, update, options)
            .await
    }

    pub async fn delete_one(
        &self,
        filter: Document,
        options: impl Into<Option<DeleteOptions>>,
    ) -> ModelResult<DeleteResult> {
        tracing::debug!(collection = %self.name, "delete_one");

        self.connection
            .open_backend()?
            .delete_one(&self.name, filter, options.into().unwrap_or_default())
            .await
    }

    pub async fn delete_many(
        &self,
        filter: Document,
        options: impl Into<Option<DeleteOptions>>,
    ) -> ModelResult<DeleteResult> {
        tracing::debug!(collection = %self.name, "delete_many");

        self.connection
            .open_backend()?
            .delete_many(&self.name, filter, options.into().unwrap_or_default())
            .await
    }

    /// Creates a unique index for every declared field configured with `unique = true`.
    pub async fn ensure_indexes(&self) -> ModelResult<()> {
        for descriptor in M::schema().unique_fields() {
            tracing::debug!(collection = %self.name, field = descriptor.name(), "creating unique index");

            self.connection
                .open_backend()?
                .create_index(&self.name, descriptor.name(), true)
                .await?;
        }

        Ok(())
    }
}

impl<M: Model> Clone for ModelCollection<M> {
    fn clone(&self) -> Self {
        Self::new(self.name.clone(), self.connection.clone())
    }
}

impl<M: Model> fmt::Debug for ModelCollection<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCollection")
            .field("model", &M::schema().model_name())
            .field("name", &self.name)
            .finish()
    }
}

fn into_documents(documents: Bson) -> ModelResult<Vec<Document>> {
    match documents {
        Bson::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Bson::Document(document) => Ok(document),
                other => Err(ModelError::NotIterable(format!(
                    "item {index} is {}, expected a document",
                    type_name(&other)
                ))),
            })
            .collect(),
        other => Err(ModelError::NotIterable(format!(
            "documents should be an array of documents, got {}",
            type_name(&other)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use std::sync::{LazyLock, Mutex};

    use crate::{
        error::ValidationKind,
        field::{NumberField, StringField},
        testing::RecordingBackend,
    };

    struct User;

    impl Model for User {
        fn schema() -> &'static Schema {
            static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
                Schema::builder("User")
                    .collection_name("users")
                    .field("first_name", StringField::new(doc! { "size": 20, "required": true }))
                    .field("age", NumberField::new(doc! { "required": true }))
                    .build()
                    .unwrap()
            });

            &SCHEMA
        }
    }

    fn users() -> (ModelCollection<User>, std::sync::Arc<Mutex<Vec<String>>>) {
        let backend = RecordingBackend::default();
        let calls = backend.calls();

        (Connection::new(backend).collection::<User>(), calls)
    }

    #[tokio::test]
    async fn test_insert_one_validates_before_dispatch() {
        let (users, calls) = users();

        let err = users
            .insert_one(doc! { "first_name": "Ann" }, None)
            .await
            .unwrap_err();

        assert_eq!(err.as_validation().unwrap().field, "age");
        assert!(calls.lock().unwrap().is_empty());

        users
            .insert_one(doc! { "first_name": "Ann", "age": 30 }, None)
            .await
            .unwrap();

        assert_eq!(*calls.lock().unwrap(), ["insert_one users"]);
    }

    #[tokio::test]
    async fn test_bypass_skips_validation() {
        let (users, calls) = users();

        users
            .insert_one(doc! {}, InsertOneOptions::bypass_validation())
            .await
            .unwrap();
        users
            .update_one(doc! {}, doc! { "$unset": { "age": "" } }, UpdateOptions::bypass_validation())
            .await
            .unwrap();

        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_insert_many_requires_a_sequence() {
        let (users, calls) = users();

        assert!(matches!(
            users.insert_many(doc! { "first_name": "Ann", "age": 1 }, None).await,
            Err(ModelError::NotIterable(_))
        ));
        assert!(matches!(
            users.insert_many(42, None).await,
            Err(ModelError::NotIterable(_))
        ));
        // Shape is checked before validation, even when validation is bypassed.
        assert!(matches!(
            users.insert_many(bson::bson!([1, 2]), InsertManyOptions::bypass_validation()).await,
            Err(ModelError::NotIterable(_))
        ));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_many_validates_each_document() {
        let (users, calls) = users();

        let err = users
            .insert_many(
                vec![
                    doc! { "first_name": "Ann", "age": 1 },
                    doc! { "first_name": "A name well beyond twenty", "age": 2 },
                ],
                None,
            )
            .await
            .unwrap_err();

        assert_eq!(err.as_validation().unwrap().kind, ValidationKind::Size);
        assert!(calls.lock().unwrap().is_empty());

        let result = users
            .insert_many(
                vec![doc! { "first_name": "Ann", "age": 1 }, doc! { "first_name": "Bob", "age": 2 }],
                None,
            )
            .await
            .unwrap();

        assert_eq!(result.inserted_ids.len(), 2);
    }

    #[tokio::test]
    async fn test_update_validation() {
        let (users, calls) = users();

        assert!(
            users
                .update_many(doc! {}, doc! { "$set": { "age": "old" } }, None)
                .await
                .is_err()
        );
        assert!(
            users
                .update_one(doc! {}, doc! { "$unset": { "first_name": "" } }, None)
                .await
                .is_err()
        );
        assert!(calls.lock().unwrap().is_empty());

        users
            .update_one(doc! { "age": 1 }, doc! { "$set": { "age": 2 } }, None)
            .await
            .unwrap();

        assert_eq!(*calls.lock().unwrap(), ["update_one users"]);
    }

    #[tokio::test]
    async fn test_upsert_validates_the_inserted_document() {
        let (users, calls) = users();

        let err = users
            .update_one(doc! { "age": 4 }, doc! { "$set": { "age": 5 } }, UpdateOptions::upsert())
            .await
            .unwrap_err();

        assert_eq!(err.as_validation().unwrap().field, "first_name");
        assert!(calls.lock().unwrap().is_empty());

        users
            .update_many(
                doc! { "first_name": "Ann" },
                doc! { "$setOnInsert": { "age": 5 } },
                UpdateOptions::upsert(),
            )
            .await
            .unwrap();

        assert_eq!(*calls.lock().unwrap(), ["update_many users"]);
    }

    #[tokio::test]
    async fn test_reads_and_deletes_pass_through() {
        let (users, calls) = users();

        users.find(doc! { "age": "not validated" }, None).await.unwrap();
        users.find_one(None, None).await.unwrap();
        users.delete_one(doc! {}, None).await.unwrap();
        users.delete_many(doc! {}, None).await.unwrap();

        assert_eq!(
            *calls.lock().unwrap(),
            ["find users", "find_one users", "delete_one users", "delete_many users"]
        );
    }
}
