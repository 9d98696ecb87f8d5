//! Model instances: validated attribute slots mapped onto a persisted document.
//!
//! An [`Instance`] holds one private slot per declared field that has been assigned,
//! plus any transient attributes that are not declared fields. Assigning a declared
//! field runs its validator first and leaves the slot untouched on failure. Only
//! declared fields are ever persisted.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::prelude::*;
//! use bson::doc;
//!
//! #[derive(Model)]
//! #[model(collection = "users")]
//! #[field(first_name, string, size = 20, required)]
//! #[field(age, number, required)]
//! pub struct User;
//!
//! let mut user = Instance::<User>::new(doc! { "first_name": "Ann" }).await?;
//! user.set("age", 31)?;
//! user.set("nickname", "annie")?; // transient, never saved
//! user.save().await?;
//! ```

use std::{collections::HashMap, fmt};

use bson::{Bson, Document, doc};
use serde::de::DeserializeOwned;

use crate::{
    collection::ModelCollection,
    connection::{self, Connection},
    error::{ModelError, ModelResult},
    options::{
        DeleteOptions, DeleteResult, FindOneOptions, FindOptions, InsertManyOptions,
        InsertManyResult, InsertOneOptions, InsertOneResult, UpdateOptions, UpdateResult,
    },
    schema::{Model, Schema},
};

const ID_KEY: &str = "_id";

/// The outcome of [`Instance::save`].
#[derive(Debug, Clone, PartialEq)]
pub enum SaveResult {
    /// The instance had no identifier and was inserted.
    Inserted(InsertOneResult),
    /// The instance already had an identifier and its declared fields were updated.
    Updated(UpdateResult),
}

/// A record of model `M`.
pub struct Instance<M: Model> {
    collection: ModelCollection<M>,
    id: Option<Bson>,
    slots: HashMap<String, Bson>,
    transient: Document,
}

impl<M: Model> Instance<M> {
    /// Creates an instance on the process-wide connection.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotConnected`] if no connection is installed, or the first
    /// validation error raised while assigning `attributes`.
    pub async fn new(attributes: Document) -> ModelResult<Self> {
        Self::with_connection(connection::current().await?, attributes)
    }

    /// Creates an instance on an explicit connection.
    ///
    /// Each attribute is assigned as if by [`set`](Self::set): declared fields are
    /// validated, `_id` becomes the identifier and anything else is kept as a transient
    /// attribute.
    pub fn with_connection(connection: Connection, attributes: Document) -> ModelResult<Self> {
        let mut instance = Self {
            collection: connection.collection::<M>(),
            id: None,
            slots: HashMap::new(),
            transient: Document::new(),
        };

        for (name, value) in attributes {
            instance.set(name, value)?;
        }

        Ok(instance)
    }

    /// Rebuilds an instance from a stored document.
    pub fn from_document(connection: Connection, document: Document) -> ModelResult<Self> {
        Self::with_connection(connection, document)
    }

    /// Stores this instance in `name` instead of the model's collection.
    ///
    /// An empty name keeps the current collection.
    pub fn with_collection_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();

        if !name.is_empty() {
            self.collection = self.collection.connection().collection_named::<M>(name);
        }

        self
    }

    pub fn schema(&self) -> &'static Schema {
        M::schema()
    }

    pub fn collection(&self) -> &ModelCollection<M> {
        &self.collection
    }

    pub fn collection_name(&self) -> &str {
        self.collection.name()
    }

    /// The store identifier, once the instance has been saved or loaded.
    pub fn id(&self) -> Option<&Bson> {
        self.id.as_ref()
    }

    /// Attributes that are not declared fields.
    pub fn transient(&self) -> &Document {
        &self.transient
    }

    /// Reads an attribute.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::AttributeMissing`] if the attribute was never assigned.
    pub fn get(&self, name: &str) -> ModelResult<&Bson> {
        let value = if name == ID_KEY {
            self.id.as_ref()
        } else {
            match M::schema().field(name) {
                Some(descriptor) => self.slots.get(descriptor.slot()),
                None => self.transient.get(name),
            }
        };

        value.ok_or_else(|| ModelError::AttributeMissing(name.to_string()))
    }

    /// Whether an attribute has been assigned.
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_ok()
    }

    /// Assigns an attribute.
    ///
    /// A declared field is validated first; on failure the error is returned and the
    /// previous value, if any, is kept.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Bson>) -> ModelResult<()> {
        let name = name.into();
        let value = value.into();

        if name == ID_KEY {
            self.id = Some(value);
            return Ok(());
        }

        match M::schema().field(&name) {
            Some(descriptor) => {
                descriptor.validate(Some(&value))?;
                self.slots.insert(descriptor.slot().to_string(), value);
            }
            None => {
                self.transient.insert(name, value);
            }
        }

        Ok(())
    }

    /// Clears an attribute, returning its previous value.
    pub fn unset(&mut self, name: &str) -> Option<Bson> {
        if name == ID_KEY {
            return self.id.take();
        }

        match M::schema().field(name) {
            Some(descriptor) => self.slots.remove(descriptor.slot()),
            None => self.transient.remove(name),
        }
    }

    /// Assembles the persisted document from the declared fields.
    ///
    /// Declared fields that were never assigned are validated as absent, so a missing
    /// required field fails here.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Validation`] for a missing required field and
    /// [`ModelError::NoData`] if no declared field has a value.
    pub fn to_document(&self) -> ModelResult<Document> {
        let mut document = Document::new();

        for descriptor in M::schema().fields() {
            match self.slots.get(descriptor.slot()) {
                Some(value) => {
                    document.insert(descriptor.name(), value.clone());
                }
                None => descriptor.validate(None)?,
            }
        }

        if document.is_empty() {
            return Err(ModelError::NoData);
        }

        Ok(document)
    }

    /// Persists the declared fields.
    ///
    /// A new instance is inserted and remembers the identifier the store assigned. An
    /// instance with an identifier has its declared fields upserted under that
    /// identifier, so an identifier chosen by the caller is stored on the first save.
    /// Nothing is sent to the store if the document does not validate.
    pub async fn save(&mut self) -> ModelResult<SaveResult> {
        let document = self.to_document()?;

        match &self.id {
            None => {
                let result = self.collection.insert_one(document, None).await?;
                self.id = Some(result.inserted_id.clone());

                Ok(SaveResult::Inserted(result))
            }
            Some(id) => {
                let result = self
                    .collection
                    .update_one(
                        doc! { ID_KEY: id.clone() },
                        doc! { "$set": document },
                        UpdateOptions::upsert(),
                    )
                    .await?;

                Ok(SaveResult::Updated(result))
            }
        }
    }

    /// Converts the persisted document, with its identifier, into a serde type.
    pub fn deserialize<T: DeserializeOwned>(&self) -> ModelResult<T> {
        let mut document = self.to_document()?;

        if let Some(id) = &self.id {
            document.insert(ID_KEY, id.clone());
        }

        Ok(bson::deserialize_from_document(document)?)
    }

    /// Loads every matching document as an instance.
    pub async fn find_instances(
        &self,
        filter: impl Into<Option<Document>>,
        options: impl Into<Option<FindOptions>>,
    ) -> ModelResult<Vec<Self>> {
        self.collection
            .find(filter, options)
            .await?
            .into_iter()
            .map(|document| self.hydrate(document))
            .collect()
    }

    /// Loads the first matching document as an instance.
    pub async fn find_one_instance(
        &self,
        filter: impl Into<Option<Document>>,
        options: impl Into<Option<FindOneOptions>>,
    ) -> ModelResult<Option<Self>> {
        self.collection
            .find_one(filter, options)
            .await?
            .map(|document| self.hydrate(document))
            .transpose()
    }

    fn hydrate(&self, document: Document) -> ModelResult<Self> {
        Ok(Self::from_document(self.collection.connection().clone(), document)?
            .with_collection_name(self.collection_name()))
    }

    pub async fn find(
        &self,
        filter: impl Into<Option<Document>>,
        options: impl Into<Option<FindOptions>>,
    ) -> ModelResult<Vec<Document>> {
        self.collection.find(filter, options).await
    }

    pub async fn find_one(
        &self,
        filter: impl Into<Option<Document>>,
        options: impl Into<Option<FindOneOptions>>,
    ) -> ModelResult<Option<Document>> {
        self.collection.find_one(filter, options).await
    }

    pub async fn insert_one(
        &self,
        document: Document,
        options: impl Into<Option<InsertOneOptions>>,
    ) -> ModelResult<InsertOneResult> {
        self.collection.insert_one(document, options).await
    }

    pub async fn insert_many(
        &self,
        documents: impl Into<Bson>,
        options: impl Into<Option<InsertManyOptions>>,
    ) -> ModelResult<InsertManyResult> {
        self.collection.insert_many(documents, options).await
    }

    pub async fn update_one(
        &self,
        filter: Document,
        update: Document,
        options: impl Into<Option<UpdateOptions>>,
    ) -> ModelResult<UpdateResult> {
        self.collection.update_one(filter, update, options).await
    }

    pub async fn update_many(
        &self,
        filter: Document,
        update: Document,
        options: impl Into<Option<UpdateOptions>>,
    ) -> ModelResult<UpdateResult> {
        self.collection.update_many(filter, update, options).await
    }

    pub async fn delete_one(
        &self,
        filter: Document,
        options: impl Into<Option<DeleteOptions>>,
    ) -> ModelResult<DeleteResult> {
        self.collection.delete_one(filter, options).await
    }

    pub async fn delete_many(
        &self,
        filter: Document,
        options: impl Into<Option<DeleteOptions>>,
    ) -> ModelResult<DeleteResult> {
        self.collection.delete_many(filter, options).await
    }

    pub async fn ensure_indexes(&self) -> ModelResult<()> {
        self.collection.ensure_indexes().await
    }
}

impl<M: Model> fmt::Debug for Instance<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = M::schema()
            .fields()
            .iter()
            .filter_map(|descriptor| {
                self.slots
                    .get(descriptor.slot())
                    .map(|value| (descriptor.name(), value))
            })
            .collect::<Vec<_>>();

        f.debug_struct("Instance")
            .field("model", &M::schema().model_name())
            .field("collection", &self.collection_name())
            .field("id", &self.id)
            .field("fields", &fields)
            .field("transient", &self.transient)
            .finish()
    }
}
