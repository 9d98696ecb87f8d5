use async_trait::async_trait;
use futures::TryStreamExt;
use bson::{Document, doc};
use mongodb::{
    Client, Collection as MongoCollection, IndexModel,
    options::{self as mongo, ClientOptions, Collation, IndexOptions},
};
use docmodel_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{ModelError, ModelResult},
    options::{
        DeleteOptions, DeleteResult, FindOneOptions, FindOptions, Hint, InsertManyOptions,
        InsertManyResult, InsertOneOptions, InsertOneResult, UpdateOptions, UpdateResult,
    },
};


#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }
}

fn hint(hint: Option<Hint>) -> Option<mongo::Hint> {
    hint.map(|hint| match hint {
        Hint::Keys(keys) => mongo::Hint::Keys(keys),
        Hint::Name(name) => mongo::Hint::Name(name),
    })
}

fn collation(collation: Option<Document>) -> ModelResult<Option<Collation>> {
    collation
        .map(bson::deserialize_from_document::<Collation>)
        .transpose()
        .map_err(ModelError::from)
}

fn find_options(options: FindOptions) -> ModelResult<mongo::FindOptions> {
    let mut converted = mongo::FindOptions::default();

    converted.sort = options.sort;
    converted.skip = options.skip;
    converted.limit = options.limit;
    converted.projection = options.projection;
    converted.collation = collation(options.collation)?;
    converted.hint = hint(options.hint);
    converted.let_vars = options.let_vars;
    converted.comment = options.comment;

    Ok(converted)
}

fn find_one_options(options: FindOneOptions) -> ModelResult<mongo::FindOneOptions> {
    let mut converted = mongo::FindOneOptions::default();

    converted.sort = options.sort;
    converted.skip = options.skip;
    converted.projection = options.projection;
    converted.collation = collation(options.collation)?;
    converted.hint = hint(options.hint);
    converted.let_vars = options.let_vars;
    converted.comment = options.comment;

    Ok(converted)
}

fn insert_one_options(options: InsertOneOptions) -> mongo::InsertOneOptions {
    let mut converted = mongo::InsertOneOptions::default();

    converted.bypass_document_validation = options.bypass_document_validation;
    converted.comment = options.comment;

    converted
}

fn insert_many_options(options: InsertManyOptions) -> mongo::InsertManyOptions {
    let mut converted = mongo::InsertManyOptions::default();

    converted.bypass_document_validation = options.bypass_document_validation;
    converted.ordered = options.ordered;
    converted.comment = options.comment;

    converted
}

fn update_options(options: UpdateOptions) -> ModelResult<mongo::UpdateOptions> {
    let mut converted = mongo::UpdateOptions::default();

    converted.upsert = options.upsert;
    converted.bypass_document_validation = options.bypass_document_validation;
    converted.array_filters = options.array_filters;
    converted.collation = collation(options.collation)?;
    converted.hint = hint(options.hint);
    converted.let_vars = options.let_vars;
    converted.comment = options.comment;

    Ok(converted)
}

fn delete_options(options: DeleteOptions) -> ModelResult<mongo::DeleteOptions> {
    let mut converted = mongo::DeleteOptions::default();

    converted.collation = collation(options.collation)?;
    converted.hint = hint(options.hint);
    converted.let_vars = options.let_vars;
    converted.comment = options.comment;

    Ok(converted)
}

fn update_result(result: mongodb::results::UpdateResult) -> UpdateResult {
    UpdateResult {
        matched_count: result.matched_count,
        modified_count: result.modified_count,
        upserted_id: result.upserted_id,
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    fn namespace(&self) -> &str {
        &self.database
    }

    async fn find(&self, collection: &str, filter: Document, options: FindOptions) -> ModelResult<Vec<Document>> {
        self.get_collection(collection)
            .find(filter)
            .with_options(find_options(options)?)
            .await
            .map_err(ModelError::backend)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(ModelError::backend)
    }

    async fn find_one(&self, collection: &str, filter: Document, options: FindOneOptions) -> ModelResult<Option<Document>> {
        self.get_collection(collection)
            .find_one(filter)
            .with_options(find_one_options(options)?)
            .await
            .map_err(ModelError::backend)
    }

    async fn insert_one(&self, collection: &str, document: Document, options: InsertOneOptions) -> ModelResult<InsertOneResult> {
        let result = self.get_collection(collection)
            .insert_one(document)
            .with_options(insert_one_options(options))
            .await
            .map_err(ModelError::backend)?;

        Ok(InsertOneResult { inserted_id: result.inserted_id })
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>, options: InsertManyOptions) -> ModelResult<InsertManyResult> {
        let result = self.get_collection(collection)
            .insert_many(documents)
            .with_options(insert_many_options(options))
            .await
            .map_err(ModelError::backend)?;

        Ok(InsertManyResult { inserted_ids: result.inserted_ids })
    }

    async fn update_one(&self, collection: &str, filter: Document, update: Document, options: UpdateOptions) -> ModelResult<UpdateResult> {
        self.get_collection(collection)
            .update_one(filter, update)
            .with_options(update_options(options)?)
            .await
            .map(update_result)
            .map_err(ModelError::backend)
    }

    async fn update_many(&self, collection: &str, filter: Document, update: Document, options: UpdateOptions) -> ModelResult<UpdateResult> {
        self.get_collection(collection)
            .update_many(filter, update)
            .with_options(update_options(options)?)
            .await
            .map(update_result)
            .map_err(ModelError::backend)
    }

    async fn delete_one(&self, collection: &str, filter: Document, options: DeleteOptions) -> ModelResult<DeleteResult> {
        let result = self.get_collection(collection)
            .delete_one(filter)
            .with_options(delete_options(options)?)
            .await
            .map_err(ModelError::backend)?;

        Ok(DeleteResult { deleted_count: result.deleted_count })
    }

    async fn delete_many(&self, collection: &str, filter: Document, options: DeleteOptions) -> ModelResult<DeleteResult> {
        let result = self.get_collection(collection)
            .delete_many(filter)
            .with_options(delete_options(options)?)
            .await
            .map_err(ModelError::backend)?;

        Ok(DeleteResult { deleted_count: result.deleted_count })
    }

    async fn create_index(&self, collection: &str, field: &str, unique: bool) -> ModelResult<()> {
        self.get_collection(collection)
            .create_index(
                IndexModel::builder()
                .keys(doc! { field: 1 })
                .options(
                    IndexOptions::builder()
                    .unique(unique)
                    .build()
                )
                .build()
            )
            .await
            .map_err(ModelError::backend)?;

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> ModelResult<()> {
        self.get_collection(name)
            .drop()
            .await
            .map_err(ModelError::backend)
    }

    async fn list_collections(&self) -> ModelResult<Vec<String>> {
        self.client
            .database(&self.database)
            .list_collection_names()
            .await
            .map_err(ModelError::backend)
    }

    async fn shutdown(&self) -> ModelResult<()> {
        tracing::debug!(database = %self.database, "shutting down mongodb client");
        self.client.clone().shutdown().await;

        Ok(())
    }
}

/// Builds a [`MongoDbStore`] from a connection string.
///
/// Building parses the connection string, resolving `mongodb+srv` records, but does
/// not contact the deployment; the driver connects on the first operation.
pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> ModelResult<Self::Backend> {
        Ok(MongoDbStore::new(
            Client::with_options(
                ClientOptions::parse(&self.dsn)
                    .await
                    .map_err(|e| ModelError::Initialization(e.to_string()))?,
            )
            .map_err(|e| ModelError::Initialization(e.to_string()))?,
            self.database,
        ))
    }
}
