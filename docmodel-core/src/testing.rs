use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};

use crate::{
    backend::StoreBackend,
    error::ModelResult,
    options::{
        DeleteOptions, DeleteResult, FindOneOptions, FindOptions, InsertManyOptions,
        InsertManyResult, InsertOneOptions, InsertOneResult, UpdateOptions, UpdateResult,
    },
};

/// Backend that records every call as `"<operation> <collection>"` and stores nothing.
#[derive(Debug, Default)]
pub(crate) struct RecordingBackend {
    calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingBackend {
    pub(crate) fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        self.calls.clone()
    }

    fn record(&self, operation: &str, collection: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{operation} {collection}"));
    }
}

#[async_trait]
impl StoreBackend for RecordingBackend {
    fn namespace(&self) -> &str {
        "recording"
    }

    async fn find(&self, collection: &str, _: Document, _: FindOptions) -> ModelResult<Vec<Document>> {
        self.record("find", collection);
        Ok(vec![])
    }

    async fn find_one(&self, collection: &str, _: Document, _: FindOneOptions) -> ModelResult<Option<Document>> {
        self.record("find_one", collection);
        Ok(None)
    }

    async fn insert_one(&self, collection: &str, document: Document, _: InsertOneOptions) -> ModelResult<InsertOneResult> {
        self.record("insert_one", collection);
        Ok(InsertOneResult {
            inserted_id: document
                .get("_id")
                .cloned()
                .unwrap_or_else(|| Bson::ObjectId(ObjectId::new())),
        })
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>, _: InsertManyOptions) -> ModelResult<InsertManyResult> {
        self.record("insert_many", collection);
        Ok(InsertManyResult {
            inserted_ids: (0..documents.len())
                .map(|index| (index, Bson::ObjectId(ObjectId::new())))
                .collect::<HashMap<_, _>>(),
        })
    }

    async fn update_one(&self, collection: &str, _: Document, _: Document, _: UpdateOptions) -> ModelResult<UpdateResult> {
        self.record("update_one", collection);
        Ok(UpdateResult { matched_count: 1, modified_count: 1, upserted_id: None })
    }

    async fn update_many(&self, collection: &str, _: Document, _: Document, _: UpdateOptions) -> ModelResult<UpdateResult> {
        self.record("update_many", collection);
        Ok(UpdateResult { matched_count: 0, modified_count: 0, upserted_id: None })
    }

    async fn delete_one(&self, collection: &str, _: Document, _: DeleteOptions) -> ModelResult<DeleteResult> {
        self.record("delete_one", collection);
        Ok(DeleteResult { deleted_count: 0 })
    }

    async fn delete_many(&self, collection: &str, _: Document, _: DeleteOptions) -> ModelResult<DeleteResult> {
        self.record("delete_many", collection);
        Ok(DeleteResult { deleted_count: 0 })
    }

    async fn create_index(&self, collection: &str, field: &str, _: bool) -> ModelResult<()> {
        self.record(&format!("create_index:{field}"), collection);
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> ModelResult<()> {
        self.record("drop_collection", name);
        Ok(())
    }

    async fn list_collections(&self) -> ModelResult<Vec<String>> {
        Ok(vec![])
    }

    async fn shutdown(&self) -> ModelResult<()> {
        self.record("shutdown", "recording");
        Ok(())
    }
}
