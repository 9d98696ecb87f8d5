//! In-memory storage implementation for document stores.
//!
//! Collections keep their documents in insertion order behind an async-aware
//! read-write lock. Filters, sorts and projections are evaluated on every read; only
//! unique indexes are tracked, to enforce uniqueness on writes.

use std::{
    cmp::Ordering,
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use mea::rwlock::RwLock;

use docmodel_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{ModelError, ModelResult},
    options::{
        DeleteOptions, DeleteResult, FindOneOptions, FindOptions, InsertManyOptions,
        InsertManyResult, InsertOneOptions, InsertOneResult, UpdateOptions, UpdateResult,
    },
};

use crate::{
    error::MemoryStoreError,
    evaluator::{Comparable, DocumentEvaluator, lookup},
    update,
};

const ID_KEY: &str = "_id";
const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Default)]
struct Collection {
    documents: Vec<Document>,
    /// Fields carrying a unique index. `_id` is always unique and not listed.
    unique: BTreeSet<String>,
}

impl Collection {
    fn matching(&self, filter: &Document) -> Result<Vec<usize>, MemoryStoreError> {
        let mut indices = Vec::new();

        for (index, document) in self.documents.iter().enumerate() {
            if DocumentEvaluator::new(document).evaluate(filter)? {
                indices.push(index);
            }
        }

        Ok(indices)
    }

    /// Finds the first field `candidate` would duplicate, ignoring the document at `skip`.
    ///
    /// Documents without a value for an indexed field are not indexed.
    fn conflict(&self, name: &str, candidate: &Document, skip: Option<usize>) -> ModelResult<()> {
        let fields = std::iter::once(ID_KEY).chain(self.unique.iter().map(String::as_str));

        for field in fields {
            let Some(value) = lookup(candidate, field) else {
                continue;
            };
            let value = Comparable::from(value);

            let duplicated = self
                .documents
                .iter()
                .enumerate()
                .filter(|(index, _)| Some(*index) != skip)
                .any(|(_, existing)| lookup(existing, field).map(Comparable::from).as_ref() == Some(&value));

            if duplicated {
                return Err(ModelError::DuplicateKey {
                    collection: name.to_string(),
                    field: field.to_string(),
                });
            }
        }

        Ok(())
    }

    fn insert(&mut self, name: &str, mut document: Document) -> ModelResult<Bson> {
        let id = match document.get(ID_KEY) {
            Some(id) => id.clone(),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                let mut with_id = Document::new();
                with_id.insert(ID_KEY, id.clone());
                for (key, value) in document {
                    with_id.insert(key, value);
                }
                document = with_id;
                id
            }
        };

        self.conflict(name, &document, None)?;
        self.documents.push(document);

        Ok(id)
    }

    fn update(&mut self, name: &str, filter: &Document, changes: &Document, upsert: bool, multi: bool) -> ModelResult<UpdateResult> {
        update::check(changes)?;

        let mut indices = self.matching(filter)?;

        if !multi {
            indices.truncate(1);
        }

        if indices.is_empty() {
            if !upsert {
                return Ok(UpdateResult::default());
            }

            let mut seeded = seed_from_filter(filter);
            update::apply(&mut seeded, changes, true)?;
            let upserted_id = self.insert(name, seeded)?;

            return Ok(UpdateResult {
                matched_count: 0,
                modified_count: 0,
                upserted_id: Some(upserted_id),
            });
        }

        let mut result = UpdateResult {
            matched_count: indices.len() as u64,
            ..Default::default()
        };

        for index in indices {
            let current = &self.documents[index];
            let mut updated = current.clone();
            update::apply(&mut updated, changes, false)?;

            if updated.get(ID_KEY) != current.get(ID_KEY) {
                return Err(MemoryStoreError::ImmutableId.into());
            }

            if &updated != current {
                self.conflict(name, &updated, Some(index))?;
                self.documents[index] = updated;
                result.modified_count += 1;
            }
        }

        Ok(result)
    }

    fn delete(&mut self, filter: &Document, multi: bool) -> ModelResult<DeleteResult> {
        let mut indices = self.matching(filter)?;

        if !multi {
            indices.truncate(1);
        }

        for index in indices.iter().rev() {
            self.documents.remove(*index);
        }

        Ok(DeleteResult {
            deleted_count: indices.len() as u64,
        })
    }
}

/// Equality conditions of a filter become the fields of an upserted document.
fn seed_from_filter(filter: &Document) -> Document {
    filter
        .iter()
        .filter(|(key, value)| {
            !key.starts_with('$')
                && !key.contains('.')
                && !matches!(value, Bson::Document(doc) if doc.keys().any(|k| k.starts_with('$')))
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn sort_documents(documents: &mut [Document], sort: &Document) {
    documents.sort_by(|a, b| {
        for (field, direction) in sort {
            let left = lookup(a, field).map(Comparable::from).unwrap_or(Comparable::Null);
            let right = lookup(b, field).map(Comparable::from).unwrap_or(Comparable::Null);

            let ordering = match direction {
                Bson::Int32(n) if *n < 0 => right.sort_cmp(&left),
                Bson::Int64(n) if *n < 0 => right.sort_cmp(&left),
                Bson::Double(n) if *n < 0.0 => right.sort_cmp(&left),
                _ => left.sort_cmp(&right),
            };

            if ordering != Ordering::Equal {
                return ordering;
            }
        }

        Ordering::Equal
    });
}

/// Applies an inclusion or exclusion projection to top-level fields.
///
/// `_id` is kept unless excluded explicitly.
fn project(document: Document, projection: &Document) -> Document {
    let included = |value: &Bson| !matches!(value, Bson::Boolean(false) | Bson::Int32(0) | Bson::Int64(0));
    let inclusive = projection
        .iter()
        .any(|(field, value)| field != ID_KEY && included(value));
    let keep_id = projection.get(ID_KEY).is_none_or(included);

    document
        .into_iter()
        .filter(|(field, _)| {
            if field == ID_KEY {
                return keep_id;
            }

            match projection.get(field) {
                Some(value) => included(value),
                None => !inclusive,
            }
        })
        .collect()
}

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing it to
/// be shared across async tasks. Clones of the same instance share the same data.
///
/// Queries scan every document of a collection. Collation, hints, `let` variables and
/// comments are accepted and ignored.
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel_core::backend::StoreBackend;
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// store.insert_one("users", doc! { "name": "Alice" }, Default::default()).await?;
///
/// let found = store.find("users", doc! { "name": "Alice" }, Default::default()).await?;
/// assert_eq!(found.len(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryStore {
    namespace: Arc<str>,
    store: Arc<RwLock<HashMap<String, Collection>>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates an empty store in the default namespace.
    pub fn new() -> Self {
        Self::with_namespace(DEFAULT_NAMESPACE)
    }

    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Arc::from(namespace.into()),
            store: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore` with custom options.
    ///
    /// ```ignore
    /// let store = InMemoryStore::builder().namespace("shop").build().await?;
    /// ```
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn find(&self, collection: &str, filter: Document, options: FindOptions) -> ModelResult<Vec<Document>> {
        let store = self.store.read().await;
        let Some(col) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut documents = DocumentEvaluator::filter_documents(&col.documents, &filter)?
            .into_iter()
            .cloned()
            .collect::<Vec<_>>();

        if let Some(sort) = &options.sort {
            sort_documents(&mut documents, sort);
        }

        // A negative limit behaves like its absolute value; zero means no limit.
        let limit = match options.limit {
            Some(limit) if limit != 0 => limit.unsigned_abs() as usize,
            _ => usize::MAX,
        };

        Ok(documents
            .into_iter()
            .skip(options.skip.unwrap_or(0) as usize)
            .take(limit)
            .map(|document| match &options.projection {
                Some(projection) => project(document, projection),
                None => document,
            })
            .collect())
    }

    async fn find_one(&self, collection: &str, filter: Document, options: FindOneOptions) -> ModelResult<Option<Document>> {
        let options = FindOptions {
            sort: options.sort,
            skip: options.skip,
            limit: Some(1),
            projection: options.projection,
            ..Default::default()
        };

        Ok(StoreBackend::find(self, collection, filter, options)
            .await?
            .into_iter()
            .next())
    }

    async fn insert_one(&self, collection: &str, document: Document, _options: InsertOneOptions) -> ModelResult<InsertOneResult> {
        let mut store = self.store.write().await;
        let inserted_id = store
            .entry(collection.to_string())
            .or_default()
            .insert(collection, document)?;

        tracing::trace!(collection, id = %inserted_id, "inserted document");

        Ok(InsertOneResult { inserted_id })
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>, options: InsertManyOptions) -> ModelResult<InsertManyResult> {
        let ordered = options.ordered.unwrap_or(true);
        let mut store = self.store.write().await;
        let col = store.entry(collection.to_string()).or_default();

        let mut result = InsertManyResult::default();
        let mut first_error = None;

        for (index, document) in documents.into_iter().enumerate() {
            match col.insert(collection, document) {
                Ok(id) => {
                    result.inserted_ids.insert(index, id);
                }
                Err(err) if ordered => return Err(err),
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(result),
        }
    }

    async fn update_one(&self, collection: &str, filter: Document, update: Document, options: UpdateOptions) -> ModelResult<UpdateResult> {
        let mut store = self.store.write().await;

        store
            .entry(collection.to_string())
            .or_default()
            .update(collection, &filter, &update, options.upsert.unwrap_or(false), false)
    }

    async fn update_many(&self, collection: &str, filter: Document, update: Document, options: UpdateOptions) -> ModelResult<UpdateResult> {
        let mut store = self.store.write().await;

        store
            .entry(collection.to_string())
            .or_default()
            .update(collection, &filter, &update, options.upsert.unwrap_or(false), true)
    }

    async fn delete_one(&self, collection: &str, filter: Document, _options: DeleteOptions) -> ModelResult<DeleteResult> {
        match self.store.write().await.get_mut(collection) {
            Some(col) => col.delete(&filter, false),
            None => Ok(DeleteResult::default()),
        }
    }

    async fn delete_many(&self, collection: &str, filter: Document, _options: DeleteOptions) -> ModelResult<DeleteResult> {
        match self.store.write().await.get_mut(collection) {
            Some(col) => col.delete(&filter, true),
            None => Ok(DeleteResult::default()),
        }
    }

    async fn create_index(&self, collection: &str, field: &str, unique: bool) -> ModelResult<()> {
        // Only unique indexes change behavior here.
        if !unique || field == ID_KEY {
            return Ok(());
        }

        let mut store = self.store.write().await;
        let col = store.entry(collection.to_string()).or_default();

        let mut seen: Vec<Comparable<'_>> = Vec::new();

        for value in col.documents.iter().filter_map(|document| lookup(document, field)) {
            let value = Comparable::from(value);

            if seen.contains(&value) {
                return Err(ModelError::DuplicateKey {
                    collection: collection.to_string(),
                    field: field.to_string(),
                });
            }

            seen.push(value);
        }

        col.unique.insert(field.to_string());

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> ModelResult<()> {
        self.store.write().await.remove(name);

        Ok(())
    }

    async fn list_collections(&self) -> ModelResult<Vec<String>> {
        let mut names = self.store.read().await.keys().cloned().collect::<Vec<_>>();
        names.sort();

        Ok(names)
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
#[derive(Debug, Default)]
pub struct InMemoryStoreBuilder {
    namespace: Option<String>,
}

impl InMemoryStoreBuilder {
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> ModelResult<Self::Backend> {
        Ok(match self.namespace {
            Some(namespace) => InMemoryStore::with_namespace(namespace),
            None => InMemoryStore::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();

        store
            .insert_many(
                "users",
                vec![
                    doc! { "name": "Ann", "age": 31 },
                    doc! { "name": "Bob", "age": 25 },
                    doc! { "name": "Cid", "age": 40 },
                ],
                InsertManyOptions::default(),
            )
            .await
            .unwrap();

        store
    }

    fn names(documents: &[Document]) -> Vec<&str> {
        documents
            .iter()
            .map(|document| document.get_str("name").unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_insert_generates_leading_id() {
        let store = InMemoryStore::new();

        let result = store
            .insert_one("users", doc! { "name": "Ann" }, InsertOneOptions::default())
            .await
            .unwrap();

        let stored = store.find("users", doc! {}, FindOptions::default()).await.unwrap();
        assert!(matches!(result.inserted_id, Bson::ObjectId(_)));
        assert_eq!(stored, [doc! { "_id": result.inserted_id, "name": "Ann" }]);
        assert_eq!(stored[0].keys().next().map(String::as_str), Some("_id"));
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let store = InMemoryStore::new();
        store.insert_one("users", doc! { "_id": 1 }, InsertOneOptions::default()).await.unwrap();

        let err = store
            .insert_one("users", doc! { "_id": 1 }, InsertOneOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ModelError::DuplicateKey { field, .. } if field == "_id"));
    }

    #[tokio::test]
    async fn test_find_with_sort_skip_limit_and_projection() {
        let store = seeded().await;

        let options = FindOptions {
            sort: Some(doc! { "age": -1 }),
            skip: Some(1),
            limit: Some(5),
            projection: Some(doc! { "name": 1, "_id": 0 }),
            ..Default::default()
        };
        let found = store.find("users", doc! { "age": { "$gt": 20 } }, options).await.unwrap();

        assert_eq!(found, [doc! { "name": "Ann" }, doc! { "name": "Bob" }]);
    }

    #[tokio::test]
    async fn test_find_one_and_missing_collection() {
        let store = seeded().await;

        let found = store
            .find_one("users", doc! { "age": { "$lt": 35 } }, FindOneOptions::default())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.get_str("name").unwrap(), "Ann");
        assert!(store.find("nothing", doc! {}, FindOptions::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_operators_and_counts() {
        let store = seeded().await;

        let result = store
            .update_many("users", doc! { "age": { "$gte": 31 } }, doc! { "$inc": { "age": 1 } }, UpdateOptions::default())
            .await
            .unwrap();
        assert_eq!((result.matched_count, result.modified_count), (2, 2));

        let result = store
            .update_one("users", doc! { "name": "Bob" }, doc! { "$set": { "age": 25 } }, UpdateOptions::default())
            .await
            .unwrap();
        assert_eq!((result.matched_count, result.modified_count), (1, 0));

        let found = store
            .find("users", doc! {}, FindOptions { sort: Some(doc! { "age": 1 }), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(names(&found), ["Bob", "Ann", "Cid"]);
        assert_eq!(found[2].get_i32("age").unwrap(), 41);
    }

    #[tokio::test]
    async fn test_replacement_update_is_a_backend_error() {
        let store = seeded().await;

        let err = store
            .update_one("users", doc! { "name": "Ann" }, doc! { "name": "Anna" }, UpdateOptions::default())
            .await
            .unwrap_err();

        let ModelError::Backend(source) = err else {
            panic!("expected a backend error");
        };
        assert_eq!(
            source.downcast_ref::<MemoryStoreError>(),
            Some(&MemoryStoreError::ReplacementUpdate)
        );
    }

    #[tokio::test]
    async fn test_upsert_seeds_from_filter() {
        let store = InMemoryStore::new();

        let result = store
            .update_one(
                "users",
                doc! { "name": "Dee", "age": { "$gt": 1 } },
                doc! { "$set": { "age": 50 }, "$setOnInsert": { "new": true } },
                UpdateOptions::upsert(),
            )
            .await
            .unwrap();

        let id = result.upserted_id.unwrap();
        let found = store.find("users", doc! {}, FindOptions::default()).await.unwrap();
        assert_eq!(found, [doc! { "_id": id, "name": "Dee", "age": 50, "new": true }]);
    }

    #[tokio::test]
    async fn test_id_is_immutable() {
        let store = seeded().await;

        let err = store
            .update_one("users", doc! { "name": "Ann" }, doc! { "$set": { "_id": 5 } }, UpdateOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ModelError::Backend(_)));
    }

    #[tokio::test]
    async fn test_unique_index() {
        let store = seeded().await;
        store.create_index("users", "name", true).await.unwrap();

        let err = store
            .insert_one("users", doc! { "name": "Ann" }, InsertOneOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateKey { field, .. } if field == "name"));

        let err = store
            .update_one("users", doc! { "name": "Bob" }, doc! { "$set": { "name": "Cid" } }, UpdateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateKey { .. }));

        // Documents without the field are not indexed.
        store.insert_one("users", doc! { "age": 1 }, InsertOneOptions::default()).await.unwrap();
        store.insert_one("users", doc! { "age": 2 }, InsertOneOptions::default()).await.unwrap();
    }

    #[tokio::test]
    async fn test_unique_index_on_duplicated_data_fails() {
        let store = seeded().await;

        assert!(store.create_index("users", "age", false).await.is_ok());
        store.insert_one("users", doc! { "name": "Ann" }, InsertOneOptions::default()).await.unwrap();
        assert!(store.create_index("users", "name", true).await.is_err());
    }

    #[tokio::test]
    async fn test_unordered_insert_many_continues_after_error() {
        let store = InMemoryStore::new();

        let options = InsertManyOptions { ordered: Some(false), ..Default::default() };
        let err = store
            .insert_many("users", vec![doc! { "_id": 1 }, doc! { "_id": 1 }, doc! { "_id": 2 }], options)
            .await
            .unwrap_err();

        assert!(matches!(err, ModelError::DuplicateKey { .. }));
        assert_eq!(store.find("users", doc! {}, FindOptions::default()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_and_collections() {
        let store = seeded().await;

        let deleted = store.delete_one("users", doc! { "age": { "$gt": 0 } }, DeleteOptions::default()).await.unwrap();
        assert_eq!(deleted.deleted_count, 1);

        let deleted = store.delete_many("users", doc! {}, DeleteOptions::default()).await.unwrap();
        assert_eq!(deleted.deleted_count, 2);

        store.insert_one("books", doc! {}, InsertOneOptions::default()).await.unwrap();
        assert_eq!(store.list_collections().await.unwrap(), ["books", "users"]);

        store.drop_collection("users").await.unwrap();
        assert_eq!(store.list_collections().await.unwrap(), ["books"]);
    }

    #[tokio::test]
    async fn test_builder_and_shared_clones() {
        let store = InMemoryStore::builder().namespace("shop").build().await.unwrap();
        let clone = store.clone();

        clone.insert_one("items", doc! { "sku": 1 }, InsertOneOptions::default()).await.unwrap();

        assert_eq!(store.namespace(), "shop");
        assert_eq!(store.find("items", doc! {}, FindOptions::default()).await.unwrap().len(), 1);
    }
}
