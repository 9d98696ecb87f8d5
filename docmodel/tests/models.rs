use bson::{Bson, DateTime, doc};
use docmodel::{memory::InMemoryStore, prelude::*};
use serde::Deserialize;

#[derive(Model)]
#[field(first_name, string, size = 20, required)]
#[field(age, number, required)]
#[field(email, string, unique)]
#[field(tags, list, item_type = string)]
#[field(joined, date)]
#[field(active, boolean)]
struct User;

#[derive(Model)]
#[field(name, string, required)]
struct Author;

#[derive(Model)]
#[model(collection = "books")]
#[field(title, string, required)]
struct Novel;

#[derive(Model)]
#[field(name, string, required)]
#[field(scores, list, item_type = "int")]
struct Player;

fn connection() -> Connection {
    Connection::new(InMemoryStore::new())
}

fn user(connection: &Connection, attributes: bson::Document) -> Instance<User> {
    Instance::with_connection(connection.clone(), attributes).unwrap()
}

#[test]
fn test_collection_names() {
    assert_eq!(User::schema().collection_name(), "users");
    assert_eq!(Author::schema().collection_name(), "authors");
    assert_eq!(Novel::schema().collection_name(), "books");
}

#[test]
fn test_fields_keep_declaration_order() {
    let names = User::schema()
        .fields()
        .iter()
        .map(FieldDescriptor::name)
        .collect::<Vec<_>>();

    assert_eq!(names, ["first_name", "age", "email", "tags", "joined", "active"]);
    assert_eq!(User::schema().field("age").unwrap().slot(), "_age");
}

#[test]
fn test_int_list_rejects_floats() {
    let mut ann = Instance::<Player>::with_connection(connection(), doc! { "name": "Ann" }).unwrap();

    let err = ann.set("scores", bson::bson!([1, 2.5])).unwrap_err();

    assert_eq!(err.as_validation().map(|err| err.kind), Some(ValidationKind::ItemType));
    assert!(!ann.has("scores"));
    ann.set("scores", vec![1, 2]).unwrap();
}

#[tokio::test]
async fn test_save_stores_instance_with_preset_id() {
    let connection = connection();
    let mut ann = Instance::<Player>::with_connection(connection.clone(), doc! { "_id": 7, "name": "Ann" })
        .unwrap();

    let SaveResult::Updated(result) = ann.save().await.unwrap() else {
        panic!("expected an update");
    };

    assert_eq!(result.matched_count, 0);
    assert_eq!(result.upserted_id, Some(Bson::Int32(7)));

    let stored = connection.collection::<Player>().find(None, None).await.unwrap();
    assert_eq!(stored, [doc! { "_id": 7, "name": "Ann" }]);

    // A second save updates the stored document in place.
    ann.set("scores", vec![3]).unwrap();
    ann.save().await.unwrap();

    let stored = connection.collection::<Player>().find(None, None).await.unwrap();
    assert_eq!(stored, [doc! { "_id": 7, "name": "Ann", "scores": [3] }]);
}

#[test]
fn test_assignment_is_validated() {
    let connection = connection();
    let mut ann = user(&connection, doc! { "first_name": "Ann" });

    let kind = |err: ModelError| err.as_validation().map(|err| err.kind);

    assert_eq!(kind(ann.set("first_name", 42).unwrap_err()), Some(ValidationKind::Type));
    assert_eq!(kind(ann.set("first_name", "x".repeat(21)).unwrap_err()), Some(ValidationKind::Size));
    assert_eq!(kind(ann.set("tags", bson::bson!(["a", 1])).unwrap_err()), Some(ValidationKind::ItemType));
    assert_eq!(kind(ann.set("joined", "2020-01-01").unwrap_err()), Some(ValidationKind::Type));
    assert_eq!(kind(ann.set("active", 1).unwrap_err()), Some(ValidationKind::Type));

    ann.set("joined", DateTime::from_chrono(chrono::Utc::now())).unwrap();
    ann.set("tags", vec!["a", "b"]).unwrap();
    ann.set("active", true).unwrap();
    assert_eq!(ann.get("first_name").unwrap(), &Bson::from("Ann"));
}

#[tokio::test]
async fn test_save_persists_only_declared_fields() {
    let connection = connection();
    let mut ann = user(&connection, doc! { "first_name": "Ann", "age": 31, "nickname": "annie" });

    let SaveResult::Inserted(result) = ann.save().await.unwrap() else {
        panic!("expected an insert");
    };

    let stored = connection.collection::<User>().find(None, None).await.unwrap();
    assert_eq!(stored, [doc! { "_id": result.inserted_id, "first_name": "Ann", "age": 31 }]);
    assert_eq!(ann.get("nickname").unwrap(), &Bson::from("annie"));
}

#[tokio::test]
async fn test_missing_required_field_stores_nothing() {
    let connection = connection();
    let mut ann = user(&connection, doc! { "first_name": "Ann" });

    let err = ann.save().await.unwrap_err();

    assert_eq!(err.to_string(), "Validation error: Field age marked as required and no value provided");
    assert!(connection.backend().list_collections().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stored_documents_hydrate_and_save_back() {
    let connection = connection();
    let users = connection.collection::<User>();
    users
        .insert_one(doc! { "first_name": "Bob", "age": 25, "legacy": true }, None)
        .await
        .unwrap();

    let finder = user(&connection, doc! {});
    let mut bob = finder
        .find_one_instance(doc! { "first_name": "Bob" }, None)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(bob.get("age").unwrap(), &Bson::Int32(25));
    assert_eq!(bob.transient(), &doc! { "legacy": true });

    bob.set("age", 26).unwrap();
    assert!(matches!(bob.save().await.unwrap(), SaveResult::Updated(result) if result.modified_count == 1));

    let stored = users.find_one(doc! { "_id": bob.id().unwrap().clone() }, None).await.unwrap().unwrap();
    assert_eq!(stored.get_i32("age").unwrap(), 26);
    assert_eq!(finder.find_instances(None, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unique_fields_are_indexed() {
    let connection = connection();
    let users = connection.collection::<User>();
    users.ensure_indexes().await.unwrap();

    users
        .insert_one(doc! { "first_name": "Ann", "age": 31, "email": "ann@example.com" }, None)
        .await
        .unwrap();
    let err = users
        .insert_one(doc! { "first_name": "Annie", "age": 30, "email": "ann@example.com" }, None)
        .await
        .unwrap_err();

    assert!(matches!(err, ModelError::DuplicateKey { field, .. } if field == "email"));
}

#[tokio::test]
async fn test_updates_are_validated() {
    let connection = connection();
    let users = connection.collection::<User>();
    users.insert_one(doc! { "first_name": "Ann", "age": 31 }, None).await.unwrap();

    let err = users
        .update_one(doc! { "first_name": "Ann" }, doc! { "$unset": { "age": "" } }, None)
        .await
        .unwrap_err();
    assert_eq!(err.as_validation().unwrap().kind, ValidationKind::Required);

    let err = users
        .update_many(doc! {}, doc! { "$set": { "first_name": "x".repeat(30) } }, None)
        .await
        .unwrap_err();
    assert_eq!(err.as_validation().unwrap().kind, ValidationKind::Size);

    let result = users
        .update_one(doc! { "first_name": "Ann" }, doc! { "$inc": { "age": 1 } }, None)
        .await
        .unwrap();
    assert_eq!(result.modified_count, 1);
}

#[tokio::test]
async fn test_bypass_and_batch_inserts() {
    let connection = connection();
    let users = connection.collection::<User>();

    users
        .insert_one(doc! { "first_name": 1 }, InsertOneOptions::bypass_validation())
        .await
        .unwrap();

    let err = users.insert_many(doc! { "first_name": "Ann", "age": 1 }, None).await.unwrap_err();
    assert!(matches!(err, ModelError::NotIterable(_)));

    let result = users
        .insert_many(
            vec![doc! { "first_name": "Ann", "age": 1 }, doc! { "first_name": "Bob", "age": 2 }],
            None,
        )
        .await
        .unwrap();
    assert_eq!(result.inserted_ids.len(), 2);
    assert_eq!(users.find(None, None).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_deserialize_into_a_record() {
    #[derive(Debug, Deserialize)]
    struct UserRecord {
        first_name: String,
        age: i32,
    }

    let connection = connection();
    let mut ann = user(&connection, doc! { "first_name": "Ann", "age": 31 });
    ann.save().await.unwrap();

    let record = ann.deserialize::<UserRecord>().unwrap();

    assert_eq!((record.first_name.as_str(), record.age), ("Ann", 31));
}
