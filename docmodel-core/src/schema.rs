//! Model schemas: the ordered registry of field descriptors for one model type.
//!
//! A schema is built once per model type, usually by `#[derive(Model)]`, and then shared
//! by every instance. Building binds each declared field to its name and resolves the
//! collection the model is stored in.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::{schema::Schema, field::{StringField, NumberField}};
//! use bson::doc;
//!
//! let schema = Schema::builder("User")
//!     .collection_name("users")
//!     .field("first_name", StringField::new(doc! { "size": 20, "required": true }))
//!     .field("age", NumberField::new(doc! { "required": true }))
//!     .build()?;
//!
//! assert_eq!(schema.collection_name(), "users");
//! ```

use bson::{Bson, Document};

use crate::{
    error::{ModelError, ModelResult, ValidationError},
    field::{Field, FieldDescriptor},
    naming::collection_name_for,
};

/// A record type with a declared schema.
///
/// Implemented by `#[derive(Model)]`; the schema is built the first time it is requested
/// and lives for the rest of the process.
pub trait Model: Send + Sync + 'static {
    fn schema() -> &'static Schema;
}

/// The declared fields of a model, in declaration order.
#[derive(Debug, Clone)]
pub struct Schema {
    model_name: &'static str,
    collection_name: String,
    fields: Vec<FieldDescriptor>,
}

impl Schema {
    pub fn builder(model_name: &'static str) -> SchemaBuilder {
        SchemaBuilder::new(model_name)
    }

    /// Name of the model type this schema describes.
    pub fn model_name(&self) -> &'static str {
        self.model_name
    }

    /// The resolved collection name.
    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|descriptor| descriptor.name() == name)
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Fields configured with `unique = true`.
    pub fn unique_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields
            .iter()
            .filter(|descriptor| descriptor.field().is_unique())
    }

    /// Validates a whole document: every declared field is checked, present or not.
    ///
    /// Keys that are not declared fields are ignored.
    pub fn validate_document(&self, document: &Document) -> Result<(), ValidationError> {
        self.fields
            .iter()
            .try_for_each(|descriptor| descriptor.validate(document.get(descriptor.name())))
    }

    /// Validates an update document.
    ///
    /// A replacement document (no `$` operators) is validated like a whole document.
    /// For operator updates, declared fields assigned by `$set` or `$setOnInsert` are
    /// checked against their new value and declared fields removed by `$unset` are
    /// checked as if never set. Other operators are not inspected.
    pub fn validate_update(&self, update: &Document) -> Result<(), ValidationError> {
        if !update.keys().any(|key| key.starts_with('$')) {
            return self.validate_document(update);
        }

        for (operator, arguments) in update {
            let Bson::Document(arguments) = arguments else {
                continue;
            };

            match operator.as_str() {
                "$set" | "$setOnInsert" => {
                    for (name, value) in arguments {
                        if let Some(descriptor) = self.field(name) {
                            descriptor.validate(Some(value))?;
                        }
                    }
                }
                "$unset" => {
                    for name in arguments.keys() {
                        if let Some(descriptor) = self.field(name) {
                            descriptor.validate(None)?;
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Validates an update that may insert a document when nothing matches `filter`.
    ///
    /// On top of [`validate_update`](Self::validate_update), the document an upsert would
    /// create is checked as a whole: the filter's equality conditions, overlaid with the
    /// `$set` and `$setOnInsert` assignments. Declared fields written by any other
    /// operator count as present.
    pub fn validate_upsert(&self, filter: &Document, update: &Document) -> Result<(), ValidationError> {
        self.validate_update(update)?;

        if !update.keys().any(|key| key.starts_with('$')) {
            return Ok(());
        }

        let mut seeded = filter
            .iter()
            .filter(|(key, value)| {
                !key.starts_with('$')
                    && !matches!(value, Bson::Document(inner) if inner.keys().any(|k| k.starts_with('$')))
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect::<Document>();
        let mut touched = Vec::new();

        for (operator, arguments) in update {
            let Bson::Document(arguments) = arguments else {
                continue;
            };

            match operator.as_str() {
                "$set" | "$setOnInsert" => {
                    for (name, value) in arguments {
                        seeded.insert(name.clone(), value.clone());
                    }
                }
                "$unset" => {}
                _ => touched.extend(arguments.keys().map(String::as_str)),
            }
        }

        self.fields
            .iter()
            .filter(|descriptor| !touched.contains(&descriptor.name()))
            .try_for_each(|descriptor| descriptor.validate(seeded.get(descriptor.name())))
    }
}

/// Collects field declarations and binds them into a [`Schema`].
///
/// Field constructors return results; the builder keeps the first error and reports it
/// from [`build`](SchemaBuilder::build) so declarations can be chained.
#[derive(Debug)]
pub struct SchemaBuilder {
    model_name: &'static str,
    collection_name: Option<String>,
    fields: Vec<(String, Field)>,
    error: Option<ModelError>,
}

impl SchemaBuilder {
    pub fn new(model_name: &'static str) -> Self {
        Self {
            model_name,
            collection_name: None,
            fields: Vec::new(),
            error: None,
        }
    }

    /// Overrides the derived collection name. An empty name keeps the derived one.
    pub fn collection_name(mut self, name: impl Into<String>) -> Self {
        self.collection_name = Some(name.into());
        self
    }

    pub fn field<F>(mut self, name: impl Into<String>, field: ModelResult<F>) -> Self
    where
        F: Into<Field>,
    {
        match field {
            Ok(field) => self.fields.push((name.into(), field.into())),
            Err(err) if self.error.is_none() => {
                let name = name.into();

                self.error = Some(match err {
                    ModelError::Configuration(message) => {
                        ModelError::Configuration(format!("{}.{name}: {message}", self.model_name))
                    }
                    other => other,
                });
            }
            Err(_) => {}
        }

        self
    }

    pub fn build(self) -> ModelResult<Schema> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let mut fields: Vec<FieldDescriptor> = Vec::with_capacity(self.fields.len());

        for (name, field) in self.fields {
            if name.is_empty() || name.starts_with('_') || name.starts_with('$') {
                return Err(ModelError::Configuration(format!(
                    "{}: invalid field name `{name}`",
                    self.model_name
                )));
            }

            if fields.iter().any(|descriptor| descriptor.name() == name) {
                return Err(ModelError::Configuration(format!(
                    "{}: field `{name}` declared twice",
                    self.model_name
                )));
            }

            fields.push(FieldDescriptor::bind(self.model_name, name, field));
        }

        let collection_name = match self.collection_name {
            Some(name) if !name.is_empty() => name,
            _ => collection_name_for(self.model_name),
        };

        Ok(Schema {
            model_name: self.model_name,
            collection_name,
            fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    use crate::{
        error::ValidationKind,
        field::{ListField, NumberField, StringField},
    };

    fn user_schema() -> Schema {
        Schema::builder("User")
            .field("first_name", StringField::new(doc! { "size": 20, "required": true }))
            .field("age", NumberField::new(doc! { "required": true }))
            .field("tags", ListField::new(doc! { "item_type": "string" }))
            .build()
            .unwrap()
    }

    #[test]
    fn test_collection_name_resolution() {
        assert_eq!(Schema::builder("Author").build().unwrap().collection_name(), "authors");
        assert_eq!(
            Schema::builder("Author")
                .collection_name("books")
                .build()
                .unwrap()
                .collection_name(),
            "books"
        );
        assert_eq!(
            Schema::builder("Author")
                .collection_name("")
                .build()
                .unwrap()
                .collection_name(),
            "authors"
        );
    }

    #[test]
    fn test_declaration_order_is_kept() {
        let names = user_schema()
            .fields()
            .iter()
            .map(|descriptor| descriptor.name().to_string())
            .collect::<Vec<_>>();

        assert_eq!(names, ["first_name", "age", "tags"]);
    }

    #[test]
    fn test_first_configuration_error_is_reported() {
        let err = Schema::builder("User")
            .field("first_name", StringField::new(doc! { "max": 3 }))
            .field("age", NumberField::new(doc! { "min": 0 }))
            .build()
            .unwrap_err();

        match err {
            ModelError::Configuration(message) => {
                assert!(message.starts_with("User.first_name: max are not allowed"), "{message}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_invalid_and_duplicate_names() {
        assert!(
            Schema::builder("User")
                .field("_id", StringField::new(doc! {}))
                .build()
                .is_err()
        );
        assert!(
            Schema::builder("User")
                .field("name", StringField::new(doc! {}))
                .field("name", NumberField::new(doc! {}))
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_validate_document() {
        let schema = user_schema();

        assert!(schema.validate_document(&doc! { "first_name": "Ann", "age": 3, "nickname": 1 }).is_ok());

        let err = schema.validate_document(&doc! { "first_name": "Ann" }).unwrap_err();
        assert_eq!(err.field, "age");
        assert_eq!(err.kind, ValidationKind::Required);
    }

    #[test]
    fn test_validate_update() {
        let schema = user_schema();

        assert!(schema.validate_update(&doc! { "$set": { "age": 4 } }).is_ok());
        assert!(schema.validate_update(&doc! { "$inc": { "age": "x" } }).is_ok());
        assert_eq!(
            schema.validate_update(&doc! { "$set": { "age": "four" } }).unwrap_err().kind,
            ValidationKind::Type
        );
        assert_eq!(
            schema.validate_update(&doc! { "$unset": { "first_name": "" } }).unwrap_err().kind,
            ValidationKind::Required
        );
        assert!(schema.validate_update(&doc! { "$unset": { "tags": "" } }).is_ok());
        assert_eq!(
            schema.validate_update(&doc! { "age": 4 }).unwrap_err().field,
            "first_name"
        );
    }

    #[test]
    fn test_validate_upsert_checks_the_inserted_document() {
        let schema = user_schema();

        assert_eq!(
            schema
                .validate_upsert(&doc! { "tags": ["a"] }, &doc! { "$set": { "age": 1 } })
                .unwrap_err()
                .field,
            "first_name"
        );
        assert!(
            schema
                .validate_upsert(
                    &doc! { "first_name": "Ann" },
                    &doc! { "$set": { "age": 1 }, "$setOnInsert": { "tags": [] } },
                )
                .is_ok()
        );
        assert!(
            schema
                .validate_upsert(&doc! { "first_name": "Ann" }, &doc! { "$inc": { "age": 1 } })
                .is_ok()
        );
        // Operator conditions in the filter do not seed the document.
        assert_eq!(
            schema
                .validate_upsert(
                    &doc! { "first_name": { "$ne": "Bob" } },
                    &doc! { "$set": { "age": 1 } },
                )
                .unwrap_err()
                .kind,
            ValidationKind::Required
        );
    }
}
