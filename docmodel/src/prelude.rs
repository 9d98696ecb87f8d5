//! Convenient re-exports of commonly used types from docmodel.
//!
//! ```ignore
//! use docmodel::prelude::*;
//! ```

pub use docmodel_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    collection::ModelCollection,
    config::ConnectionConfig,
    connection::Connection,
    error::{ModelError, ModelResult, ValidationError, ValidationKind},
    field::{BooleanField, DateField, Field, FieldDescriptor, ListField, NumberField, StringField},
    model::{Instance, SaveResult},
    options::{
        DeleteOptions, FindOneOptions, FindOptions, Hint, InsertManyOptions, InsertOneOptions,
        UpdateOptions,
    },
    schema::{Model, Schema},
};
pub use docmodel_macros::Model;
