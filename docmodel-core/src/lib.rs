//! Schema validation for document store models.
//!
//! This crate is the core of the docmodel project and provides:
//!
//! - **Field descriptors** ([`field`]) - String, number, list, date and boolean fields and their validators
//! - **Constraint sets** ([`constraint`]) - The options each field kind accepts, checked at declaration
//! - **Schemas** ([`schema`]) - The ordered field registry of a model and the [`Model`](schema::Model) trait
//! - **Model instances** ([`model`]) - Validated attribute assignment, persisted documents and `save`
//! - **Persistence facade** ([`collection`]) - Validated pass-through of store operations
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing different document stores
//! - **Connection state** ([`connection`]) - The shared backend handle and the process-wide slot
//! - **Configuration** ([`config`]) - Connection settings read from code or the environment
//! - **Error handling** ([`error`]) - Validation, configuration and backend errors
//!
//! # Example
//!
//! ```ignore
//! use docmodel_core::{field::{NumberField, StringField}, schema::{Model, Schema}};
//! use bson::doc;
//! use std::sync::LazyLock;
//!
//! pub struct User;
//!
//! impl Model for User {
//!     fn schema() -> &'static Schema {
//!         static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
//!             Schema::builder("User")
//!                 .field("first_name", StringField::new(doc! { "size": 20, "required": true }))
//!                 .field("age", NumberField::new(doc! { "required": true }))
//!                 .build()
//!                 .unwrap()
//!         });
//!
//!         &SCHEMA
//!     }
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_core;

pub mod backend;
pub mod collection;
pub mod config;
pub mod connection;
pub mod constraint;
pub mod error;
pub mod field;
pub mod model;
pub mod naming;
pub mod options;
pub mod schema;

#[cfg(test)]
mod testing;
