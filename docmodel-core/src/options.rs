//! Operation options and results passed between the facade and a store backend.
//!
//! These mirror the standard option set of document store drivers. Apart from
//! `bypass_document_validation`, which the facade also reads, every option is forwarded
//! to the backend untouched.

use std::collections::HashMap;

use bson::{Bson, Document};

/// An index hint: either a key pattern or an index name.
#[derive(Debug, Clone, PartialEq)]
pub enum Hint {
    Keys(Document),
    Name(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<i64>,
    pub projection: Option<Document>,
    pub collation: Option<Document>,
    pub hint: Option<Hint>,
    pub let_vars: Option<Document>,
    pub comment: Option<Bson>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOneOptions {
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub projection: Option<Document>,
    pub collation: Option<Document>,
    pub hint: Option<Hint>,
    pub let_vars: Option<Document>,
    pub comment: Option<Bson>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertOneOptions {
    pub bypass_document_validation: Option<bool>,
    pub comment: Option<Bson>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertManyOptions {
    pub bypass_document_validation: Option<bool>,
    /// Stop at the first failed insert. Drivers default to `true`.
    pub ordered: Option<bool>,
    pub comment: Option<Bson>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOptions {
    pub upsert: Option<bool>,
    pub bypass_document_validation: Option<bool>,
    pub array_filters: Option<Vec<Document>>,
    pub collation: Option<Document>,
    pub hint: Option<Hint>,
    pub let_vars: Option<Document>,
    pub comment: Option<Bson>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteOptions {
    pub collation: Option<Document>,
    pub hint: Option<Hint>,
    pub let_vars: Option<Document>,
    pub comment: Option<Bson>,
}

impl InsertOneOptions {
    pub fn bypass_validation() -> Self {
        Self {
            bypass_document_validation: Some(true),
            ..Default::default()
        }
    }
}

impl InsertManyOptions {
    pub fn bypass_validation() -> Self {
        Self {
            bypass_document_validation: Some(true),
            ..Default::default()
        }
    }
}

impl UpdateOptions {
    pub fn bypass_validation() -> Self {
        Self {
            bypass_document_validation: Some(true),
            ..Default::default()
        }
    }

    pub fn upsert() -> Self {
        Self {
            upsert: Some(true),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertOneResult {
    pub inserted_id: Bson,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertManyResult {
    /// Identifiers keyed by the position of the document in the submitted batch.
    pub inserted_ids: HashMap<usize, Bson>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<Bson>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteResult {
    pub deleted_count: u64,
}
