//! Filter evaluation for in-memory document matching.
//!
//! Filters use the query document syntax of MongoDB: implicit equality, the comparison
//! operators `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in` and `$nin`, `$exists`,
//! `$not`, the logical operators `$and`, `$or` and `$nor`, and dotted paths into
//! embedded documents and arrays. A condition on an array field matches when the array
//! itself or any of its elements satisfies it.

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, DateTime, Document, oid::ObjectId};

use crate::error::MemoryStoreError;

/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64 so that `1`, `1i64` and `1.0` compare equal.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(ObjectId),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            // Other types are not comparable
            _ => Comparable::Null,
        }
    }
}

impl Comparable<'_> {
    /// Position of the value's type in the cross-type sort order.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::ObjectId(_) => 5,
            Comparable::Bool(_) => 6,
            Comparable::DateTime(_) => 7,
        }
    }

    /// Total order used for sorting: values of different types order by type.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        self.rank()
            .cmp(&other.rank())
            .then_with(|| self.partial_cmp(other).unwrap_or(Ordering::Equal))
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a dotted path such as `address.city` or `tags.0`.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

fn is_operator_document(value: &Bson) -> bool {
    matches!(value, Bson::Document(doc) if doc.keys().next().is_some_and(|key| key.starts_with('$')))
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Whether the document satisfies every condition of `filter`.
    pub fn evaluate(&self, filter: &Document) -> Result<bool, MemoryStoreError> {
        for (key, condition) in filter {
            let matched = match key.as_str() {
                "$and" => self.all(key, condition)?,
                "$or" => self.any(key, condition)?,
                "$nor" => !self.any(key, condition)?,
                operator if operator.starts_with('$') => {
                    return Err(MemoryStoreError::UnknownOperator(operator.to_string()));
                }
                path => self.field(path, condition)?,
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        filter: &Document,
    ) -> Result<Vec<&'a Document>, MemoryStoreError> {
        let mut matched = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(document).evaluate(filter)? {
                matched.push(document);
            }
        }

        Ok(matched)
    }

    fn clauses<'f>(operator: &str, condition: &'f Bson) -> Result<Vec<&'f Document>, MemoryStoreError> {
        let Bson::Array(items) = condition else {
            return Err(MemoryStoreError::operand(operator, "expected an array"));
        };

        if items.is_empty() {
            return Err(MemoryStoreError::operand(operator, "expected a non-empty array"));
        }

        items
            .iter()
            .map(|item| {
                item.as_document()
                    .ok_or_else(|| MemoryStoreError::operand(operator, "expected an array of documents"))
            })
            .collect()
    }

    fn all(&self, operator: &str, condition: &Bson) -> Result<bool, MemoryStoreError> {
        for clause in Self::clauses(operator, condition)? {
            if !self.evaluate(clause)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn any(&self, operator: &str, condition: &Bson) -> Result<bool, MemoryStoreError> {
        for clause in Self::clauses(operator, condition)? {
            if self.evaluate(clause)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn field(&self, path: &str, condition: &Bson) -> Result<bool, MemoryStoreError> {
        let value = lookup(self.document, path);

        match condition {
            Bson::Document(operators) if is_operator_document(condition) => {
                Self::operators(value, operators)
            }
            _ => Ok(equals(value, condition)),
        }
    }

    fn operators(value: Option<&Bson>, operators: &Document) -> Result<bool, MemoryStoreError> {
        for (operator, operand) in operators {
            let matched = match operator.as_str() {
                "$eq" => equals(value, operand),
                "$ne" => !equals(value, operand),
                "$gt" => compare(value, operand, |ordering| ordering == Ordering::Greater),
                "$gte" => compare(value, operand, |ordering| ordering != Ordering::Less),
                "$lt" => compare(value, operand, |ordering| ordering == Ordering::Less),
                "$lte" => compare(value, operand, |ordering| ordering != Ordering::Greater),
                "$in" => Self::candidates(operator, operand)?
                    .iter()
                    .any(|candidate| equals(value, candidate)),
                "$nin" => !Self::candidates(operator, operand)?
                    .iter()
                    .any(|candidate| equals(value, candidate)),
                "$exists" => value.is_some() == truthy(operand),
                "$not" => match operand {
                    Bson::Document(inner) => !Self::operators(value, inner)?,
                    _ => return Err(MemoryStoreError::operand(operator, "expected a document")),
                },
                other => return Err(MemoryStoreError::UnknownOperator(other.to_string())),
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn candidates<'o>(operator: &str, operand: &'o Bson) -> Result<&'o Vec<Bson>, MemoryStoreError> {
        match operand {
            Bson::Array(items) => Ok(items),
            _ => Err(MemoryStoreError::operand(operator, "expected an array")),
        }
    }
}

/// Equality with array membership; a missing field equals null.
fn equals(value: Option<&Bson>, expected: &Bson) -> bool {
    let expected = Comparable::from(expected);

    match value {
        None => expected == Comparable::Null,
        Some(whole @ Bson::Array(items)) => {
            Comparable::from(whole) == expected
                || items.iter().any(|item| Comparable::from(item) == expected)
        }
        Some(value) => Comparable::from(value) == expected,
    }
}

/// Range comparison; values of different types never match.
fn compare(value: Option<&Bson>, operand: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    let operand = Comparable::from(operand);
    let test = |candidate: &Bson| {
        Comparable::from(candidate)
            .partial_cmp(&operand)
            .is_some_and(&accept)
    };

    match value {
        None => false,
        Some(Bson::Array(items)) => items.iter().any(test),
        Some(value) => test(value),
    }
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(flag) => *flag,
        Bson::Null | Bson::Undefined => false,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        _ => true,
    }
}
