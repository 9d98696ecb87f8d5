//! Update operator application for the in-memory store.
//!
//! Supports `$set`, `$unset`, `$inc`, `$push` and `$setOnInsert`. Update documents
//! must consist of operators only; replacement documents are rejected the same way
//! `update_one` rejects them on a real deployment.

use bson::{Bson, Document};

use crate::{error::MemoryStoreError, evaluator::lookup};

const OPERATORS: &[&str] = &["$set", "$unset", "$inc", "$push", "$setOnInsert"];

/// Rejects update documents that cannot be applied.
pub(crate) fn check(update: &Document) -> Result<(), MemoryStoreError> {
    if update.is_empty() {
        return Err(MemoryStoreError::EmptyUpdate);
    }

    for (operator, operand) in update {
        if !operator.starts_with('$') {
            return Err(MemoryStoreError::ReplacementUpdate);
        }

        if !OPERATORS.contains(&operator.as_str()) {
            return Err(MemoryStoreError::UnknownOperator(operator.clone()));
        }

        if !matches!(operand, Bson::Document(_)) {
            return Err(MemoryStoreError::operand(operator, "expected a document"));
        }
    }

    Ok(())
}

/// Applies a checked update to `document`. `$setOnInsert` only applies when `inserting`.
pub(crate) fn apply(document: &mut Document, update: &Document, inserting: bool) -> Result<(), MemoryStoreError> {
    for (operator, operand) in update {
        let Bson::Document(fields) = operand else {
            return Err(MemoryStoreError::operand(operator, "expected a document"));
        };

        for (path, value) in fields {
            match operator.as_str() {
                "$set" => set_path(document, path, value.clone())?,
                "$setOnInsert" if inserting => set_path(document, path, value.clone())?,
                "$setOnInsert" => {}
                "$unset" => unset_path(document, path),
                "$inc" => {
                    let sum = add(operator, lookup(document, path), value)?;
                    set_path(document, path, sum)?;
                }
                "$push" => {
                    let pushed = match lookup(document, path) {
                        None => Bson::Array(vec![value.clone()]),
                        Some(Bson::Array(items)) => {
                            let mut items = items.clone();
                            items.push(value.clone());
                            Bson::Array(items)
                        }
                        Some(_) => {
                            return Err(MemoryStoreError::operand(operator, format!("{path} is not an array")));
                        }
                    };
                    set_path(document, path, pushed)?;
                }
                other => return Err(MemoryStoreError::UnknownOperator(other.to_string())),
            }
        }
    }

    Ok(())
}

fn set_path(document: &mut Document, path: &str, value: Bson) -> Result<(), MemoryStoreError> {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            let child = document
                .entry(head.to_string())
                .or_insert_with(|| Bson::Document(Document::new()));

            match child {
                Bson::Document(inner) => set_path(inner, rest, value),
                _ => Err(MemoryStoreError::operand("$set", format!("{head} is not a document"))),
            }
        }
    }
}

fn unset_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                unset_path(inner, rest);
            }
        }
    }
}

fn add(operator: &str, current: Option<&Bson>, delta: &Bson) -> Result<Bson, MemoryStoreError> {
    let current = current.unwrap_or(&Bson::Int32(0));

    let sum = match (current, delta) {
        (Bson::Int32(a), Bson::Int32(b)) => match a.checked_add(*b) {
            Some(sum) => Bson::Int32(sum),
            None => Bson::Int64(*a as i64 + *b as i64),
        },
        (Bson::Int32(_) | Bson::Int64(_), Bson::Int32(_) | Bson::Int64(_)) => {
            Bson::Int64(as_i64(current).wrapping_add(as_i64(delta)))
        }
        (Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_), Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) => {
            Bson::Double(as_f64(current) + as_f64(delta))
        }
        _ => return Err(MemoryStoreError::operand(operator, "cannot increment a non-numeric value")),
    };

    Ok(sum)
}

fn as_i64(value: &Bson) -> i64 {
    match value {
        Bson::Int32(n) => *n as i64,
        Bson::Int64(n) => *n,
        _ => 0,
    }
}

fn as_f64(value: &Bson) -> f64 {
    match value {
        Bson::Int32(n) => *n as f64,
        Bson::Int64(n) => *n as f64,
        Bson::Double(n) => *n,
        _ => 0.0,
    }
}
