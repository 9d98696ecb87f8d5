//! Constraint sets: the closed list of options each field kind accepts.
//!
//! Options are supplied as a BSON document at declaration time. [`ConstraintSet::check`]
//! rejects unknown keys and ill-typed values immediately, so a schema that builds is a
//! schema whose options are all understood.

use std::{collections::BTreeMap, fmt, str::FromStr};

use bson::{Bson, Document};

use crate::error::{ModelError, ModelResult};

/// BSON value categories a field or list item can be constrained to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    String,
    /// Any of `Int32`, `Int64` or `Double`.
    Number,
    /// `Int32` or `Int64`.
    Integer,
    Double,
    Boolean,
    /// A BSON `DateTime`.
    Date,
    List,
    Document,
    ObjectId,
}

impl ValueType {
    /// Returns the tag used to name this type in options and messages.
    pub fn tag(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Integer => "integer",
            ValueType::Double => "float",
            ValueType::Boolean => "boolean",
            ValueType::Date => "date",
            ValueType::List => "list",
            ValueType::Document => "document",
            ValueType::ObjectId => "object_id",
        }
    }

    /// Whether `value` belongs to this category.
    pub fn matches(&self, value: &Bson) -> bool {
        matches!(
            (self, value),
            (ValueType::String, Bson::String(_))
                | (ValueType::Number, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
                | (ValueType::Integer, Bson::Int32(_) | Bson::Int64(_))
                | (ValueType::Double, Bson::Double(_))
                | (ValueType::Boolean, Bson::Boolean(_))
                | (ValueType::Date, Bson::DateTime(_))
                | (ValueType::List, Bson::Array(_))
                | (ValueType::Document, Bson::Document(_))
                | (ValueType::ObjectId, Bson::ObjectId(_))
        )
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ValueType {
    type Err = ModelError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        Ok(match tag {
            "string" | "str" => ValueType::String,
            "number" => ValueType::Number,
            "integer" | "int" => ValueType::Integer,
            "float" | "double" => ValueType::Double,
            "boolean" | "bool" => ValueType::Boolean,
            "date" | "datetime" => ValueType::Date,
            "list" => ValueType::List,
            "document" | "dict" => ValueType::Document,
            "object_id" => ValueType::ObjectId,
            other => {
                return Err(ModelError::Configuration(format!(
                    "unknown item type `{other}`"
                )));
            }
        })
    }
}

/// Short name of a BSON value's type for error messages.
pub(crate) fn type_name(value: &Bson) -> &'static str {
    match value {
        Bson::Double(_) => "double",
        Bson::String(_) => "string",
        Bson::Array(_) => "array",
        Bson::Document(_) => "document",
        Bson::Boolean(_) => "boolean",
        Bson::Null => "null",
        Bson::Int32(_) => "int32",
        Bson::Int64(_) => "int64",
        Bson::DateTime(_) => "datetime",
        Bson::ObjectId(_) => "object_id",
        Bson::Timestamp(_) => "timestamp",
        Bson::Decimal128(_) => "decimal128",
        Bson::Binary(_) => "binary",
        _ => "other",
    }
}

/// The accepted type of a single option value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionType {
    /// A non-negative integer.
    Integer,
    Boolean,
    /// A [`ValueType`] tag.
    TypeTag,
}

/// A checked option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Integer(usize),
    Boolean(bool),
    TypeTag(ValueType),
}

/// Options that passed [`ConstraintSet::check`], keyed by name.
#[derive(Debug, Clone, Default)]
pub struct CheckedOptions {
    values: BTreeMap<&'static str, OptionValue>,
}

impl CheckedOptions {
    pub fn integer(&self, name: &str) -> Option<usize> {
        match self.values.get(name) {
            Some(OptionValue::Integer(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(OptionValue::Boolean(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn type_tag(&self, name: &str) -> Option<ValueType> {
        match self.values.get(name) {
            Some(OptionValue::TypeTag(value)) => Some(*value),
            _ => None,
        }
    }
}

/// The closed set of options a field kind recognizes.
#[derive(Debug, Clone, Copy)]
pub struct ConstraintSet {
    kind: &'static str,
    options: &'static [(&'static str, OptionType)],
}

impl ConstraintSet {
    pub const fn new(kind: &'static str, options: &'static [(&'static str, OptionType)]) -> Self {
        Self { kind, options }
    }

    /// Name of the field kind this set belongs to.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Names of the recognized options, in declaration order.
    pub fn option_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.options.iter().map(|(name, _)| *name)
    }

    /// Validates raw options against this set.
    ///
    /// Unknown keys are reported together, sorted, before any value is inspected.
    pub fn check(&self, options: &Document) -> ModelResult<CheckedOptions> {
        let mut unknown = options
            .keys()
            .filter(|key| !self.options.iter().any(|(name, _)| *name == key.as_str()))
            .map(String::as_str)
            .collect::<Vec<_>>();

        if !unknown.is_empty() {
            unknown.sort_unstable();
            return Err(ModelError::Configuration(format!(
                "{} are not allowed for {} fields",
                unknown.join(", "),
                self.kind,
            )));
        }

        let mut checked = CheckedOptions::default();

        for (name, option_type) in self.options {
            if let Some(raw) = options.get(*name) {
                checked
                    .values
                    .insert(*name, self.convert(name, *option_type, raw)?);
            }
        }

        Ok(checked)
    }

    fn convert(&self, name: &str, option_type: OptionType, raw: &Bson) -> ModelResult<OptionValue> {
        let invalid = || {
            ModelError::Configuration(format!(
                "option {name} of {} fields expects {}, got {}",
                self.kind,
                match option_type {
                    OptionType::Integer => "a non-negative integer",
                    OptionType::Boolean => "a boolean",
                    OptionType::TypeTag => "a type tag",
                },
                type_name(raw),
            ))
        };

        match (option_type, raw) {
            (OptionType::Integer, Bson::Int32(value)) => usize::try_from(*value)
                .map(OptionValue::Integer)
                .map_err(|_| invalid()),
            (OptionType::Integer, Bson::Int64(value)) => usize::try_from(*value)
                .map(OptionValue::Integer)
                .map_err(|_| invalid()),
            (OptionType::Boolean, Bson::Boolean(value)) => Ok(OptionValue::Boolean(*value)),
            (OptionType::TypeTag, Bson::String(tag)) => tag.parse().map(OptionValue::TypeTag),
            _ => Err(invalid()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    const TEXT: ConstraintSet = ConstraintSet::new(
        "string",
        &[
            ("size", OptionType::Integer),
            ("required", OptionType::Boolean),
            ("unique", OptionType::Boolean),
        ],
    );

    #[test]
    fn test_unknown_keys_are_listed_sorted() {
        let err = TEXT
            .check(&doc! { "size": 3, "zeta": 1, "alpha": true })
            .unwrap_err();

        match err {
            ModelError::Configuration(message) => {
                assert!(message.starts_with("alpha, zeta are not allowed"), "{message}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_recognized_keys_are_converted() {
        let checked = TEXT
            .check(&doc! { "size": 20_i64, "required": true })
            .unwrap();

        assert_eq!(checked.integer("size"), Some(20));
        assert_eq!(checked.boolean("required"), Some(true));
        assert_eq!(checked.boolean("unique"), None);
    }

    #[test]
    fn test_ill_typed_values_are_rejected() {
        assert!(matches!(
            TEXT.check(&doc! { "size": "big" }),
            Err(ModelError::Configuration(_))
        ));
        assert!(matches!(
            TEXT.check(&doc! { "size": -1 }),
            Err(ModelError::Configuration(_))
        ));
        assert!(matches!(
            TEXT.check(&doc! { "required": 1 }),
            Err(ModelError::Configuration(_))
        ));
    }

    #[test]
    fn test_type_tags() {
        assert_eq!("str".parse::<ValueType>().unwrap(), ValueType::String);
        assert_eq!("object_id".parse::<ValueType>().unwrap(), ValueType::ObjectId);
        assert!("widget".parse::<ValueType>().is_err());

        assert!(ValueType::Number.matches(&Bson::Int64(4)));
        assert!(ValueType::Number.matches(&Bson::Double(4.5)));
        assert!(!ValueType::Number.matches(&Bson::Boolean(true)));
    }

    #[test]
    fn test_integer_and_float_tags_are_distinct() {
        assert_eq!("int".parse::<ValueType>().unwrap(), ValueType::Integer);
        assert_eq!("float".parse::<ValueType>().unwrap(), ValueType::Double);

        assert!(ValueType::Integer.matches(&Bson::Int32(1)));
        assert!(ValueType::Integer.matches(&Bson::Int64(1)));
        assert!(!ValueType::Integer.matches(&Bson::Double(2.5)));
        assert!(ValueType::Double.matches(&Bson::Double(2.5)));
        assert!(!ValueType::Double.matches(&Bson::Int32(2)));
    }
}
