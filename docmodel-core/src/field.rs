//! Field kinds and field descriptors.
//!
//! Each kind ([`StringField`], [`NumberField`], [`ListField`], [`DateField`],
//! [`BooleanField`]) is a validation policy built from a BSON options document checked
//! against the kind's [`ConstraintSet`]. A [`FieldDescriptor`] binds a kind to the
//! attribute name it was declared under.
//!
//! Every policy runs its checks in the same order: required, then type, then shape. A
//! value that is absent (`None`) is only an error when the field is required.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::field::StringField;
//! use bson::doc;
//!
//! let name = StringField::new(doc! { "size": 20, "required": true })?;
//! name.validate(Some(&"Alice".into()), "name")?;
//! ```

use bson::{Bson, Document};

use crate::{
    constraint::{ConstraintSet, OptionType, ValueType, type_name},
    error::{ModelResult, ValidationError, ValidationKind},
};

fn required_error(field_name: &str) -> ValidationError {
    ValidationError::new(
        field_name,
        ValidationKind::Required,
        "marked as required and no value provided",
    )
}

fn type_error(field_name: &str, expected: &str, value: &Bson) -> ValidationError {
    ValidationError::new(
        field_name,
        ValidationKind::Type,
        format!("{expected} value expected, got {}", type_name(value)),
    )
}

/// Null counts as "no value" for the required check of every kind.
fn is_missing(value: Option<&Bson>) -> bool {
    matches!(value, None | Some(Bson::Null))
}

/// A text field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringField {
    pub size: Option<usize>,
    pub required: bool,
    pub unique: bool,
}

impl StringField {
    pub const CONSTRAINTS: ConstraintSet = ConstraintSet::new(
        "string",
        &[
            ("size", OptionType::Integer),
            ("required", OptionType::Boolean),
            ("unique", OptionType::Boolean),
        ],
    );

    pub fn new(options: Document) -> ModelResult<Self> {
        let checked = Self::CONSTRAINTS.check(&options)?;

        Ok(Self {
            size: checked.integer("size"),
            required: checked.boolean("required").unwrap_or(false),
            unique: checked.boolean("unique").unwrap_or(false),
        })
    }

    pub fn validate(&self, value: Option<&Bson>, field_name: &str) -> Result<(), ValidationError> {
        if self.required && (is_missing(value) || matches!(value, Some(Bson::String(s)) if s.is_empty())) {
            return Err(required_error(field_name));
        }

        let Some(value) = value else {
            return Ok(());
        };

        let Bson::String(text) = value else {
            return Err(type_error(field_name, "string", value));
        };

        if let Some(size) = self.size {
            let length = text.chars().count();

            if length > size {
                return Err(ValidationError::new(
                    field_name,
                    ValidationKind::Size,
                    format!("size exceeded, max size {size}, provided {length}"),
                ));
            }
        }

        Ok(())
    }
}

/// An integer or floating point field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberField {
    pub required: bool,
}

impl NumberField {
    pub const CONSTRAINTS: ConstraintSet =
        ConstraintSet::new("number", &[("required", OptionType::Boolean)]);

    pub fn new(options: Document) -> ModelResult<Self> {
        let checked = Self::CONSTRAINTS.check(&options)?;

        Ok(Self {
            required: checked.boolean("required").unwrap_or(false),
        })
    }

    pub fn validate(&self, value: Option<&Bson>, field_name: &str) -> Result<(), ValidationError> {
        if self.required && is_missing(value) {
            return Err(required_error(field_name));
        }

        match value {
            Some(value) if !ValueType::Number.matches(value) => {
                Err(type_error(field_name, "number (integer or float)", value))
            }
            _ => Ok(()),
        }
    }
}

/// A sequence field, optionally constrained to a single item type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListField {
    pub required: bool,
    pub item_type: Option<ValueType>,
}

impl ListField {
    pub const CONSTRAINTS: ConstraintSet = ConstraintSet::new(
        "list",
        &[
            ("required", OptionType::Boolean),
            ("item_type", OptionType::TypeTag),
        ],
    );

    pub fn new(options: Document) -> ModelResult<Self> {
        let checked = Self::CONSTRAINTS.check(&options)?;

        Ok(Self {
            required: checked.boolean("required").unwrap_or(false),
            item_type: checked.type_tag("item_type"),
        })
    }

    pub fn validate(&self, value: Option<&Bson>, field_name: &str) -> Result<(), ValidationError> {
        if self.required && (is_missing(value) || matches!(value, Some(Bson::Array(items)) if items.is_empty())) {
            return Err(required_error(field_name));
        }

        let Some(value) = value else {
            return Ok(());
        };

        let Bson::Array(items) = value else {
            return Err(type_error(field_name, "list", value));
        };

        if let Some(item_type) = self.item_type {
            if let Some((index, item)) = items
                .iter()
                .enumerate()
                .find(|(_, item)| !item_type.matches(item))
            {
                return Err(ValidationError::new(
                    field_name,
                    ValidationKind::ItemType,
                    format!(
                        "list items must be of type {item_type}, item {index} is {}",
                        type_name(item),
                    ),
                ));
            }
        }

        Ok(())
    }
}

/// A date or date-time field, stored as a BSON `DateTime`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DateField {
    pub required: bool,
}

impl DateField {
    pub const CONSTRAINTS: ConstraintSet =
        ConstraintSet::new("date", &[("required", OptionType::Boolean)]);

    pub fn new(options: Document) -> ModelResult<Self> {
        let checked = Self::CONSTRAINTS.check(&options)?;

        Ok(Self {
            required: checked.boolean("required").unwrap_or(false),
        })
    }

    pub fn validate(&self, value: Option<&Bson>, field_name: &str) -> Result<(), ValidationError> {
        if self.required && is_missing(value) {
            return Err(required_error(field_name));
        }

        match value {
            Some(value) if !ValueType::Date.matches(value) => {
                Err(type_error(field_name, "date or datetime", value))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BooleanField {
    pub required: bool,
    pub unique: bool,
}

impl BooleanField {
    pub const CONSTRAINTS: ConstraintSet = ConstraintSet::new(
        "boolean",
        &[
            ("required", OptionType::Boolean),
            ("unique", OptionType::Boolean),
        ],
    );

    pub fn new(options: Document) -> ModelResult<Self> {
        let checked = Self::CONSTRAINTS.check(&options)?;

        Ok(Self {
            required: checked.boolean("required").unwrap_or(false),
            unique: checked.boolean("unique").unwrap_or(false),
        })
    }

    pub fn validate(&self, value: Option<&Bson>, field_name: &str) -> Result<(), ValidationError> {
        if self.required && is_missing(value) {
            return Err(required_error(field_name));
        }

        match value {
            Some(value) if !ValueType::Boolean.matches(value) => {
                Err(type_error(field_name, "boolean", value))
            }
            _ => Ok(()),
        }
    }
}

/// Any field kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    String(StringField),
    Number(NumberField),
    List(ListField),
    Date(DateField),
    Boolean(BooleanField),
}

impl Field {
    /// Builds a field of the kind named by `kind` (`string`, `number`, `list`, `date`, `boolean`).
    pub fn of_kind(kind: &str, options: Document) -> ModelResult<Self> {
        Ok(match kind {
            "string" => StringField::new(options)?.into(),
            "number" => NumberField::new(options)?.into(),
            "list" => ListField::new(options)?.into(),
            "date" => DateField::new(options)?.into(),
            "boolean" => BooleanField::new(options)?.into(),
            other => {
                return Err(crate::error::ModelError::Configuration(format!(
                    "unknown field kind `{other}`"
                )));
            }
        })
    }

    /// The constraint set of the kind named by `kind`, if there is such a kind.
    pub fn constraints_for(kind: &str) -> Option<&'static ConstraintSet> {
        match kind {
            "string" => Some(&StringField::CONSTRAINTS),
            "number" => Some(&NumberField::CONSTRAINTS),
            "list" => Some(&ListField::CONSTRAINTS),
            "date" => Some(&DateField::CONSTRAINTS),
            "boolean" => Some(&BooleanField::CONSTRAINTS),
            _ => None,
        }
    }

    pub fn is_unique(&self) -> bool {
        match self {
            Field::String(field) => field.unique,
            Field::Boolean(field) => field.unique,
            _ => false,
        }
    }

    /// Runs the kind's checks against `value` (`None` meaning "never set").
    pub fn validate(&self, value: Option<&Bson>, field_name: &str) -> Result<(), ValidationError> {
        match self {
            Field::String(field) => field.validate(value, field_name),
            Field::Number(field) => field.validate(value, field_name),
            Field::List(field) => field.validate(value, field_name),
            Field::Date(field) => field.validate(value, field_name),
            Field::Boolean(field) => field.validate(value, field_name),
        }
    }
}

impl From<StringField> for Field {
    fn from(field: StringField) -> Self {
        Field::String(field)
    }
}

impl From<NumberField> for Field {
    fn from(field: NumberField) -> Self {
        Field::Number(field)
    }
}

impl From<ListField> for Field {
    fn from(field: ListField) -> Self {
        Field::List(field)
    }
}

impl From<DateField> for Field {
    fn from(field: DateField) -> Self {
        Field::Date(field)
    }
}

impl From<BooleanField> for Field {
    fn from(field: BooleanField) -> Self {
        Field::Boolean(field)
    }
}

/// A field bound to the attribute name it was declared under.
///
/// Descriptors are created once when a model's schema is built and are shared read-only
/// by every instance of that model.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    owner: &'static str,
    name: String,
    slot: String,
    field: Field,
}

impl FieldDescriptor {
    /// Binds `field` to `name` on the model `owner`.
    pub fn bind(owner: &'static str, name: impl Into<String>, field: Field) -> Self {
        let name = name.into();

        Self {
            owner,
            slot: format!("_{name}"),
            name,
            field,
        }
    }

    /// Name of the model declaring this field.
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier of the per-instance storage slot.
    pub fn slot(&self) -> &str {
        &self.slot
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn validate(&self, value: Option<&Bson>) -> Result<(), ValidationError> {
        self.field.validate(value, &self.name)
    }
}
