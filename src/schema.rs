//! Translation of MCP tool input schemas into argument validators.
//!
//! An MCP tool declares its input as a small JSON Schema: an object whose
//! `properties` map field names to a `type` tag. [`translate`] turns that
//! declaration into a [`Validator`] once, at discovery time, so each tool call
//! is checked against a prepared table instead of re-reading the schema.

use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// A tool's input schema could not be turned into a validator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("unsupported root type: {0}")]
    UnsupportedRootType(String),
    #[error("missing properties")]
    MissingProperties,
}

/// Tool call arguments did not satisfy the declared schema.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("arguments must be a JSON object, found {found}")]
    NotAnObject { found: &'static str },
    #[error("missing required argument `{field}`")]
    Missing { field: String },
    #[error("invalid argument `{field}`: expected {expected}, found {found}")]
    WrongType {
        field: String,
        expected: FieldKind,
        found: &'static str,
    },
}

impl ValidationError {
    /// Name of the offending field, if the error concerns a single field.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::NotAnObject { .. } => None,
            Self::Missing { field } | Self::WrongType { field, .. } => Some(field),
        }
    }
}

/// The kind of value a declared field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Numeric,
    Text,
    Boolean,
    /// Array of elements of any type.
    Sequence,
    Any,
}

impl FieldKind {
    /// Maps a JSON Schema `type` tag to a field kind. Unknown or missing tags accept anything.
    pub fn from_type_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("number") => Self::Numeric,
            Some("string") => Self::Text,
            Some("boolean") => Self::Boolean,
            Some("array") => Self::Sequence,
            _ => Self::Any,
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Numeric => value.is_number(),
            Self::Text => value.is_string(),
            Self::Boolean => value.is_boolean(),
            Self::Sequence => value.is_array(),
            Self::Any => true,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric => write!(f, "number"),
            Self::Text => write!(f, "string"),
            Self::Boolean => write!(f, "boolean"),
            Self::Sequence => write!(f, "array"),
            Self::Any => write!(f, "any"),
        }
    }
}

/// One declared argument of a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
}

/// Checks tool call arguments against the fields a tool declared.
///
/// Fields not declared in the schema are passed through untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Validator {
    fields: Vec<FieldSpec>,
}

/// Builds a [`Validator`] from a tool's `inputSchema`.
///
/// A field is required when it is listed in the schema's `required` array.
/// Schemas without a `required` key treat every typed field as required and
/// `any` fields as optional.
///
/// When a `required` array is present it is authoritative: a typed field
/// missing from it is optional, as JSON Schema defines it, rather than
/// required for having a type.
///
/// # Errors
///
/// Returns [`SchemaError::UnsupportedRootType`] if the root `type` is not
/// `"object"` and [`SchemaError::MissingProperties`] if no `properties`
/// mapping is declared.
pub fn translate(input_schema: &Value) -> Result<Validator, SchemaError> {
    let root_type = input_schema.get("type").and_then(Value::as_str);
    if root_type != Some("object") {
        let found = match input_schema.get("type") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "none".to_string(),
        };
        return Err(SchemaError::UnsupportedRootType(found));
    }

    let properties = input_schema
        .get("properties")
        .and_then(Value::as_object)
        .ok_or(SchemaError::MissingProperties)?;

    let required_list: Option<Vec<&str>> = input_schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect());

    let fields = properties
        .iter()
        .map(|(name, property)| {
            let kind = FieldKind::from_type_tag(property.get("type").and_then(Value::as_str));
            let required = match &required_list {
                Some(names) => names.contains(&name.as_str()),
                None => kind != FieldKind::Any,
            };
            FieldSpec {
                name: name.clone(),
                kind,
                required,
            }
        })
        .collect();

    Ok(Validator { fields })
}

impl Validator {
    /// The declared fields, in schema order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Validates an arguments value and returns it as an object map.
    ///
    /// `null` is treated as an empty argument object, since models commonly
    /// send it for tools that take no input.
    pub fn validate(&self, args: &Value) -> Result<Map<String, Value>, ValidationError> {
        let map = match args {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                return Err(ValidationError::NotAnObject {
                    found: json_type_name(other),
                })
            }
        };

        for field in &self.fields {
            match map.get(&field.name) {
                None | Some(Value::Null) if field.required => {
                    return Err(ValidationError::Missing {
                        field: field.name.clone(),
                    });
                }
                None | Some(Value::Null) => {}
                Some(value) if !field.kind.accepts(value) => {
                    return Err(ValidationError::WrongType {
                        field: field.name.clone(),
                        expected: field.kind,
                        found: json_type_name(value),
                    });
                }
                Some(_) => {}
            }
        }

        Ok(map)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
