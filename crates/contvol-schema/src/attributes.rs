//! Attribute contract advertised to the orchestrating framework.

use crate::document::{AttributePath, Document};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttributeKind {
    String,
    SingleNested {
        attributes: BTreeMap<String, Attribute>,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Attribute {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    pub computed: bool,
    #[serde(flatten)]
    pub kind: AttributeKind,
}

impl Attribute {
    pub fn string() -> Self {
        Self {
            description: None,
            required: false,
            computed: false,
            kind: AttributeKind::String,
        }
    }

    pub fn single_nested(attributes: impl IntoIterator<Item = (&'static str, Attribute)>) -> Self {
        Self {
            description: None,
            required: false,
            computed: false,
            kind: AttributeKind::SingleNested {
                attributes: attributes
                    .into_iter()
                    .map(|(k, v)| (k.to_owned(), v))
                    .collect(),
            },
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    #[must_use]
    pub fn description(mut self, text: &str) -> Self {
        self.description = Some(text.to_owned());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaViolation {
    MissingRequired(String),
    EmptyRequired(String),
    WrongType {
        path: String,
        expected: &'static str,
    },
    ComputedInConfig(String),
    UnknownAttribute(String),
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaViolation::MissingRequired(p) => write!(f, "missing required attribute '{p}'"),
            SchemaViolation::EmptyRequired(p) => {
                write!(f, "required attribute '{p}' must not be empty")
            }
            SchemaViolation::WrongType { path, expected } => {
                write!(f, "attribute '{path}' must be a {expected}")
            }
            SchemaViolation::ComputedInConfig(p) => {
                write!(f, "attribute '{p}' is computed and cannot be configured")
            }
            SchemaViolation::UnknownAttribute(p) => write!(f, "unknown attribute '{p}'"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("invalid configuration: {}", join_violations(.0))]
    Invalid(Vec<SchemaViolation>),
}

fn join_violations(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResourceSchema {
    pub description: String,
    pub attributes: BTreeMap<String, Attribute>,
}

impl ResourceSchema {
    /// Check a configuration document against the attribute contract.
    ///
    /// All violations are collected rather than stopping at the first one.
    pub fn validate_config(&self, config: &Document) -> Result<(), SchemaError> {
        let mut violations = Vec::new();
        validate_object(&self.attributes, config.as_map(), None, &mut violations);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::Invalid(violations))
        }
    }

    pub fn attribute(&self, path: &AttributePath) -> Option<&Attribute> {
        let (first, rest) = path.steps().split_first()?;
        let mut current = self.attributes.get(first)?;
        for step in rest {
            match &current.kind {
                AttributeKind::SingleNested { attributes } => current = attributes.get(step)?,
                AttributeKind::String => return None,
            }
        }
        Some(current)
    }
}

fn join_path(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(p) => format!("{p}.{name}"),
        None => name.to_owned(),
    }
}

fn validate_object(
    attributes: &BTreeMap<String, Attribute>,
    values: &Map<String, Value>,
    parent: Option<&str>,
    violations: &mut Vec<SchemaViolation>,
) {
    for key in values.keys() {
        if !attributes.contains_key(key) {
            violations.push(SchemaViolation::UnknownAttribute(join_path(parent, key)));
        }
    }

    for (name, attr) in attributes {
        let path = join_path(parent, name);
        let value = values.get(name).filter(|v| !v.is_null());

        if attr.computed && !attr.required {
            if value.is_some() {
                violations.push(SchemaViolation::ComputedInConfig(path));
            }
            continue;
        }

        let Some(value) = value else {
            if attr.required {
                violations.push(SchemaViolation::MissingRequired(path));
            }
            continue;
        };

        match &attr.kind {
            AttributeKind::String => match value.as_str() {
                Some("") if attr.required => {
                    violations.push(SchemaViolation::EmptyRequired(path));
                }
                Some(_) => {}
                None => violations.push(SchemaViolation::WrongType {
                    path,
                    expected: "string",
                }),
            },
            AttributeKind::SingleNested { attributes: nested } => match value.as_object() {
                Some(map) => validate_object(nested, map, Some(&path), violations),
                None => violations.push(SchemaViolation::WrongType {
                    path,
                    expected: "object",
                }),
            },
        }
    }
}

/// Schema for the `<provider>_container_volume` resource.
pub fn container_volume_schema() -> ResourceSchema {
    let attributes = [
        (
            "name",
            Attribute::string()
                .required()
                .description("A name for this volume resource."),
        ),
        (
            "inventory",
            Attribute::single_nested([("seed", Attribute::string().required())])
                .required()
                .description(
                    "The inventory this volume belongs to. This is received as a direct \
                     input from an inventory data source.",
                ),
        ),
        (
            "id",
            Attribute::string().computed().description(
                "The unique identifier for this volume. This is generated from the volume \
                 name and inventory seed.",
            ),
        ),
    ];

    ResourceSchema {
        description: "A volume in the container engine that can be referenced by containers."
            .to_owned(),
        attributes: attributes
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v))
            .collect(),
    }
}
