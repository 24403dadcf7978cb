//! Loosely-typed key/value records exchanged with the orchestrating framework.
//!
//! Plans, configuration and persisted state all travel as a [`Document`]: a
//! JSON object whose attributes may be null. Typed access goes through a
//! single validated decode step, so a record with the wrong shape becomes a
//! [`DocumentError`] instead of a missing-field surprise further down.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("expected an object at '{path}', found {found}")]
    NotAnObject { path: String, found: String },
    #[error("attribute '{0}' is missing or null")]
    MissingAttribute(String),
    #[error("attribute '{0}' must not be empty")]
    EmptyAttribute(String),
    #[error("failed to decode '{path}': {message}")]
    Decode { path: String, message: String },
    #[error("failed to encode record: {0}")]
    Encode(String),
    #[error("invalid attribute path: '{0}'")]
    InvalidPath(String),
}

/// Dotted path to an attribute, e.g. `inventory.seed`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributePath(Vec<String>);

impl AttributePath {
    pub fn root(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    #[must_use]
    pub fn child(mut self, name: impl Into<String>) -> Self {
        self.0.push(name.into());
        self
    }

    pub fn parse(dotted: &str) -> Result<Self, DocumentError> {
        let steps: Vec<String> = dotted.split('.').map(str::to_owned).collect();
        if steps.iter().any(String::is_empty) {
            return Err(DocumentError::InvalidPath(dotted.to_owned()));
        }
        Ok(Self(steps))
    }

    pub fn steps(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(DocumentError::NotAnObject {
                path: "<root>".to_owned(),
                found: kind_of(&other).to_owned(),
            }),
        }
    }

    /// Encode a typed record into a document.
    pub fn from_model<T: Serialize>(model: &T) -> Result<Self, DocumentError> {
        let value = serde_json::to_value(model).map_err(|e| DocumentError::Encode(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode the whole record into `T`.
    pub fn get<T: DeserializeOwned>(&self) -> Result<T, DocumentError> {
        serde_json::from_value(Value::Object(self.0.clone())).map_err(|e| DocumentError::Decode {
            path: "<root>".to_owned(),
            message: e.to_string(),
        })
    }

    /// Replace the whole record with the encoding of `model`.
    pub fn set<T: Serialize>(&mut self, model: &T) -> Result<(), DocumentError> {
        *self = Self::from_model(model)?;
        Ok(())
    }

    /// Raw lookup. Returns `None` when any step is absent.
    pub fn attribute(&self, path: &AttributePath) -> Option<&Value> {
        let (first, rest) = path.steps().split_first()?;
        let mut current = self.0.get(first)?;
        for step in rest {
            current = current.as_object()?.get(step)?;
        }
        Some(current)
    }

    /// True when the attribute is absent or explicitly null.
    pub fn is_null(&self, path: &AttributePath) -> bool {
        !matches!(self.attribute(path), Some(v) if !v.is_null())
    }

    /// Decode a single attribute into `T`. Absent and null values are errors.
    pub fn get_attribute<T: DeserializeOwned>(
        &self,
        path: &AttributePath,
    ) -> Result<T, DocumentError> {
        let value = match self.attribute(path) {
            Some(v) if !v.is_null() => v.clone(),
            _ => return Err(DocumentError::MissingAttribute(path.to_string())),
        };
        serde_json::from_value(value).map_err(|e| DocumentError::Decode {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    /// Set a single attribute, creating intermediate objects as needed.
    pub fn set_attribute(
        &mut self,
        path: &AttributePath,
        value: impl Into<Value>,
    ) -> Result<(), DocumentError> {
        let Some((last, parents)) = path.steps().split_last() else {
            return Err(DocumentError::InvalidPath(path.to_string()));
        };
        let mut current = &mut self.0;
        let mut walked = Vec::with_capacity(parents.len());
        for step in parents {
            walked.push(step.as_str());
            let slot = current
                .entry(step.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if slot.is_null() {
                *slot = Value::Object(Map::new());
            }
            current = match slot {
                Value::Object(map) => map,
                other => {
                    return Err(DocumentError::NotAnObject {
                        path: walked.join("."),
                        found: kind_of(other).to_owned(),
                    })
                }
            };
        }
        current.insert(last.clone(), value.into());
        Ok(())
    }
}
