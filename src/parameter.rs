use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Parameter {
    pub field: String,
}

impl Parameter {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

/// What kind of measurement a value records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueKind {
    /// A quantity with a unit, e.g. `850` `°C`.
    Cardinal { value: String, unit: String },
    Other { value: String },
}

/// A recorded parameter value of a procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Value {
    pub parameter: Parameter,
    #[serde(flatten)]
    pub kind: ValueKind,
}

impl Value {
    pub fn cardinal(
        parameter: Parameter,
        value: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            parameter,
            kind: ValueKind::Cardinal {
                value: value.into(),
                unit: unit.into(),
            },
        }
    }

    pub fn other(parameter: Parameter, value: impl Into<String>) -> Self {
        Self {
            parameter,
            kind: ValueKind::Other {
                value: value.into(),
            },
        }
    }

    pub fn raw(&self) -> &str {
        match &self.kind {
            ValueKind::Cardinal { value, .. } | ValueKind::Other { value } => value,
        }
    }

    pub fn unit(&self) -> Option<&str> {
        match &self.kind {
            ValueKind::Cardinal { unit, .. } => Some(unit),
            ValueKind::Other { .. } => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ValueKind::Cardinal { value, unit } => write!(f, "{value} {unit}"),
            ValueKind::Other { value } => write!(f, "{value}"),
        }
    }
}
