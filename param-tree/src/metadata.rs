//! Caller-supplied parameter metadata.
//!
//! A [`Metadata`] record describes a single leaf: optional bounds, a set of
//! allowed values and presentation hints. The automatically derived `type`
//! and `writeable` fields are owned by the accessor, not by this record.

use serde_json::{Map, Value};

use crate::error::{Result, TreeError};
use crate::value::{compare_numbers, values_equal};

/// Metadata keys a caller may supply for a leaf.
pub const VALID_METADATA_ARGS: [&str; 7] = [
    "min",
    "max",
    "allowed_values",
    "name",
    "description",
    "units",
    "display_precision",
];

/// Optional metadata fields for a parameter leaf.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub min: Option<Value>,
    pub max: Option<Value>,
    pub allowed_values: Option<Vec<Value>>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub units: Option<String>,
    pub display_precision: Option<u32>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse metadata from a JSON object, rejecting unknown keys.
    ///
    /// `null` is treated as an empty record.
    pub fn from_json(value: &Value) -> Result<Self> {
        let map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            other => {
                return Err(TreeError::InvalidSchema(format!(
                    "Metadata must be a mapping, got {}",
                    other
                )));
            }
        };

        let mut metadata = Self::default();
        for (key, val) in map {
            match key.as_str() {
                "min" => metadata.min = Some(expect_number(key, val)?),
                "max" => metadata.max = Some(expect_number(key, val)?),
                "allowed_values" => {
                    let values = val.as_array().ok_or_else(|| {
                        TreeError::InvalidSchema(format!("Metadata field {} must be a list", key))
                    })?;
                    metadata.allowed_values = Some(values.clone());
                }
                "name" => metadata.name = Some(expect_string(key, val)?),
                "description" => metadata.description = Some(expect_string(key, val)?),
                "units" => metadata.units = Some(expect_string(key, val)?),
                "display_precision" => {
                    let precision = val
                        .as_u64()
                        .and_then(|p| u32::try_from(p).ok())
                        .ok_or_else(|| {
                            TreeError::InvalidSchema(format!(
                                "Metadata field {} must be a non-negative integer",
                                key
                            ))
                        })?;
                    metadata.display_precision = Some(precision);
                }
                other => return Err(TreeError::InvalidMetadata(other.to_string())),
            }
        }
        Ok(metadata)
    }

    pub fn min(mut self, min: impl Into<Value>) -> Self {
        self.min = Some(min.into());
        self
    }

    pub fn max(mut self, max: impl Into<Value>) -> Self {
        self.max = Some(max.into());
        self
    }

    pub fn allowed_values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.allowed_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn display_precision(mut self, precision: u32) -> Self {
        self.display_precision = Some(precision);
        self
    }

    /// Check a candidate value against `allowed_values`, `min` and `max`, in that order.
    pub fn check(&self, path: &str, value: &Value) -> Result<()> {
        if let Some(allowed) = &self.allowed_values
            && !allowed.iter().any(|a| values_equal(a, value))
        {
            return Err(TreeError::NotAllowed {
                value: value.clone(),
                path: path.to_string(),
            });
        }

        if let Some(min) = &self.min {
            let ord = compare_numbers(value, min).ok_or_else(|| TreeError::Incomparable {
                value: value.clone(),
                path: path.to_string(),
            })?;
            if ord.is_lt() {
                return Err(TreeError::BelowMinimum {
                    value: value.clone(),
                    min: min.clone(),
                    path: path.to_string(),
                });
            }
        }

        if let Some(max) = &self.max {
            let ord = compare_numbers(value, max).ok_or_else(|| TreeError::Incomparable {
                value: value.clone(),
                path: path.to_string(),
            })?;
            if ord.is_gt() {
                return Err(TreeError::AboveMaximum {
                    value: value.clone(),
                    max: max.clone(),
                    path: path.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Write the present fields into `out`.
    pub fn write_into(&self, out: &mut Map<String, Value>) {
        if let Some(min) = &self.min {
            out.insert("min".into(), min.clone());
        }
        if let Some(max) = &self.max {
            out.insert("max".into(), max.clone());
        }
        if let Some(allowed) = &self.allowed_values {
            out.insert("allowed_values".into(), Value::Array(allowed.clone()));
        }
        if let Some(name) = &self.name {
            out.insert("name".into(), Value::String(name.clone()));
        }
        if let Some(description) = &self.description {
            out.insert("description".into(), Value::String(description.clone()));
        }
        if let Some(units) = &self.units {
            out.insert("units".into(), Value::String(units.clone()));
        }
        if let Some(precision) = self.display_precision {
            out.insert("display_precision".into(), Value::from(precision));
        }
    }

    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        self.write_into(&mut out);
        Value::Object(out)
    }
}

fn expect_number(key: &str, val: &Value) -> Result<Value> {
    if val.is_number() {
        Ok(val.clone())
    } else {
        Err(TreeError::InvalidSchema(format!(
            "Metadata field {} must be a number, got {}",
            key, val
        )))
    }
}

fn expect_string(key: &str, val: &Value) -> Result<String> {
    val.as_str().map(str::to_string).ok_or_else(|| {
        TreeError::InvalidSchema(format!("Metadata field {} must be a string, got {}", key, val))
    })
}
