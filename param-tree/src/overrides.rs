//! YAML override documents.
//!
//! An override document maps tree paths to the data to `set` there:
//!
//! ```yaml
//! detector/exposure: 0.5
//! detector/roi:
//!   x: 10
//!   y: 20
//! pipeline/stages/2/enabled: false
//! ```
//!
//! Entries are applied in document order.

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::{Result, TreeError};

/// Load overrides from a YAML file.
pub fn load_overrides_file(path: impl AsRef<Path>) -> Result<Vec<(String, Value)>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        TreeError::Overrides(format!("Failed to read override file {:?}: {}", path, e))
    })?;
    load_overrides_str(&content)
}

/// Parse a YAML override document.
pub fn load_overrides_str(yaml: &str) -> Result<Vec<(String, Value)>> {
    let doc: serde_yaml::Value = serde_yaml::from_str(yaml)
        .map_err(|e| TreeError::Overrides(format!("Failed to parse YAML: {}", e)))?;

    if doc.is_null() {
        return Ok(Vec::new());
    }
    let mapping = doc
        .as_mapping()
        .ok_or_else(|| TreeError::Overrides("YAML root must be a mapping".to_string()))?;

    let mut overrides = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let path = key
            .as_str()
            .ok_or_else(|| TreeError::Overrides("YAML keys must be strings".to_string()))?;
        let value = serde_json::to_value(value).map_err(|e| {
            TreeError::Overrides(format!("Unsupported value for {}: {}", path, e))
        })?;
        overrides.push((path.to_string(), value));
    }

    debug!("[PTREE] Loaded {} overrides", overrides.len());
    Ok(overrides)
}
