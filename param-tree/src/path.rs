//! Path grammar shared by every tree operation.
//!
//! Paths are `/`-separated segments. A trailing `/` (or an empty path)
//! addresses the current level. Integer-looking segments index lists.

use crate::error::{Result, TreeError};

/// Branch keys that describe a branch rather than address a child.
pub const METADATA_TAGS: [&str; 2] = ["name", "description"];

pub fn is_metadata_tag(key: &str) -> bool {
    METADATA_TAGS.contains(&key)
}

/// Split a path into its segments, dropping one trailing empty segment.
pub fn split_path(path: &str) -> Vec<&str> {
    let mut levels: Vec<&str> = path.split('/').collect();
    if levels.last() == Some(&"") {
        levels.pop();
    }
    levels
}

/// Parse a list index segment, reporting the whole path on failure.
pub fn parse_index(level: &str, path: &str) -> Result<usize> {
    level
        .parse::<usize>()
        .map_err(|_| TreeError::invalid_path(path))
}

/// Append a child segment to a slash-terminated path.
pub fn child_path(cur_path: &str, key: &str) -> String {
    format!("{}{}/", cur_path, key)
}

/// Normalise a path so that it ends with a single `/` unless it is empty.
pub fn slash_terminated(path: &str) -> String {
    if path.is_empty() || path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

/// Path prefixes under which structural changes are permitted even though
/// the owning tree is not mutable. Prefixes are slash-terminated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutablePaths {
    prefixes: Vec<String>,
}

impl MutablePaths {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, prefix: impl Into<String>) {
        let prefix = prefix.into();
        if !self.prefixes.contains(&prefix) {
            self.prefixes.push(prefix);
        }
    }

    /// Absorb another tree's prefixes, re-rooted under `base`.
    pub fn extend_under(&mut self, base: &str, other: &MutablePaths) {
        for prefix in &other.prefixes {
            self.push(format!("{}{}", base, prefix));
        }
    }

    /// Whether `path` (slash-terminated) lies under a recorded prefix.
    pub fn covers(&self, path: &str) -> bool {
        self.prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.prefixes.iter().map(String::as_str)
    }
}
