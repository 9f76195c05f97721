//! Blocking parameter accessor.

use std::fmt;

use serde_json::Value;
use tracing::trace;

use super::{Accessor, Leaf, LeafSpec, leaf_path, metadata_map, validate_write};
use crate::error::Result;
use crate::metadata::Metadata;
use crate::value::ParameterType;

/// Blocking getter.
pub type GetFn = Box<dyn Fn() -> Value + Send + Sync>;

/// Blocking setter. Errors abort the enclosing tree operation.
pub type SetFn = Box<dyn Fn(Value) -> Result<()> + Send + Sync>;

enum Source {
    Value(Value),
    Getter(GetFn),
}

/// Accessor whose getter and setter return immediately.
///
/// The parameter type is fixed from the first read at construction time.
pub struct ParameterAccessor {
    path: String,
    source: Source,
    setter: Option<SetFn>,
    metadata: Metadata,
    type_: ParameterType,
    writeable: bool,
}

impl ParameterAccessor {
    /// Create an accessor, reading the getter once to fix the parameter type.
    pub fn new(path: &str, leaf: Leaf<GetFn, SetFn>) -> Result<Self> {
        let writeable = leaf.is_writeable();
        let (source, setter) = match leaf.spec {
            LeafSpec::Constant(value) => (Source::Value(value), None),
            LeafSpec::Getter(getter) => (Source::Getter(getter), None),
            LeafSpec::GetterSetter(getter, setter) => (Source::Getter(getter), Some(setter)),
        };

        let mut accessor = Self {
            path: leaf_path(path),
            source,
            setter,
            metadata: leaf.metadata,
            type_: ParameterType::None,
            writeable,
        };
        accessor.type_ = ParameterType::of(&accessor.value());
        Ok(accessor)
    }

    fn value(&self) -> Value {
        match &self.source {
            Source::Value(value) => value.clone(),
            Source::Getter(getter) => getter(),
        }
    }

    /// Current value, or value plus metadata fields.
    pub fn get(&self, with_metadata: bool) -> Value {
        let value = self.value();
        if with_metadata {
            Value::Object(metadata_map(
                value,
                &self.metadata,
                Some(self.type_),
                self.writeable,
            ))
        } else {
            value
        }
    }

    /// Validate `value` and commit it through the setter or by replacement.
    pub fn set(&mut self, value: Value) -> Result<()> {
        validate_write(
            &self.path,
            self.writeable,
            Some(self.type_),
            &self.metadata,
            &value,
        )?;

        trace!("[ACCESS] set {} = {}", self.path, value);
        if let Some(setter) = &self.setter {
            setter(value)
        } else {
            if let Source::Value(stored) = &mut self.source {
                *stored = value;
            }
            Ok(())
        }
    }
}

impl fmt::Debug for ParameterAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterAccessor")
            .field("path", &self.path)
            .field("type", &self.type_)
            .field("writeable", &self.writeable)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl Accessor for ParameterAccessor {
    type GetFn = GetFn;
    type SetFn = SetFn;
    type Read = Value;
    type Write = ();

    fn from_leaf(path: &str, leaf: Leaf<GetFn, SetFn>) -> Result<Self> {
        Self::new(path, leaf)
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn parameter_type(&self) -> Option<ParameterType> {
        Some(self.type_)
    }

    fn is_writeable(&self) -> bool {
        self.writeable
    }

    fn read(&self, with_metadata: bool) -> Value {
        self.get(with_metadata)
    }

    fn write(&mut self, value: Value) -> Result<()> {
        self.set(value)
    }

    fn transient_value(&self) -> Result<Value> {
        Ok(self.value())
    }
}

impl Leaf<GetFn, SetFn> {
    /// A read-only leaf backed by a blocking getter.
    pub fn getter<F>(getter: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self {
            spec: LeafSpec::Getter(Box::new(getter)),
            metadata: Metadata::default(),
        }
    }

    /// A read/write leaf backed by a blocking getter and setter.
    pub fn accessor<F, S>(getter: F, setter: S) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
        S: Fn(Value) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            spec: LeafSpec::GetterSetter(Box::new(getter), Box::new(setter)),
            metadata: Metadata::default(),
        }
    }
}
