//! Leaf accessors.
//!
//! An accessor wraps one leaf of a parameter tree: a getter (a constant or a
//! callable), an optional setter and a [`Metadata`] record. Two flavours
//! implement the [`Accessor`] trait:
//!
//! - [`ParameterAccessor`] resolves every call immediately
//! - [`AsyncParameterAccessor`] hands back futures that must be awaited
//!
//! The tree engine is generic over this trait and never inspects which
//! flavour it is driving.

pub mod asynchronous;
pub mod sync;

use std::future::Future;
use std::pin::Pin;

use serde_json::{Map, Value};

use crate::error::{Result, TreeError};
use crate::metadata::Metadata;
use crate::value::ParameterType;

pub use asynchronous::{AsyncGetFn, AsyncParameterAccessor, AsyncSetFn};
pub use sync::{GetFn, ParameterAccessor, SetFn};

/// Boxed, sendable future used by asynchronous accessors.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Shape of a leaf in a schema literal.
pub enum LeafSpec<G, S> {
    /// Read/write-by-value leaf holding a constant
    Constant(Value),
    /// Read-only leaf backed by a getter
    Getter(G),
    /// Read/write leaf backed by a getter and a setter
    GetterSetter(G, S),
}

/// A leaf specification together with its caller-supplied metadata.
pub struct Leaf<G, S> {
    pub spec: LeafSpec<G, S>,
    pub metadata: Metadata,
}

impl<G, S> Leaf<G, S> {
    /// A read/write constant leaf.
    pub fn constant(value: impl Into<Value>) -> Self {
        Self {
            spec: LeafSpec::Constant(value.into()),
            metadata: Metadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Attach metadata given as a JSON object, validating its keys.
    pub fn with_json_metadata(mut self, metadata: &Value) -> Result<Self> {
        self.metadata = Metadata::from_json(metadata)?;
        Ok(self)
    }

    /// A constant leaf is writeable by replacement, a getter with a setter is
    /// writeable through the setter and a bare getter is read-only.
    pub(crate) fn is_writeable(&self) -> bool {
        !matches!(self.spec, LeafSpec::Getter(_))
    }
}

/// Common behaviour of blocking and suspending accessors.
pub trait Accessor: Sized + Send + Sync + 'static {
    /// Callable getter type stored by this flavour
    type GetFn: Send + Sync;
    /// Callable setter type stored by this flavour
    type SetFn: Send + Sync;
    /// Result of a read: the value itself or a future resolving to it
    type Read;
    /// Outstanding side effect of a write, if any
    type Write;

    /// Create an accessor for the leaf at `path` (slash-terminated build path).
    fn from_leaf(path: &str, leaf: Leaf<Self::GetFn, Self::SetFn>) -> Result<Self>;

    fn path(&self) -> &str;

    fn metadata(&self) -> &Metadata;

    /// The established type, or `None` before the first read has been resolved.
    fn parameter_type(&self) -> Option<ParameterType>;

    fn is_writeable(&self) -> bool;

    /// Read the value, wrapped with metadata fields when requested.
    fn read(&self, with_metadata: bool) -> Self::Read;

    /// Validate and apply a new value.
    fn write(&mut self, value: Value) -> Result<Self::Write>;

    /// Value of an accessor built from incoming write data.
    fn transient_value(&self) -> Result<Value>;
}

/// Strip the trailing separator from a build path.
pub(crate) fn leaf_path(path: &str) -> String {
    path.strip_suffix('/').unwrap_or(path).to_string()
}

/// Checks applied before any setter runs: writeability, type, then
/// allowed values and bounds.
pub(crate) fn validate_write(
    path: &str,
    writeable: bool,
    type_: Option<ParameterType>,
    metadata: &Metadata,
    value: &Value,
) -> Result<()> {
    if !writeable {
        return Err(TreeError::ReadOnly(path.to_string()));
    }

    if let Some(expected) = type_
        && !expected.accepts(value)
    {
        return Err(TreeError::TypeMismatch {
            path: path.to_string(),
            got: ParameterType::of(value).to_string(),
            expected: expected.to_string(),
        });
    }

    metadata.check(path, value)
}

/// Metadata map returned by a `with_metadata` read. `value` comes first and is
/// filled in by the caller.
pub(crate) fn metadata_map(
    value: Value,
    metadata: &Metadata,
    type_: Option<ParameterType>,
    writeable: bool,
) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert("value".into(), value);
    metadata.write_into(&mut out);
    out.insert("writeable".into(), Value::Bool(writeable));
    if let Some(type_) = type_ {
        out.insert("type".into(), Value::String(type_.to_string()));
    }
    out
}
