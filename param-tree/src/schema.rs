//! Declarative tree literals.
//!
//! A [`Schema`] describes the shape a tree is built from, and the shape of
//! data passed to `set` and `replace`. JSON values convert directly: objects
//! become dict branches, arrays become list branches and scalars become raw
//! leaves. Accessor leaves and embedded trees are added with the helpers.
//!
//! ```ignore
//! let schema = Schema::dict([
//!     ("name", Schema::value("Detector")),
//!     ("exposure", Schema::leaf(Leaf::constant(0.1).with_metadata(Metadata::new().min(0.0)))),
//!     ("temperature", Schema::leaf(Leaf::getter(read_temperature))),
//!     ("rois", json!([{"x": 0, "y": 0}]).into()),
//! ]);
//! ```

use indexmap::IndexMap;
use serde_json::Value;

use crate::accessor::{Accessor, Leaf};
use crate::tree::Tree;

/// One node of a tree literal.
pub enum Schema<A: Accessor> {
    Dict(IndexMap<String, Schema<A>>),
    List(Vec<Schema<A>>),
    /// Accessor leaf
    Leaf(Leaf<A::GetFn, A::SetFn>),
    /// Raw leaf, stored unwrapped and type-checked on overwrite
    Value(Value),
    /// Already-built tree, moved into place
    Tree(Tree<A>),
}

impl<A: Accessor> Schema<A> {
    pub fn dict<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Schema<A>)>,
    {
        Self::Dict(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Schema<A>>,
    {
        Self::List(items.into_iter().collect())
    }

    /// A raw leaf. Unlike `From<Value>`, objects and arrays stay opaque.
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    /// A read/write constant accessor leaf.
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::Leaf(Leaf::constant(value))
    }

    pub fn leaf(leaf: Leaf<A::GetFn, A::SetFn>) -> Self {
        Self::Leaf(leaf)
    }

    pub fn tree(tree: Tree<A>) -> Self {
        Self::Tree(tree)
    }
}

impl<A: Accessor> From<Value> for Schema<A> {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Dict(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
            Value::Array(items) => Self::List(items.into_iter().map(Into::into).collect()),
            scalar => Self::Value(scalar),
        }
    }
}

impl<A: Accessor> From<Leaf<A::GetFn, A::SetFn>> for Schema<A> {
    fn from(leaf: Leaf<A::GetFn, A::SetFn>) -> Self {
        Self::Leaf(leaf)
    }
}

impl<A: Accessor> From<Tree<A>> for Schema<A> {
    fn from(tree: Tree<A>) -> Self {
        Self::Tree(tree)
    }
}
