use serde::Deserialize;

use super::asynchronous::resolve_accessors;
use super::{AsyncParameterTree, ParameterTree, Tree};
use crate::accessor::{Accessor, AsyncParameterAccessor, ParameterAccessor};
use crate::error::Result;
use crate::schema::Schema;
use crate::Builder;

/// Tree construction options.
///
/// Deserializable so that an adapter can carry them in its own config:
///
/// ```yaml
/// tree:
///   mutable: true
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TreeOptions {
    /// Allow new keys, type-changing writes, `replace` and `delete` anywhere
    pub mutable: bool,
}

/// Builder for either tree flavour.
pub struct TreeBuilder<A: Accessor> {
    schema: Schema<A>,
    options: TreeOptions,
}

pub type ParameterTreeBuilder = TreeBuilder<ParameterAccessor>;
pub type AsyncParameterTreeBuilder = TreeBuilder<AsyncParameterAccessor>;

impl<A: Accessor> TreeBuilder<A> {
    pub fn new(schema: impl Into<Schema<A>>) -> Self {
        Self {
            schema: schema.into(),
            options: TreeOptions::default(),
        }
    }

    pub fn mutable(mut self, mutable: bool) -> Self {
        self.options.mutable = mutable;
        self
    }

    pub fn with_options(mut self, options: TreeOptions) -> Self {
        self.options = options;
        self
    }
}

impl Builder for ParameterTreeBuilder {
    type Output = ParameterTree;

    fn build(self) -> Result<ParameterTree> {
        let built = Tree::build(self.schema, "")?;
        Ok(Tree::from_built(built, self.options.mutable))
    }
}

impl AsyncParameterTreeBuilder {
    /// Build the tree and await every accessor's initial read.
    pub async fn build(self) -> Result<AsyncParameterTree> {
        let mut built = Tree::build(self.schema, "")?;
        resolve_accessors(&mut built.node).await?;
        Ok(Tree::from_built(built, self.options.mutable))
    }
}
