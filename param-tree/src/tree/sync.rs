use serde_json::Value;
use tracing::debug;

use super::{ParameterTreeBuilder, Tree};
use crate::accessor::ParameterAccessor;
use crate::error::Result;
use crate::path::slash_terminated;
use crate::schema::Schema;
use crate::Builder;

impl Tree<ParameterAccessor> {
    /// Build an immutable tree.
    pub fn new(schema: impl Into<Schema<ParameterAccessor>>) -> Result<Self> {
        Self::builder(schema).build()
    }

    pub fn builder(schema: impl Into<Schema<ParameterAccessor>>) -> ParameterTreeBuilder {
        ParameterTreeBuilder::new(schema)
    }

    /// Values at and below `path`, keyed by the last path level.
    ///
    /// An empty path returns the whole tree unwrapped.
    pub fn get(&self, path: &str, with_metadata: bool) -> Result<Value> {
        debug!("[PTREE] get {} (metadata={})", path, with_metadata);
        self.fetch(path, with_metadata)?.finish(path)
    }

    /// Merge `data` into the tree at `path`, validating every leaf it touches.
    ///
    /// Not transactional: leaves written before a failure keep their new values.
    pub fn set(&mut self, path: &str, data: impl Into<Schema<ParameterAccessor>>) -> Result<()> {
        debug!("[PTREE] set {}", path);
        let built = Self::build(data.into(), &slash_terminated(path))?;
        self.merge_at(path, built.node, &mut |(), observed| observed)
    }

    /// Substitute `data` for the node at `path`. Requires a mutable tree or path.
    pub fn replace(
        &mut self,
        path: &str,
        data: impl Into<Schema<ParameterAccessor>>,
    ) -> Result<()> {
        debug!("[PTREE] replace {}", path);
        let built = Self::build(data.into(), &slash_terminated(path))?;
        self.replace_at(path, built)
    }

    /// Apply `(path, value)` pairs in order, stopping at the first failure.
    pub fn apply_overrides<I, P>(&mut self, overrides: I) -> Result<()>
    where
        I: IntoIterator<Item = (P, Value)>,
        P: AsRef<str>,
    {
        for (path, value) in overrides {
            self.set(path.as_ref(), value)?;
        }
        Ok(())
    }
}
