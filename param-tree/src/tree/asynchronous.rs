use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, trace};

use super::{AsyncParameterTreeBuilder, Node, Observed, Tree};
use crate::accessor::{Accessor, AsyncParameterAccessor, BoxFuture};
use crate::error::{Mutation, Result, TreeError};
use crate::path::slash_terminated;
use crate::schema::Schema;

/// Await one initial read per accessor under `node`, concurrently, and fix
/// each accessor's type from it.
pub(crate) async fn resolve_accessors(node: &mut Node<AsyncParameterAccessor>) -> Result<()> {
    let mut accessors = Vec::new();
    node.accessors_mut(&mut accessors);
    if accessors.is_empty() {
        return Ok(());
    }

    let mut reads = JoinSet::new();
    for (slot, accessor) in accessors.iter().enumerate() {
        let read = accessor.read(false);
        reads.spawn(async move { (slot, read.await) });
    }
    trace!("[PTREE] resolving {} accessors", accessors.len());

    while let Some(joined) = reads.join_next().await {
        let (slot, value) = joined?;
        accessors[slot].record(value);
    }
    Ok(())
}

impl Tree<AsyncParameterAccessor> {
    /// Build an immutable tree and resolve every accessor's type.
    pub async fn new(schema: impl Into<Schema<AsyncParameterAccessor>>) -> Result<Self> {
        Self::builder(schema).build().await
    }

    pub fn builder(
        schema: impl Into<Schema<AsyncParameterAccessor>>,
    ) -> AsyncParameterTreeBuilder {
        AsyncParameterTreeBuilder::new(schema)
    }

    /// Resolve the types of accessors not yet read. Trees from
    /// [`new`](Self::new) or the builder are already resolved.
    pub async fn resolve(&mut self) -> Result<()> {
        resolve_accessors(self.root_mut()).await
    }

    /// Values at and below `path`. Accessor reads run concurrently and are
    /// placed back at their position in the result.
    pub async fn get(&self, path: &str, with_metadata: bool) -> Result<Value> {
        debug!("[PTREE] get {} (metadata={})", path, with_metadata);
        let fetch = self.fetch(path, with_metadata)?;

        let mut reads = JoinSet::new();
        let mut count = 0;
        let fetch = fetch.map_leaves(&mut |read: BoxFuture<Value>| {
            let slot = count;
            count += 1;
            reads.spawn(async move { (slot, read.await) });
            slot
        });

        let mut values = vec![Value::Null; count];
        while let Some(joined) = reads.join_next().await {
            let (slot, value) = joined?;
            values[slot] = value;
        }

        fetch
            .map_leaves(&mut |slot: usize| std::mem::take(&mut values[slot]))
            .finish(path)
    }

    /// Merge `data` into the tree at `path`.
    ///
    /// Setters returning futures are spawned as the merge walk reaches them
    /// and all of them are awaited before returning, even when the walk
    /// itself fails. The walk's error takes precedence, then the first setter
    /// error. Callbacks for a spawned write fire only once its setter succeeds.
    pub async fn set(
        &mut self,
        path: &str,
        data: impl Into<Schema<AsyncParameterAccessor>>,
    ) -> Result<()> {
        debug!("[PTREE] set {}", path);
        let mut built = Self::build(data.into(), &slash_terminated(path))?;
        resolve_accessors(&mut built.node).await?;

        let mut writes = JoinSet::new();
        let merged = self.merge_at(
            path,
            built.node,
            &mut |pending: Option<BoxFuture<Result<()>>>, observed: Option<Observed>| {
                match pending {
                    Some(pending) => {
                        writes.spawn(async move { pending.await.map(|()| observed) });
                        None
                    }
                    None => observed,
                }
            },
        );
        trace!("[PTREE] awaiting {} setter tasks for {}", writes.len(), path);

        let mut first_error = merged.err();
        while let Some(joined) = writes.join_next().await {
            match joined.map_err(TreeError::from).and_then(|written| written) {
                Ok(Some((leaf, value))) => self.callbacks.notify(&leaf, &value),
                Ok(None) => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Substitute `data` for the node at `path`, resolving any new accessors
    /// first. Requires a mutable tree or path; no getter runs otherwise.
    pub async fn replace(
        &mut self,
        path: &str,
        data: impl Into<Schema<AsyncParameterAccessor>>,
    ) -> Result<()> {
        debug!("[PTREE] replace {}", path);
        self.ensure_mutable(path, Mutation::Replace)?;
        let mut built = Self::build(data.into(), &slash_terminated(path))?;
        resolve_accessors(&mut built.node).await?;
        self.replace_at(path, built)
    }

    /// Apply `(path, value)` pairs in order, stopping at the first failure.
    pub async fn apply_overrides<I, P>(&mut self, overrides: I) -> Result<()>
    where
        I: IntoIterator<Item = (P, Value)>,
        P: AsRef<str>,
    {
        for (path, value) in overrides {
            self.set(path.as_ref(), value).await?;
        }
        Ok(())
    }
}
