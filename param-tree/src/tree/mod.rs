//! Parameter trees.
//!
//! A [`Tree`] is built once from a [`Schema`] and then read and mutated
//! through `get`, `set`, `replace` and `delete`. The structural algorithms
//! live here and are shared by both flavours; [`ParameterTree`] runs them
//! with blocking accessors and [`AsyncParameterTree`] overlays concurrent
//! resolution of suspending ones.

mod asynchronous;
mod builder;
mod sync;

use std::fmt;

use indexmap::IndexMap;
use indexmap::map::Entry;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::accessor::{Accessor, AsyncParameterAccessor, ParameterAccessor};
use crate::callback::Callbacks;
use crate::error::{Mutation, Result, TreeError};
use crate::path::{
    MutablePaths, child_path, is_metadata_tag, parse_index, slash_terminated, split_path,
};
use crate::schema::Schema;
use crate::value::ParameterType;

pub use builder::{AsyncParameterTreeBuilder, ParameterTreeBuilder, TreeBuilder, TreeOptions};

/// Tree of blocking accessors.
pub type ParameterTree = Tree<ParameterAccessor>;

/// Tree of suspending accessors. Construction and every operation but
/// `delete` must be awaited.
pub type AsyncParameterTree = Tree<AsyncParameterAccessor>;

#[derive(Debug)]
pub(crate) enum Node<A> {
    Dict(IndexMap<String, Node<A>>),
    List(Vec<Node<A>>),
    Accessor(A),
    Value(Value),
}

impl<A: Accessor> Node<A> {
    fn type_name(&self) -> &'static str {
        match self {
            Node::Dict(_) => "dict",
            Node::List(_) => "list",
            Node::Accessor(_) => "parameter",
            Node::Value(value) => ParameterType::of(value).into(),
        }
    }

    /// Reduce write data to a plain value.
    fn to_value(&self) -> Result<Value> {
        Ok(match self {
            Node::Dict(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), v.to_value()?)))
                    .collect::<Result<Map<_, _>>>()?,
            ),
            Node::List(items) => {
                Value::Array(items.iter().map(Node::to_value).collect::<Result<_>>()?)
            }
            Node::Accessor(accessor) => accessor.transient_value()?,
            Node::Value(value) => value.clone(),
        })
    }

    fn populate(&self, with_metadata: bool) -> Populated<A::Read> {
        match self {
            Node::Dict(map) => Populated::Dict(
                map.iter()
                    .filter(|(k, _)| with_metadata || !is_metadata_tag(k))
                    .map(|(k, v)| (k.clone(), v.populate(with_metadata)))
                    .collect(),
            ),
            Node::List(items) => {
                Populated::List(items.iter().map(|n| n.populate(with_metadata)).collect())
            }
            Node::Accessor(accessor) => Populated::Leaf(accessor.read(with_metadata)),
            Node::Value(value) => Populated::Value(value.clone()),
        }
    }

    pub(crate) fn accessors_mut<'a>(&'a mut self, out: &mut Vec<&'a mut A>) {
        match self {
            Node::Dict(map) => map.values_mut().for_each(|n| n.accessors_mut(out)),
            Node::List(items) => items.iter_mut().for_each(|n| n.accessors_mut(out)),
            Node::Accessor(accessor) => out.push(accessor),
            Node::Value(_) => {}
        }
    }
}

/// A populated subtree whose accessor reads may still be pending.
pub(crate) enum Populated<R> {
    Dict(Vec<(String, Populated<R>)>),
    List(Vec<Populated<R>>),
    Leaf(R),
    Value(Value),
}

impl<R> Populated<R> {
    pub(crate) fn map_leaves<S>(self, f: &mut impl FnMut(R) -> S) -> Populated<S> {
        match self {
            Populated::Dict(entries) => Populated::Dict(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, v.map_leaves(f)))
                    .collect(),
            ),
            Populated::List(items) => {
                Populated::List(items.into_iter().map(|n| n.map_leaves(f)).collect())
            }
            Populated::Leaf(read) => Populated::Leaf(f(read)),
            Populated::Value(value) => Populated::Value(value),
        }
    }
}

impl Populated<Value> {
    fn into_value(self) -> Value {
        match self {
            Populated::Dict(entries) => Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, v.into_value()))
                    .collect(),
            ),
            Populated::List(items) => {
                Value::Array(items.into_iter().map(Populated::into_value).collect())
            }
            Populated::Leaf(value) | Populated::Value(value) => value,
        }
    }
}

/// Result of the structural part of a `get`.
pub(crate) struct Fetch<R> {
    body: Populated<R>,
    /// Levels left to index into the resolved body, when descent stopped at a leaf
    descend: Vec<String>,
    /// Last path level, used as the key of the returned map
    key: Option<String>,
}

impl<R> Fetch<R> {
    pub(crate) fn map_leaves<S>(self, f: &mut impl FnMut(R) -> S) -> Fetch<S> {
        Fetch {
            body: self.body.map_leaves(f),
            descend: self.descend,
            key: self.key,
        }
    }
}

impl Fetch<Value> {
    pub(crate) fn finish(self, path: &str) -> Result<Value> {
        let mut value = self.body.into_value();
        for level in &self.descend {
            value = match value {
                Value::Object(mut map) => map.remove(level),
                Value::Array(mut items) => {
                    let index = parse_index(level, path)?;
                    (index < items.len()).then(|| items.swap_remove(index))
                }
                _ => None,
            }
            .ok_or_else(|| TreeError::invalid_path(path))?;
        }

        Ok(match self.key {
            Some(key) => {
                let mut map = Map::new();
                map.insert(key, value);
                Value::Object(map)
            }
            None => value,
        })
    }
}

/// A freshly built node with the mutable prefixes and observers of any
/// trees embedded in it.
pub(crate) struct Built<A> {
    pub node: Node<A>,
    pub mutable_paths: MutablePaths,
    pub callbacks: Callbacks,
}

fn build_node<A: Accessor>(
    schema: Schema<A>,
    path: &str,
    mutable_paths: &mut MutablePaths,
    callbacks: &mut Callbacks,
) -> Result<Node<A>> {
    Ok(match schema {
        Schema::Tree(inner) => {
            if inner.mutable {
                mutable_paths.push(path);
            }
            mutable_paths.extend_under(path, &inner.mutable_paths);
            callbacks.extend_under(path, inner.callbacks);
            inner.root
        }
        Schema::Dict(map) => Node::Dict(
            map.into_iter()
                .map(|(key, child)| {
                    let node = build_node(child, &child_path(path, &key), mutable_paths, callbacks)?;
                    Ok((key, node))
                })
                .collect::<Result<_>>()?,
        ),
        Schema::List(items) => Node::List(
            items
                .into_iter()
                .enumerate()
                .map(|(index, child)| {
                    build_node(
                        child,
                        &child_path(path, &index.to_string()),
                        mutable_paths,
                        callbacks,
                    )
                })
                .collect::<Result<_>>()?,
        ),
        Schema::Leaf(leaf) => Node::Accessor(A::from_leaf(path, leaf)?),
        Schema::Value(value) => Node::Value(value),
    })
}

fn locate_mut<'a, A>(
    root: &'a mut Node<A>,
    levels: &[&str],
    path: &str,
) -> Result<&'a mut Node<A>> {
    let mut node = root;
    for level in levels {
        node = match node {
            Node::Dict(map) => map.get_mut(*level),
            Node::List(items) => items.get_mut(parse_index(level, path)?),
            _ => None,
        }
        .ok_or_else(|| TreeError::invalid_path(path))?;
    }
    Ok(node)
}

fn reject_metadata_tags(levels: &[&str], path: &str) -> Result<()> {
    if levels.iter().any(|level| is_metadata_tag(level)) {
        return Err(TreeError::invalid_path(path));
    }
    Ok(())
}

/// Committed leaf path and value owed to matching callbacks.
pub(crate) type Observed = (String, Value);

/// Receives each leaf write's outstanding side effect, together with the
/// observation to report once it succeeds. Returns the observation when it
/// should be reported now.
pub(crate) type WriteSink<'s, A> =
    dyn FnMut(<A as Accessor>::Write, Option<Observed>) -> Option<Observed> + 's;

/// Recursive write walk.
struct Merge<'t, 's, A: Accessor> {
    mutable: bool,
    mutable_paths: &'t MutablePaths,
    callbacks: &'t Callbacks,
    sink: &'t mut WriteSink<'s, A>,
}

impl<A: Accessor> Merge<'_, '_, A> {
    fn is_mutable_at(&self, cur_path: &str) -> bool {
        self.mutable || self.mutable_paths.covers(cur_path)
    }

    fn merge(&mut self, node: &mut Node<A>, data: Node<A>, cur_path: &str) -> Result<()> {
        match (node, data) {
            (Node::Dict(existing), Node::Dict(incoming)) => {
                for (key, value) in incoming {
                    if is_metadata_tag(&key) {
                        continue;
                    }
                    let path = child_path(cur_path, &key);
                    let child = match existing.entry(key) {
                        Entry::Occupied(entry) => entry.into_mut(),
                        Entry::Vacant(entry) if self.is_mutable_at(cur_path) => {
                            entry.insert(Node::Dict(IndexMap::new()))
                        }
                        Entry::Vacant(entry) => {
                            return Err(TreeError::invalid_path(format!(
                                "{}{}",
                                cur_path,
                                entry.key()
                            )));
                        }
                    };
                    self.merge(child, value, &path)?;
                }
                Ok(())
            }
            (Node::List(existing), Node::List(incoming)) => {
                for (index, value) in incoming.into_iter().enumerate() {
                    let child = existing.get_mut(index).ok_or_else(|| {
                        TreeError::invalid_path(format!("{}{}", cur_path, index))
                    })?;
                    self.merge(child, value, &child_path(cur_path, &index.to_string()))?;
                }
                Ok(())
            }
            (Node::List(existing), Node::Dict(incoming)) => {
                for (key, value) in incoming {
                    let path = format!("{}{}", cur_path, key);
                    let index = parse_index(&key, &path)?;
                    let child = existing
                        .get_mut(index)
                        .ok_or_else(|| TreeError::invalid_path(&path))?;
                    self.merge(child, value, &slash_terminated(&path))?;
                }
                Ok(())
            }
            (Node::Accessor(accessor), data) => {
                let value = data.to_value()?;
                let observed = self
                    .callbacks
                    .matches(cur_path)
                    .then(|| (cur_path.to_string(), value.clone()));
                let pending = accessor.write(value)?;
                if let Some((path, value)) = (self.sink)(pending, observed) {
                    self.callbacks.notify(&path, &value);
                }
                Ok(())
            }
            (node, data) => {
                let (expected, got) = (node.type_name(), data.type_name());
                if expected != got && !self.is_mutable_at(cur_path) {
                    return Err(TreeError::NodeTypeMismatch {
                        path: cur_path.strip_suffix('/').unwrap_or(cur_path).to_string(),
                        got: got.to_string(),
                        expected: expected.to_string(),
                    });
                }
                let observed = if self.callbacks.matches(cur_path) {
                    Some(data.to_value()?)
                } else {
                    None
                };
                *node = data;
                if let Some(value) = observed {
                    self.callbacks.notify(cur_path, &value);
                }
                Ok(())
            }
        }
    }
}

/// A tree of parameters, generic over the accessor flavour.
pub struct Tree<A: Accessor> {
    root: Node<A>,
    mutable: bool,
    mutable_paths: MutablePaths,
    callbacks: Callbacks,
}

impl<A: Accessor> Tree<A> {
    /// Build a node and collect what its embedded trees carry.
    pub(crate) fn build(schema: Schema<A>, path: &str) -> Result<Built<A>> {
        let mut mutable_paths = MutablePaths::new();
        let mut callbacks = Callbacks::default();
        let node = build_node(schema, path, &mut mutable_paths, &mut callbacks)?;
        Ok(Built {
            node,
            mutable_paths,
            callbacks,
        })
    }

    pub(crate) fn from_built(built: Built<A>, mutable: bool) -> Self {
        debug!(
            "[PTREE] Built tree: mutable={}, {} mutable paths, {} callbacks",
            mutable,
            built.mutable_paths.iter().count(),
            built.callbacks.len()
        );
        Self {
            root: built.node,
            mutable,
            mutable_paths: built.mutable_paths,
            callbacks: built.callbacks,
        }
    }

    pub(crate) fn root_mut(&mut self) -> &mut Node<A> {
        &mut self.root
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    /// Prefixes of embedded mutable subtrees.
    pub fn mutable_paths(&self) -> &MutablePaths {
        &self.mutable_paths
    }

    /// Register an observer fired after every committed write under `prefix`.
    #[deprecated(note = "use accessor setters to react to writes")]
    pub fn add_callback<F>(&mut self, prefix: impl Into<String>, callback: F)
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        let prefix = prefix.into();
        warn!(
            "[PTREE] Callbacks in parameter trees are deprecated, use parameter accessors instead ({})",
            prefix
        );
        self.callbacks.push(prefix, Box::new(callback));
    }

    /// Structural half of `get`: descend `path` and populate what is there.
    pub(crate) fn fetch(&self, path: &str, with_metadata: bool) -> Result<Fetch<A::Read>> {
        let levels = split_path(path);
        if !with_metadata {
            reject_metadata_tags(&levels, path)?;
        }

        let mut node = &self.root;
        let mut stopped = levels.len();
        for (depth, level) in levels.iter().enumerate() {
            let next = match node {
                Node::Dict(map) => map.get(*level),
                Node::List(items) => items.get(parse_index(level, path)?),
                Node::Accessor(_) | Node::Value(_) => {
                    stopped = depth;
                    break;
                }
            };
            node = next.ok_or_else(|| TreeError::invalid_path(path))?;
        }

        Ok(Fetch {
            body: node.populate(with_metadata),
            descend: levels[stopped..].iter().map(|l| l.to_string()).collect(),
            key: levels.last().map(|l| l.to_string()),
        })
    }

    /// Structural half of `set`: merge built data into the node at `path`.
    pub(crate) fn merge_at(
        &mut self,
        path: &str,
        data: Node<A>,
        sink: &mut WriteSink<'_, A>,
    ) -> Result<()> {
        let levels = split_path(path);
        reject_metadata_tags(&levels, path)?;

        let target = locate_mut(&mut self.root, &levels, path)?;
        let mut merge = Merge {
            mutable: self.mutable,
            mutable_paths: &self.mutable_paths,
            callbacks: &self.callbacks,
            sink,
        };
        merge.merge(target, data, &slash_terminated(path))
    }

    /// Fail unless the tree, or an embedded mutable tree enclosing `path`, is mutable.
    pub(crate) fn ensure_mutable(&self, path: &str, operation: Mutation) -> Result<()> {
        if self.mutable || self.mutable_paths.covers(&slash_terminated(path)) {
            Ok(())
        } else {
            Err(TreeError::NotMutable { operation })
        }
    }

    /// Substitute a built node wholesale at `path`.
    pub(crate) fn replace_at(&mut self, path: &str, built: Built<A>) -> Result<()> {
        self.ensure_mutable(path, Mutation::Replace)?;
        let levels = split_path(path);
        reject_metadata_tags(&levels, path)?;

        let target = locate_mut(&mut self.root, &levels, path)?;
        *target = built.node;
        self.mutable_paths.extend_under("", &built.mutable_paths);
        self.callbacks.extend_under("", built.callbacks);
        Ok(())
    }

    /// Remove the node at `path`. Deleting the root empties the tree.
    ///
    /// Requires the tree, or an embedded mutable tree enclosing `path`, to be
    /// mutable.
    pub fn delete(&mut self, path: &str) -> Result<()> {
        debug!("[PTREE] delete {}", path);
        self.ensure_mutable(path, Mutation::Delete)?;

        let levels = split_path(path);
        reject_metadata_tags(&levels, path)?;
        let Some((last, parents)) = levels.split_last() else {
            match &mut self.root {
                Node::Dict(map) => map.clear(),
                Node::List(items) => items.clear(),
                root => *root = Node::Dict(IndexMap::new()),
            }
            return Ok(());
        };

        let removed = match locate_mut(&mut self.root, parents, path)? {
            Node::Dict(map) => map.shift_remove(*last).is_some(),
            Node::List(items) => {
                let index = parse_index(last, path)?;
                if index < items.len() {
                    items.remove(index);
                    true
                } else {
                    false
                }
            }
            _ => false,
        };

        if removed {
            Ok(())
        } else {
            Err(TreeError::invalid_path(path))
        }
    }
}

impl<A: Accessor> fmt::Debug for Tree<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("mutable", &self.mutable)
            .field("mutable_paths", &self.mutable_paths)
            .field("callbacks", &self.callbacks.len())
            .finish_non_exhaustive()
    }
}
