//! Typed, path-addressed parameter trees.
//!
//! A tree is built once from a [`Schema`] literal whose leaves are raw values
//! or [accessors](accessor) (a constant, or a getter with an optional setter,
//! plus metadata). It is then read with `get` and written with `set`,
//! `replace` and `delete` using `/`-separated paths such as `a/b/2/c`.
//!
//! ```ignore
//! use param_tree::{Leaf, Metadata, ParameterTree, Schema};
//! use serde_json::json;
//!
//! let mut tree = ParameterTree::new(Schema::dict([
//!     ("x", Schema::value(5)),
//!     ("n", Schema::leaf(Leaf::constant(10).with_metadata(Metadata::new().min(0).max(100)))),
//! ]))?;
//! tree.set("n", json!(50))?;
//! assert_eq!(tree.get("n", false)?, json!({"n": 50}));
//! ```
//!
//! [`AsyncParameterTree`] offers the same operations over accessors whose
//! getters and setters may suspend; its reads and writes are fanned out on a
//! tokio `JoinSet`.

pub mod accessor;
pub mod callback;
pub mod error;
pub mod metadata;
pub mod overrides;
pub mod path;
pub mod schema;
pub mod tree;
pub mod value;

pub use accessor::{
    Accessor, AsyncGetFn, AsyncParameterAccessor, AsyncSetFn, BoxFuture, Leaf, LeafSpec,
    ParameterAccessor,
};
pub use error::{Mutation, Result, TreeError};
pub use metadata::Metadata;
pub use overrides::{load_overrides_file, load_overrides_str};
pub use schema::Schema;
pub use tree::{
    AsyncParameterTree, AsyncParameterTreeBuilder, ParameterTree, ParameterTreeBuilder, Tree,
    TreeBuilder, TreeOptions,
};
pub use value::ParameterType;

pub trait Builder {
    type Output;
    fn build(self) -> Result<Self::Output>;
}
