//! Suspending parameter accessor.
//!
//! Getters and setters may be plain blocking closures or closures returning
//! futures. Reads always hand back a `'static` future so that a tree can fan
//! many of them out onto a `JoinSet` and gather the results.

use std::fmt;
use std::future::{Future, ready};

use serde_json::Value;
use tracing::trace;

use super::{Accessor, BoxFuture, Leaf, LeafSpec, leaf_path, metadata_map, validate_write};
use crate::error::{Result, TreeError};
use crate::metadata::Metadata;
use crate::value::ParameterType;

/// Getter of an asynchronous accessor.
pub enum AsyncGetFn {
    Blocking(Box<dyn Fn() -> Value + Send + Sync>),
    Suspending(Box<dyn Fn() -> BoxFuture<Value> + Send + Sync>),
}

/// Setter of an asynchronous accessor.
pub enum AsyncSetFn {
    Blocking(Box<dyn Fn(Value) -> Result<()> + Send + Sync>),
    Suspending(Box<dyn Fn(Value) -> BoxFuture<Result<()>> + Send + Sync>),
}

enum Source {
    Value(Value),
    Getter(AsyncGetFn),
}

/// Accessor whose getter and setter may suspend.
///
/// Construction is split in two: [`build`](Self::build) stores the getter and
/// setter, and [`resolve`](Self::resolve) awaits the first read to fix the
/// parameter type. Until then the `type` metadata is absent and any type is
/// accepted by `set`. [`new`](Self::new) does both. The resolving read is kept
/// so that an accessor used as write data yields it without another call.
pub struct AsyncParameterAccessor {
    path: String,
    source: Source,
    setter: Option<AsyncSetFn>,
    metadata: Metadata,
    type_: Option<ParameterType>,
    resolved: Option<Value>,
    writeable: bool,
}

impl AsyncParameterAccessor {
    /// Create an accessor with an unresolved type.
    pub fn build(path: &str, leaf: Leaf<AsyncGetFn, AsyncSetFn>) -> Self {
        let writeable = leaf.is_writeable();
        let (source, setter) = match leaf.spec {
            LeafSpec::Constant(value) => (Source::Value(value), None),
            LeafSpec::Getter(getter) => (Source::Getter(getter), None),
            LeafSpec::GetterSetter(getter, setter) => (Source::Getter(getter), Some(setter)),
        };

        Self {
            path: leaf_path(path),
            source,
            setter,
            metadata: leaf.metadata,
            type_: None,
            resolved: None,
            writeable,
        }
    }

    /// Create an accessor and await its first read.
    pub async fn new(path: &str, leaf: Leaf<AsyncGetFn, AsyncSetFn>) -> Self {
        let mut accessor = Self::build(path, leaf);
        accessor.resolve().await;
        accessor
    }

    /// Await one read and record its type.
    pub async fn resolve(&mut self) {
        let value = self.value().await;
        self.record(value);
    }

    pub(crate) fn record(&mut self, value: Value) {
        self.type_ = Some(ParameterType::of(&value));
        if let Source::Getter(_) = self.source {
            self.resolved = Some(value);
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.type_.is_some()
    }

    fn value(&self) -> BoxFuture<Value> {
        match &self.source {
            Source::Value(value) => Box::pin(ready(value.clone())),
            Source::Getter(AsyncGetFn::Blocking(getter)) => Box::pin(ready(getter())),
            Source::Getter(AsyncGetFn::Suspending(getter)) => getter(),
        }
    }

    /// Future resolving to the value, or value plus metadata fields.
    ///
    /// The getter is invoked when this is called; the returned future only
    /// completes it.
    pub fn get(&self, with_metadata: bool) -> BoxFuture<Value> {
        let value = self.value();
        if !with_metadata {
            return value;
        }

        let mut map = metadata_map(Value::Null, &self.metadata, self.type_, self.writeable);
        Box::pin(async move {
            map.insert("value".into(), value.await);
            Value::Object(map)
        })
    }

    /// Validate and commit `value`, returning the setter's outstanding future
    /// if it has one.
    pub fn start_set(&mut self, value: Value) -> Result<Option<BoxFuture<Result<()>>>> {
        validate_write(
            &self.path,
            self.writeable,
            self.type_,
            &self.metadata,
            &value,
        )?;

        trace!("[ACCESS] set {} = {}", self.path, value);
        match &self.setter {
            Some(AsyncSetFn::Blocking(setter)) => setter(value).map(|_| None),
            Some(AsyncSetFn::Suspending(setter)) => Ok(Some(setter(value))),
            None => {
                if let Source::Value(stored) = &mut self.source {
                    *stored = value;
                }
                Ok(None)
            }
        }
    }

    /// Validate and commit `value`, awaiting the setter.
    pub async fn set(&mut self, value: Value) -> Result<()> {
        match self.start_set(value)? {
            Some(pending) => pending.await,
            None => Ok(()),
        }
    }
}

impl fmt::Debug for AsyncParameterAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncParameterAccessor")
            .field("path", &self.path)
            .field("type", &self.type_)
            .field("writeable", &self.writeable)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl Accessor for AsyncParameterAccessor {
    type GetFn = AsyncGetFn;
    type SetFn = AsyncSetFn;
    type Read = BoxFuture<Value>;
    type Write = Option<BoxFuture<Result<()>>>;

    fn from_leaf(path: &str, leaf: Leaf<AsyncGetFn, AsyncSetFn>) -> Result<Self> {
        Ok(Self::build(path, leaf))
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn parameter_type(&self) -> Option<ParameterType> {
        self.type_
    }

    fn is_writeable(&self) -> bool {
        self.writeable
    }

    fn read(&self, with_metadata: bool) -> BoxFuture<Value> {
        self.get(with_metadata)
    }

    fn write(&mut self, value: Value) -> Result<Self::Write> {
        self.start_set(value)
    }

    fn transient_value(&self) -> Result<Value> {
        match (&self.source, &self.resolved) {
            (Source::Value(value), _) => Ok(value.clone()),
            (Source::Getter(_), Some(value)) => Ok(value.clone()),
            (Source::Getter(AsyncGetFn::Blocking(getter)), None) => Ok(getter()),
            (Source::Getter(AsyncGetFn::Suspending(_)), None) => {
                Err(TreeError::InvalidSchema(format!(
                    "Unresolved asynchronous getter at {} cannot be used as write data",
                    self.path
                )))
            }
        }
    }
}

impl Leaf<AsyncGetFn, AsyncSetFn> {
    /// A read-only leaf backed by an async getter.
    pub fn async_getter<F, Fut>(getter: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Value> + Send + 'static,
    {
        Self {
            spec: LeafSpec::Getter(AsyncGetFn::suspending(getter)),
            metadata: Metadata::default(),
        }
    }

    /// A read/write leaf backed by an async getter and an async setter.
    pub fn async_accessor<F, Fut, S, SFut>(getter: F, setter: S) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Value> + Send + 'static,
        S: Fn(Value) -> SFut + Send + Sync + 'static,
        SFut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            spec: LeafSpec::GetterSetter(
                AsyncGetFn::suspending(getter),
                AsyncSetFn::suspending(setter),
            ),
            metadata: Metadata::default(),
        }
    }

    /// A read-only leaf backed by a blocking getter.
    pub fn blocking_getter<F>(getter: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self {
            spec: LeafSpec::Getter(AsyncGetFn::Blocking(Box::new(getter))),
            metadata: Metadata::default(),
        }
    }

    /// A read/write leaf backed by blocking closures, for mixing into async trees.
    pub fn blocking_accessor<F, S>(getter: F, setter: S) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
        S: Fn(Value) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            spec: LeafSpec::GetterSetter(
                AsyncGetFn::Blocking(Box::new(getter)),
                AsyncSetFn::Blocking(Box::new(setter)),
            ),
            metadata: Metadata::default(),
        }
    }
}

impl AsyncGetFn {
    pub fn suspending<F, Fut>(getter: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Value> + Send + 'static,
    {
        Self::Suspending(Box::new(move || -> BoxFuture<Value> { Box::pin(getter()) }))
    }
}

impl AsyncSetFn {
    pub fn suspending<S, SFut>(setter: S) -> Self
    where
        S: Fn(Value) -> SFut + Send + Sync + 'static,
        SFut: Future<Output = Result<()>> + Send + 'static,
    {
        Self::Suspending(Box::new(move |value| -> BoxFuture<Result<()>> {
            Box::pin(setter(value))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn shared_rw(initial: Value) -> (Arc<Mutex<Value>>, Leaf<AsyncGetFn, AsyncSetFn>) {
        let store = Arc::new(Mutex::new(initial));
        let (get_store, set_store) = (store.clone(), store.clone());
        let leaf = Leaf::async_accessor(
            move || {
                let store = get_store.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    store.lock().clone()
                }
            },
            move |value| {
                let store = set_store.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    *store.lock() = value;
                    Ok(())
                }
            },
        );
        (store, leaf)
    }

    #[tokio::test]
    async fn test_type_resolved_on_await() {
        let (_store, leaf) = shared_rw(json!(42));
        let mut acc = AsyncParameterAccessor::build("async_rw/", leaf);
        assert!(!acc.is_resolved());
        assert!(acc.get(true).await.get("type").is_none());

        acc.resolve().await;
        assert_eq!(acc.parameter_type(), Some(ParameterType::Int));
        assert_eq!(acc.get(true).await["type"], json!("int"));
    }

    #[tokio::test]
    async fn test_async_get_and_set() {
        let (store, leaf) = shared_rw(json!(42));
        let mut acc = AsyncParameterAccessor::new("async_rw/", leaf).await;

        assert_eq!(acc.get(false).await, json!(42));
        acc.set(json!(7)).await.unwrap();
        assert_eq!(*store.lock(), json!(7));
        assert_eq!(acc.get(false).await, json!(7));

        let err = acc.set(json!("seven")).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Type mismatch setting async_rw: got str expected int"
        );
    }

    #[tokio::test]
    async fn test_async_ro() {
        let mut acc =
            AsyncParameterAccessor::new("async_ro/", Leaf::async_getter(|| async { json!(1.5) }))
                .await;
        let md = acc.get(true).await;
        assert_eq!(md, json!({"value": 1.5, "writeable": false, "type": "float"}));

        let err = acc.set(json!(2.5)).await.unwrap_err();
        assert_eq!(err.to_string(), "Parameter async_ro is read-only");
    }

    #[tokio::test]
    async fn test_constant_and_blocking_leaves() {
        let mut acc = AsyncParameterAccessor::new(
            "limit/",
            Leaf::constant(5).with_metadata(Metadata::new().min(0).max(10)),
        )
        .await;
        acc.set(json!(10)).await.unwrap();
        assert_eq!(acc.get(false).await, json!(10));
        assert!(acc.set(json!(11)).await.is_err());

        let acc = AsyncParameterAccessor::new("blk/", Leaf::blocking_getter(|| json!("x"))).await;
        assert_eq!(acc.transient_value().unwrap(), json!("x"));
    }

    #[tokio::test]
    async fn test_transient_value_needs_resolution() {
        let mut acc =
            AsyncParameterAccessor::build("a/", Leaf::async_getter(|| async { json!(3) }));
        assert!(matches!(
            acc.transient_value(),
            Err(TreeError::InvalidSchema(_))
        ));

        acc.resolve().await;
        assert_eq!(acc.transient_value().unwrap(), json!(3));
    }

    #[tokio::test]
    async fn test_transient_value_reuses_resolved_read() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let acc = AsyncParameterAccessor::new(
            "b/",
            Leaf::blocking_getter(move || json!(counter.fetch_add(1, Ordering::SeqCst))),
        )
        .await;

        assert_eq!(acc.transient_value().unwrap(), json!(0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
