#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use param_tree::{AsyncGetFn, AsyncSetFn, Leaf, Metadata, Schema, TreeError};
use param_tree::accessor::{GetFn, ParameterAccessor, SetFn};
use serde_json::{Value, json};

pub type Store = Arc<Mutex<Value>>;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Blocking read/write leaf backed by a shared store.
pub fn stored(initial: Value) -> (Store, Leaf<GetFn, SetFn>) {
    let store = Arc::new(Mutex::new(initial));
    let (get_store, set_store) = (store.clone(), store.clone());
    let leaf = Leaf::accessor(
        move || get_store.lock().clone(),
        move |value| {
            *set_store.lock() = value;
            Ok(())
        },
    );
    (store, leaf)
}

/// Async read/write leaf whose getter and setter each sleep for `delay`.
pub fn async_stored(initial: Value, delay: Duration) -> (Store, Leaf<AsyncGetFn, AsyncSetFn>) {
    let store = Arc::new(Mutex::new(initial));
    let (get_store, set_store) = (store.clone(), store.clone());
    let leaf = Leaf::async_accessor(
        move || {
            let store = get_store.clone();
            async move {
                tokio::time::sleep(delay).await;
                store.lock().clone()
            }
        },
        move |value| {
            let store = set_store.clone();
            async move {
                tokio::time::sleep(delay).await;
                *store.lock() = value;
                Ok::<_, TreeError>(())
            }
        },
    );
    (store, leaf)
}

/// A small device-like tree with branch metadata, bounds, a list and a
/// read-only getter.
pub fn device_schema() -> Schema<ParameterAccessor> {
    Schema::dict([
        ("name", Schema::value("Test device")),
        ("description", Schema::value("A device for testing")),
        (
            "exposure",
            Schema::leaf(
                Leaf::constant(0.1).with_metadata(
                    Metadata::new()
                        .min(0.0)
                        .max(10.0)
                        .units("s")
                        .name("Exposure time"),
                ),
            ),
        ),
        ("status", Schema::leaf(Leaf::getter(|| json!("idle")))),
        (
            "channels",
            Schema::list([
                json!({"enabled": true, "gain": 1}).into(),
                json!({"enabled": false, "gain": 2}).into(),
                json!({"enabled": true, "gain": 4}).into(),
            ]),
        ),
        (
            "mode",
            Schema::leaf(
                Leaf::constant("fast")
                    .with_metadata(Metadata::new().allowed_values(["fast", "slow"])),
            ),
        ),
    ])
}
