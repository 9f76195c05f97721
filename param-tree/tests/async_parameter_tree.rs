mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use param_tree::{
    AsyncParameterAccessor, AsyncParameterTree, Leaf, Metadata, Mutation, Schema, TreeError,
    load_overrides_str,
};
use serde_json::{Value, json};
use tokio::sync::Barrier;

use common::*;

type S = Schema<AsyncParameterAccessor>;

const DELAY: Duration = Duration::from_millis(10);

#[tokio::test]
async fn test_construction_resolves_types() {
    init_tracing();
    let (_, rw) = async_stored(json!(42), DELAY);
    let tree = AsyncParameterTree::new(S::dict([
        ("async_rw", S::leaf(rw)),
        ("async_ro", S::leaf(Leaf::async_getter(|| async { json!("ro") }))),
        ("blocking", S::leaf(Leaf::blocking_getter(|| json!(1.5)))),
        ("constant", S::constant(true)),
        ("raw", S::value(7)),
    ]))
    .await
    .unwrap();

    assert_eq!(
        tree.get("", false).await.unwrap(),
        json!({
            "async_rw": 42,
            "async_ro": "ro",
            "blocking": 1.5,
            "constant": true,
            "raw": 7,
        })
    );

    let with_md = tree.get("", true).await.unwrap();
    assert_eq!(
        with_md["async_rw"],
        json!({"value": 42, "writeable": true, "type": "int"})
    );
    assert_eq!(
        with_md["async_ro"],
        json!({"value": "ro", "writeable": false, "type": "str"})
    );
    assert_eq!(with_md["blocking"]["type"], json!("float"));
    assert_eq!(with_md["raw"], json!(7));
}

#[tokio::test]
async fn test_get_preserves_shape() {
    let tree = AsyncParameterTree::new(S::dict([
        ("name", S::value("Async device")),
        (
            "chans",
            S::list((0..4).map(|i| {
                S::dict([
                    ("id", S::constant(i)),
                    (
                        "reading",
                        S::leaf(Leaf::async_getter(move || async move {
                            tokio::time::sleep(Duration::from_millis(4 - i)).await;
                            json!(i * 10)
                        })),
                    ),
                ])
            })),
        ),
    ]))
    .await
    .unwrap();

    assert_eq!(
        tree.get("chans", false).await.unwrap(),
        json!({"chans": [
            {"id": 0, "reading": 0},
            {"id": 1, "reading": 10},
            {"id": 2, "reading": 20},
            {"id": 3, "reading": 30},
        ]})
    );
    assert_eq!(
        tree.get("chans/2/reading", false).await.unwrap(),
        json!({"reading": 20})
    );
    assert_eq!(
        tree.get("chans/3/reading/value", true).await.unwrap(),
        json!({"value": 30})
    );
    assert_eq!(
        tree.get("name", true).await.unwrap(),
        json!({"name": "Async device"})
    );
    assert!(matches!(
        tree.get("chans/4", false).await,
        Err(TreeError::InvalidPath(_))
    ));
}

#[tokio::test]
async fn test_set_runs_setters_concurrently() {
    const K: usize = 5;
    let barrier = Arc::new(Barrier::new(K));
    let completed = Arc::new(AtomicUsize::new(0));

    let leaves = (0..K).map(|i| {
        let (barrier, completed) = (barrier.clone(), completed.clone());
        let leaf = Leaf::async_accessor(
            || async { json!(0) },
            move |_| {
                let (barrier, completed) = (barrier.clone(), completed.clone());
                async move {
                    // Every setter must be in flight before any can finish
                    barrier.wait().await;
                    completed.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, TreeError>(())
                }
            },
        );
        (format!("p{i}"), S::leaf(leaf))
    });
    let mut tree = AsyncParameterTree::new(S::dict(leaves)).await.unwrap();

    let data = json!({"p0": 1, "p1": 2, "p2": 3, "p3": 4, "p4": 5});
    tokio::time::timeout(Duration::from_secs(5), tree.set("", data))
        .await
        .expect("setters were not run concurrently")
        .unwrap();
    assert_eq!(completed.load(Ordering::SeqCst), K);
}

#[tokio::test]
async fn test_set_waits_for_all_setters() {
    let (handles, leaves): (Vec<_>, Vec<_>) = (0..3u64)
        .map(|i| async_stored(json!(0), Duration::from_millis(5 * (i + 1))))
        .unzip();
    let mut tree = AsyncParameterTree::new(S::dict(
        leaves
            .into_iter()
            .enumerate()
            .map(|(i, leaf)| (format!("s{i}"), S::leaf(leaf))),
    ))
    .await
    .unwrap();

    tree.set("", json!({"s0": 10, "s1": 11, "s2": 12})).await.unwrap();
    let written: Vec<_> = handles.iter().map(|h| h.lock().clone()).collect();
    assert_eq!(written, [json!(10), json!(11), json!(12)]);
    assert_eq!(
        tree.get("", false).await.unwrap(),
        json!({"s0": 10, "s1": 11, "s2": 12})
    );
}

#[tokio::test]
async fn test_setter_failure_after_batch_completes() {
    let (ok_store, ok_leaf) = async_stored(json!(0), Duration::from_millis(20));
    let failing = Leaf::async_accessor(
        || async { json!(0) },
        |_| async { Err::<(), _>(TreeError::custom("write rejected by device")) },
    );
    let mut tree = AsyncParameterTree::new(S::dict([
        ("bad", S::leaf(failing)),
        ("good", S::leaf(ok_leaf)),
    ]))
    .await
    .unwrap();

    let err = tree
        .set("", json!({"bad": 1, "good": 2}))
        .await
        .unwrap_err();
    assert_eq!(err, TreeError::Custom("write rejected by device".into()));
    // The slower sibling write still completed before set returned
    assert_eq!(*ok_store.lock(), json!(2));
}

#[tokio::test]
async fn test_validation_errors() {
    let (_, rw) = async_stored(json!(5), DELAY);
    let mut tree = AsyncParameterTree::new(S::dict([
        ("ro", S::leaf(Leaf::async_getter(|| async { json!(5) }))),
        (
            "n",
            S::leaf(rw.with_metadata(Metadata::new().min(0).max(100))),
        ),
    ]))
    .await
    .unwrap();

    assert_eq!(
        tree.set("ro", json!(6)).await.unwrap_err().to_string(),
        "Parameter ro is read-only"
    );
    assert_eq!(
        tree.set("n", json!(150)).await.unwrap_err().to_string(),
        "150 is above the maximum value 100 for n"
    );
    assert_eq!(
        tree.set("n", json!("x")).await.unwrap_err().to_string(),
        "Type mismatch setting n: got str expected int"
    );

    tree.set("n", json!(50)).await.unwrap();
    assert_eq!(tree.get("n", false).await.unwrap(), json!({"n": 50}));
}

#[tokio::test]
#[allow(deprecated)]
async fn test_callbacks_wait_for_setters() {
    let log = Arc::new(Mutex::new(Vec::<(String, Value)>::new()));
    let (_, ok_leaf) = async_stored(json!(0), DELAY);
    let rejecting = Leaf::async_accessor(
        || async { json!(0) },
        |_| async { Err::<(), _>(TreeError::custom("rejected")) },
    );
    let mut tree = AsyncParameterTree::new(S::dict([
        ("bad", S::leaf(rejecting)),
        ("good", S::leaf(ok_leaf)),
        ("limit", S::constant(3)),
    ]))
    .await
    .unwrap();
    let recorded = log.clone();
    tree.add_callback("", move |path: &str, value: &Value| {
        recorded.lock().push((path.to_string(), value.clone()))
    });

    let err = tree
        .set("", json!({"bad": 1, "good": 2, "limit": 4}))
        .await
        .unwrap_err();
    assert_eq!(err, TreeError::Custom("rejected".into()));

    let mut fired = log.lock().clone();
    fired.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        fired,
        vec![
            ("good/".to_string(), json!(2)),
            ("limit/".to_string(), json!(4)),
        ]
    );

    log.lock().clear();
    assert!(tree.set("bad", json!(1)).await.is_err());
    assert!(log.lock().is_empty());
}

#[tokio::test]
async fn test_getters_in_write_data() {
    let mut tree = AsyncParameterTree::new(S::dict([("a", S::constant(1))]))
        .await
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    tree.set(
        "a",
        S::leaf(Leaf::blocking_getter(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            json!(2)
        })),
    )
    .await
    .unwrap();
    assert_eq!(tree.get("a", false).await.unwrap(), json!({"a": 2}));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tree.set("a", S::leaf(Leaf::async_getter(|| async { json!(3) })))
        .await
        .unwrap();
    assert_eq!(tree.get("a", false).await.unwrap(), json!({"a": 3}));
}

#[tokio::test]
async fn test_mutation() {
    let mut immutable = AsyncParameterTree::new(json!({"a": 1})).await.unwrap();
    assert!(matches!(
        immutable.delete("a"),
        Err(TreeError::NotMutable { .. })
    ));
    assert!(matches!(
        immutable.replace("a", json!(2)).await,
        Err(TreeError::NotMutable { .. })
    ));

    let reads = Arc::new(AtomicUsize::new(0));
    let counter = reads.clone();
    let rejected = immutable
        .replace(
            "a",
            S::leaf(Leaf::async_getter(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { json!(2) }
            })),
        )
        .await;
    assert_eq!(
        rejected,
        Err(TreeError::NotMutable {
            operation: Mutation::Replace
        })
    );
    assert_eq!(reads.load(Ordering::SeqCst), 0);

    let mut tree = AsyncParameterTree::builder(json!({"a": 1, "b": {"c": 2}}))
        .mutable(true)
        .build()
        .await
        .unwrap();
    tree.replace(
        "b",
        S::dict([(
            "sensor",
            S::leaf(Leaf::async_getter(|| async { json!(21.5) })),
        )]),
    )
    .await
    .unwrap();
    assert_eq!(
        tree.get("b/sensor", true).await.unwrap(),
        json!({"sensor": {"value": 21.5, "writeable": false, "type": "float"}})
    );

    tree.set("", json!({"new": "key"})).await.unwrap();
    tree.delete("a").unwrap();
    assert_eq!(
        tree.get("", false).await.unwrap(),
        json!({"b": {"sensor": 21.5}, "new": "key"})
    );
}

#[tokio::test]
async fn test_embedding_and_overrides() {
    let (store, rw) = async_stored(json!(0.5), DELAY);
    let inner = AsyncParameterTree::builder(S::dict([("gain", S::leaf(rw))]))
        .mutable(true)
        .build()
        .await
        .unwrap();
    let mut tree = AsyncParameterTree::new(S::dict([
        ("amp", inner.into()),
        ("label", S::constant("amp")),
    ]))
    .await
    .unwrap();
    assert_eq!(tree.mutable_paths().iter().collect::<Vec<_>>(), ["amp/"]);

    let overrides = load_overrides_str("amp/gain: 2\nlabel: main\namp:\n  extra: 1\n").unwrap();
    tree.apply_overrides(overrides).await.unwrap();

    assert_eq!(*store.lock(), json!(2));
    assert_eq!(
        tree.get("", false).await.unwrap(),
        json!({"amp": {"gain": 2, "extra": 1}, "label": "main"})
    );
    assert!(tree.delete("label").is_err());
    tree.delete("amp/extra").unwrap();
}
