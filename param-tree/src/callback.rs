//! Deprecated path-prefix observers.
//!
//! Observers are invoked after every committed leaf write whose path starts
//! with the registered prefix. Overlapping prefixes all fire, in registration
//! order. Leaf accessors with setters replace this mechanism.

use serde_json::Value;

/// Observer invoked with the committed path (slash-terminated) and the written value.
pub type Callback = Box<dyn Fn(&str, &Value) + Send + Sync>;

#[derive(Default)]
pub(crate) struct Callbacks {
    entries: Vec<(String, Callback)>,
}

impl Callbacks {
    pub fn push(&mut self, prefix: String, callback: Callback) {
        self.entries.push((prefix, callback));
    }

    /// Move another tree's observers in, re-prefixed with `base`.
    pub fn extend_under(&mut self, base: &str, other: Callbacks) {
        for (prefix, callback) in other.entries {
            self.entries.push((format!("{}{}", base, prefix), callback));
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        self.entries
            .iter()
            .any(|(prefix, _)| path.starts_with(prefix.as_str()))
    }

    pub fn notify(&self, path: &str, value: &Value) {
        for (prefix, callback) in &self.entries {
            if path.starts_with(prefix.as_str()) {
                callback(path, value);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Callback {
        let log = log.clone();
        Box::new(move |path, value| log.lock().push(format!("{tag}:{path}={value}")))
    }

    #[test]
    fn test_overlapping_prefixes_all_fire() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut callbacks = Callbacks::default();
        callbacks.push("a/".into(), recorder(&log, "outer"));
        callbacks.push("a/b/".into(), recorder(&log, "inner"));
        callbacks.push("c/".into(), recorder(&log, "other"));

        assert!(callbacks.matches("a/b/"));
        callbacks.notify("a/b/", &json!(1));
        assert_eq!(*log.lock(), vec!["outer:a/b/=1", "inner:a/b/=1"]);
        assert!(!callbacks.matches("b/"));
    }

    #[test]
    fn test_extend_under() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut inner = Callbacks::default();
        inner.push("x/".into(), recorder(&log, "inner"));

        let mut outer = Callbacks::default();
        outer.extend_under("sub/", inner);
        assert_eq!(outer.len(), 1);

        outer.notify("x/", &json!(0));
        assert!(log.lock().is_empty());
        outer.notify("sub/x/", &json!(2));
        assert_eq!(*log.lock(), vec!["inner:sub/x/=2"]);
    }
}
