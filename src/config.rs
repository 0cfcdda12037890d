//! Per-library configuration namespaces.
//!
//! Each instrumentation adapter owns one [`ConfigNamespace`], seeded with its
//! defaults at creation. Interceptors read it on every intercepted call, so
//! edits take effect immediately without re-instrumenting. Writes are not
//! validated here; an unrecognized value is the caller's error and is logged
//! and ignored by the adapter at call time.
use crate::trace::TracerHandle;
use crate::{Key, Value};
use std::collections::HashMap;
use std::sync::RwLock;

/// A mutable, key-addressable record of library tunables.
///
/// Interior mutability lets adapters hold these in `static` cells while
/// installed interceptors read them concurrently. Setup-time writes are
/// expected to happen before the instrumented library starts serving
/// traffic; the locks exist for aliasing safety, not to license concurrent
/// reconfiguration.
#[derive(Debug, Default)]
pub struct ConfigNamespace {
    entries: RwLock<HashMap<Key, Value>>,
    tracer: RwLock<Option<TracerHandle>>,
}

/// A point-in-time copy of a namespace, for test isolation.
#[derive(Debug, Default)]
pub struct ConfigSnapshot {
    entries: HashMap<Key, Value>,
    tracer: Option<TracerHandle>,
}

impl ConfigNamespace {
    /// Create an empty namespace.
    pub fn new() -> Self {
        ConfigNamespace::default()
    }

    /// Create a namespace seeded with library-specific defaults.
    pub fn with_defaults<I, K, V>(defaults: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Key>,
        V: Into<Value>,
    {
        let namespace = ConfigNamespace::new();
        for (key, value) in defaults {
            namespace.set(key, value);
        }
        namespace
    }

    /// The current value for `key`, if set.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries
            .read()
            .expect("ConfigNamespace RwLock poisoned")
            .get(&Key::new(key.to_string()))
            .cloned()
    }

    /// The current string value for `key`, if set and a string.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(str::to_string))
    }

    /// The current bool value for `key`, if set and a bool.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    /// Set `key` to `value`, replacing any previous value.
    pub fn set<K, V>(&self, key: K, value: V)
    where
        K: Into<Key>,
        V: Into<Value>,
    {
        self.entries
            .write()
            .expect("ConfigNamespace RwLock poisoned")
            .insert(key.into(), value.into());
    }

    /// Remove `key`, returning its previous value if any.
    pub fn unset(&self, key: &str) -> Option<Value> {
        self.entries
            .write()
            .expect("ConfigNamespace RwLock poisoned")
            .remove(&Key::new(key.to_string()))
    }

    /// The per-library tracer override, if one is set.
    ///
    /// Resolution order at call time is: tracer passed to `instrument` >
    /// this override > the ambient global tracer.
    pub fn tracer(&self) -> Option<TracerHandle> {
        self.tracer
            .read()
            .expect("ConfigNamespace RwLock poisoned")
            .clone()
    }

    /// Set or clear the per-library tracer override.
    pub fn set_tracer(&self, tracer: Option<TracerHandle>) {
        *self
            .tracer
            .write()
            .expect("ConfigNamespace RwLock poisoned") = tracer;
    }

    /// Capture the current state for later [`restore`](Self::restore).
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            entries: self
                .entries
                .read()
                .expect("ConfigNamespace RwLock poisoned")
                .clone(),
            tracer: self.tracer(),
        }
    }

    /// Reassign the namespace to a previously captured state.
    pub fn restore(&self, snapshot: ConfigSnapshot) {
        *self
            .entries
            .write()
            .expect("ConfigNamespace RwLock poisoned") = snapshot.entries;
        self.set_tracer(snapshot.tracer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_namespace() {
        let cfg = ConfigNamespace::new();
        cfg.set("thing", 123);
        assert_eq!(cfg.get("thing"), Some(Value::I64(123)));
        assert_eq!(cfg.unset("thing"), Some(Value::I64(123)));
        assert_eq!(cfg.get("thing"), None);
        assert_eq!(cfg.unset("thing"), None);
    }

    #[test]
    fn namespace_with_defaults() {
        let cfg = ConfigNamespace::with_defaults([
            ("traced_commands", Value::from(vec!["get", "set"])),
            ("propagate", Value::from(true)),
        ]);
        assert_eq!(cfg.get_bool("propagate"), Some(true));
        assert_eq!(
            cfg.get("traced_commands"),
            Some(Value::from(vec!["get", "set"]))
        );

        cfg.set("propagate", false);
        assert_eq!(cfg.get_bool("propagate"), Some(false));
    }

    #[test]
    fn snapshot_and_restore() {
        let cfg = ConfigNamespace::with_defaults([("span_tags", Value::from(vec!["env:prod"]))]);
        let saved = cfg.snapshot();

        cfg.set("span_tags", Value::from(vec!["env:test"]));
        cfg.set("extra", 1);
        cfg.restore(saved);

        assert_eq!(cfg.get("span_tags"), Some(Value::from(vec!["env:prod"])));
        assert_eq!(cfg.get("extra"), None);
    }
}
