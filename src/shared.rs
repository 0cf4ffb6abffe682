//! The shared mutable context threaded through every node in a run.
//!
//! Grounded on the teacher's `core/communication.rs::BaseSharedStore` /
//! `InMemoryBackend` (an `Arc`-shared, lock-backed key/value store), but
//! specialized to `serde_json::Value` instead of `dyn Any`: the spec
//! describes the shared context as dynamically-typed JSON-like data that
//! nodes agree on by convention, not arbitrary Rust types a caller would
//! need to downcast.
//!
//! `Shared` is intentionally cheap to `Clone` (an `Arc` bump) so it can be
//! hashed into concurrent tasks spawned by the parallel batch variants. The
//! internal `RwLock` exists only to satisfy Rust's aliasing rules for that
//! concurrent access — it is not a coordination mechanism. Per spec §5,
//! correctness under parallel execution still relies on the caller using
//! disjoint keys; two nodes racing to set the same key will not corrupt
//! memory, but the result is still a last-write-wins race the runtime makes
//! no promises about.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

/// The mutable mapping from string keys to dynamically-typed values passed
/// by reference through an entire `Flow`/`AsyncFlow` run.
#[derive(Debug, Clone, Default)]
pub struct Shared {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl Shared {
    /// A fresh, empty shared context. Created by the caller and handed to
    /// a `Flow`; the flow retains no ownership once `run` returns.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: HashMap<String, Value>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(map)),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.read().get(key).cloned()
    }

    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| serde_json::from_value(v).ok())
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.inner.write().insert(key.into(), value.into());
    }

    pub fn set_serializable<T: Serialize>(
        &self,
        key: impl Into<String>,
        value: T,
    ) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.inner.write().insert(key.into(), value);
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.write().remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.read().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Snapshot the full map. Mostly useful for tests/debugging; the
    /// runtime itself never needs the whole map at once.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.inner.read().clone()
    }
}

impl From<HashMap<String, Value>> for Shared {
    fn from(map: HashMap<String, Value>) -> Self {
        Shared::from_map(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_and_get_roundtrip() {
        let shared = Shared::new();
        shared.set("key", json!("value"));
        assert_eq!(shared.get("key"), Some(json!("value")));
    }

    #[test]
    fn clone_observes_same_underlying_store() {
        let shared = Shared::new();
        let clone = shared.clone();
        shared.set("key", json!(1));
        assert_eq!(clone.get("key"), Some(json!(1)));
    }

    #[test]
    fn remove_and_contains() {
        let shared = Shared::new();
        shared.set("k", json!(true));
        assert!(shared.contains_key("k"));
        assert_eq!(shared.remove("k"), Some(json!(true)));
        assert!(!shared.contains_key("k"));
    }
}
