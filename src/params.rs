//! Per-visit node configuration, assigned by the orchestrator immediately
//! before invoking a node's lifecycle.
//!
//! Grounded on the teacher's `core/communication.rs::Params`: a typed
//! `HashMap<String, serde_json::Value>` wrapper with a `merge` that favors
//! the caller (here: the orchestrator's current params win over the
//! node's statically-configured ones, matching spec §3: "child overrides").

use std::collections::HashMap;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

/// A mapping from string keys to arbitrary (JSON-representable) values,
/// attached to a node immediately before each visit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    inner: HashMap<String, Value>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: HashMap<String, Value>) -> Self {
        Self { inner: map }
    }

    pub fn set<V: Serialize>(&mut self, key: impl Into<String>, value: V) -> Result<(), serde_json::Error> {
        self.inner.insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.inner.get(key).and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.inner.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.inner.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Merge `other` over `self`: keys in `other` win. Used by the
    /// orchestrator to compute "flow's current params ∪ node's static
    /// params, flow wins on conflicts" (spec §3/§4.4).
    pub fn merged_over(&self, other: &Params) -> Params {
        let mut merged = self.inner.clone();
        merged.extend(other.inner.iter().map(|(k, v)| (k.clone(), v.clone())));
        Params { inner: merged }
    }
}

impl From<HashMap<String, Value>> for Params {
    fn from(map: HashMap<String, Value>) -> Self {
        Params::from_map(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_has_other_win_on_conflict() {
        let mut base = Params::new();
        base.set("a", 1).unwrap();
        base.set("b", 2).unwrap();

        let mut overrides = Params::new();
        overrides.set("b", 20).unwrap();
        overrides.set("c", 3).unwrap();

        let merged = base.merged_over(&overrides);
        assert_eq!(merged.get::<i64>("a"), Some(1));
        assert_eq!(merged.get::<i64>("b"), Some(20));
        assert_eq!(merged.get::<i64>("c"), Some(3));
        assert_eq!(merged.get_value("b"), Some(&json!(20)));
    }
}
