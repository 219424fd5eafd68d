//! The fast, volatile cache tier.
//!
//! `original_source/state_manager.py` backs this tier with Redis
//! (`_set_redis_state`/`_get_redis_state`); here it's an in-process
//! concurrent map behind a single `RwLock`, sharded implicitly by the
//! `StateKey` string. A real multi-instance deployment could swap this for
//! a `redis` client behind the same three methods without the store above
//! noticing — the shape (string key, JSON value, optional TTL) is
//! Redis-compatible by construction.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value;

struct Entry {
    value: Value,
    expires_at: Option<DateTime<Utc>>,
}

/// Sub-millisecond key-value cache with optional per-key TTL.
#[derive(Default)]
pub struct Cache {
    inner: RwLock<HashMap<String, Entry>>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a value, treating an expired entry as absent (and evicting it).
    pub fn get(&self, key: &str) -> Option<Value> {
        {
            let guard = self.inner.read().expect("state cache lock poisoned");
            match guard.get(key) {
                Some(entry) if !is_expired(entry) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // Entry existed but is expired; drop it under a write lock.
        let mut guard = self.inner.write().expect("state cache lock poisoned");
        guard.remove(key);
        None
    }

    /// Write a value, with an optional absolute expiry.
    pub fn set(&self, key: impl Into<String>, value: Value, expires_at: Option<DateTime<Utc>>) {
        let mut guard = self.inner.write().expect("state cache lock poisoned");
        guard.insert(key.into(), Entry { value, expires_at });
    }

    /// Remove a single key.
    pub fn remove(&self, key: &str) {
        let mut guard = self.inner.write().expect("state cache lock poisoned");
        guard.remove(key);
    }

    /// Remove every key containing `infix` — used by `CleanupRun`, which
    /// must evict every tier/node/sub-key entry belonging to one run.
    pub fn remove_matching(&self, infix: &str) {
        let mut guard = self.inner.write().expect("state cache lock poisoned");
        guard.retain(|key, _| !key.contains(infix));
    }
}

fn is_expired(entry: &Entry) -> bool {
    entry.expires_at.map(|exp| exp <= Utc::now()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StateKey;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn roundtrips_a_value() {
        let cache = Cache::new();
        cache.set("k", json!({"a": 1}), None);
        assert_eq!(cache.get("k"), Some(json!({"a": 1})));
    }

    #[test]
    fn expired_entry_reads_as_absent() {
        let cache = Cache::new();
        cache.set("k", json!(1), Some(Utc::now() - chrono::Duration::seconds(1)));
        assert_eq!(cache.get("k"), None);
    }

    /// Regression test for `StateKey::run_prefix`/`cleanup_run`: the
    /// workflow-scope key (`workflow:{run_id}`, no trailing colon) must be
    /// evicted by the same prefix that catches node-scoped keys
    /// (`node:{run_id}:{node_id}:{sub_key}`, which does have one).
    #[test]
    fn remove_matching_evicts_every_scope_for_a_run_via_real_state_keys() {
        let cache = Cache::new();
        let run_1 = Uuid::new_v4();
        let run_2 = Uuid::new_v4();

        cache.set(StateKey::workflow(run_1).to_string(), json!(1), None);
        cache.set(StateKey::node(run_1, "a", "output").to_string(), json!(2), None);
        cache.set(StateKey::workflow(run_2).to_string(), json!(3), None);

        cache.remove_matching(&StateKey::run_prefix(run_1));

        assert_eq!(cache.get(&StateKey::workflow(run_1).to_string()), None);
        assert_eq!(cache.get(&StateKey::node(run_1, "a", "output").to_string()), None);
        assert_eq!(cache.get(&StateKey::workflow(run_2).to_string()), Some(json!(3)));
    }
}
