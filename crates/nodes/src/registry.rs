//! The node-type registry shared by the validator and the dispatcher.
//!
//! A single instance is constructed at startup and handed to both the
//! `engine` crate's validator and its executor, so `register` calls are
//! visible to both without a second source of truth (spec: "the known-type
//! registry is mutable at runtime ... shared by validator and dispatcher").

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::ExecutableNode;

/// Maps `node.type` strings to their registered executor.
///
/// Read-mostly: registrations happen at startup or via an admin path;
/// lookups happen on every node dispatch. Guarded by a reader/writer lock
/// rather than a mutex so concurrent runs never block each other on a
/// lookup.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    inner: Arc<RwLock<HashMap<String, Arc<dyn ExecutableNode>>>>,
}

impl NodeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the executor for `node_type`.
    pub fn register(&self, node_type: impl Into<String>, executor: Arc<dyn ExecutableNode>) {
        let mut guard = self.inner.write().expect("node registry lock poisoned");
        guard.insert(node_type.into(), executor);
    }

    /// Resolve the executor registered for `node_type`, if any.
    pub fn get(&self, node_type: &str) -> Option<Arc<dyn ExecutableNode>> {
        let guard = self.inner.read().expect("node registry lock poisoned");
        guard.get(node_type).cloned()
    }

    /// Every `node_type` currently registered.
    pub fn known_types(&self) -> Vec<String> {
        let guard = self.inner.read().expect("node registry lock poisoned");
        guard.keys().cloned().collect()
    }

    /// `true` if an executor is registered for `node_type`.
    pub fn is_registered(&self, node_type: &str) -> bool {
        let guard = self.inner.read().expect("node registry lock poisoned");
        guard.contains_key(node_type)
    }
}
