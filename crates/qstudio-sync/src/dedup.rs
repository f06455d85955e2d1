//! Single-flight registry for code-generation requests.

use std::sync::{Arc, Mutex, MutexGuard};

use qstudio_graph::NodeId;
use rustc_hash::FxHashSet;
use serde_json::Value;
use tracing::debug;

/// Identity of one logical edit request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InFlightKey {
    node_id: NodeId,
    parameter: String,
    value: String,
}

impl InFlightKey {
    /// Key for setting `parameter` of `node_id` to `value`.
    pub fn new(node_id: &NodeId, parameter: &str, value: &Value) -> Self {
        Self {
            node_id: node_id.clone(),
            parameter: parameter.to_string(),
            value: value.to_string(),
        }
    }

    /// The node this request edits.
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }
}

/// Tracks requests currently in flight. At most one per key.
///
/// Clones share the same registry.
#[derive(Debug, Clone, Default)]
pub struct RequestDeduplicator {
    in_flight: Arc<Mutex<FxHashSet<InFlightKey>>>,
}

impl RequestDeduplicator {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FxHashSet<InFlightKey>> {
        // The set stays consistent even if a holder panicked.
        self.in_flight
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Register `key`. Returns `false` if it is already in flight.
    pub fn try_acquire(&self, key: &InFlightKey) -> bool {
        let acquired = self.lock().insert(key.clone());
        if !acquired {
            debug!(node = %key.node_id, parameter = %key.parameter, "Request already in flight");
        }
        acquired
    }

    /// Unregister `key`.
    pub fn release(&self, key: &InFlightKey) {
        self.lock().remove(key);
    }

    /// Register `key` and get a guard that releases it on drop.
    pub fn acquire(&self, key: InFlightKey) -> Option<InFlightGuard> {
        self.try_acquire(&key).then(|| InFlightGuard {
            registry: self.clone(),
            key,
        })
    }

    /// Whether any request for `node_id` is in flight.
    pub fn is_node_in_flight(&self, node_id: &NodeId) -> bool {
        self.lock().iter().any(|k| &k.node_id == node_id)
    }

    /// Number of requests in flight.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Holds an in-flight key; releases it when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    registry: RequestDeduplicator,
    key: InFlightKey,
}

impl InFlightGuard {
    /// The held key.
    pub fn key(&self) -> &InFlightKey {
        &self.key
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.release(&self.key);
    }
}
