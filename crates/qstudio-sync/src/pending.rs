//! Accepted fragment changes that are not yet visible in the source.
//!
//! A promise is made when code generation succeeds and is checked after
//! every rebuild:
//!
//! ```text
//! Promised ──rebuild──▶ Pending ──rebuild──▶ ...
//!     │                    │
//!     ├────────────────────┴──▶ Resolved    (expected text present)
//!     ├────────────────────┴──▶ Superseded  (newer promise for the node)
//!     └────────────────────┴──▶ Discarded   (node removed / template changed)
//! ```

use qstudio_graph::NodeId;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

/// State of a node's latest promise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingState {
    /// Recorded, not yet checked against a rebuild.
    Promised,
    /// Checked at least once and not yet visible.
    Pending,
    /// The expected text appeared in a rebuild.
    Resolved,
    /// Replaced by a newer promise for the same node.
    Superseded,
    /// Dropped without resolution.
    Discarded,
}

impl PendingState {
    /// Whether the promise is still open.
    pub fn is_active(self) -> bool {
        matches!(self, PendingState::Promised | PendingState::Pending)
    }
}

#[derive(Debug, Clone)]
struct Promise {
    expected: String,
    state: PendingState,
}

/// Per-node pending updates; at most one open promise per node.
#[derive(Debug, Clone, Default)]
pub struct PendingTracker {
    promises: FxHashMap<NodeId, Promise>,
}

impl PendingTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Promise that `expected` will show up in the source for `node_id`.
    ///
    /// Returns the state the previous promise ended in, if there was one.
    pub fn promise(&mut self, node_id: &NodeId, expected: impl Into<String>) -> Option<PendingState> {
        let previous = self.promises.insert(
            node_id.clone(),
            Promise {
                expected: expected.into(),
                state: PendingState::Promised,
            },
        );
        previous.map(|p| {
            if p.state.is_active() {
                debug!(node = %node_id, "Superseding pending update");
                PendingState::Superseded
            } else {
                p.state
            }
        })
    }

    /// Check open promises against freshly rebuilt text.
    ///
    /// Returns the nodes whose promise is still pending.
    pub fn resolve(&mut self, rebuilt: &str) -> Vec<NodeId> {
        let mut still_pending = Vec::new();
        for (node_id, promise) in &mut self.promises {
            if !promise.state.is_active() {
                continue;
            }
            if rebuilt.contains(&promise.expected) {
                trace!(node = %node_id, "Pending update resolved");
                promise.state = PendingState::Resolved;
            } else {
                promise.state = PendingState::Pending;
                still_pending.push(node_id.clone());
            }
        }
        still_pending.sort();
        still_pending
    }

    /// Whether `node_id` has an open promise.
    pub fn is_pending(&self, node_id: &NodeId) -> bool {
        self.promises
            .get(node_id)
            .is_some_and(|p| p.state.is_active())
    }

    /// State of the latest promise for `node_id`.
    pub fn state(&self, node_id: &NodeId) -> Option<PendingState> {
        self.promises.get(node_id).map(|p| p.state)
    }

    /// Discard the open promise for `node_id`. Returns whether one existed.
    pub fn discard(&mut self, node_id: &NodeId) -> bool {
        match self.promises.get_mut(node_id) {
            Some(p) if p.state.is_active() => {
                p.state = PendingState::Discarded;
                true
            }
            _ => false,
        }
    }

    /// Discard every open promise.
    pub fn clear(&mut self) {
        for promise in self.promises.values_mut() {
            if promise.state.is_active() {
                promise.state = PendingState::Discarded;
            }
        }
    }

    /// Nodes with open promises.
    pub fn pending_nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<_> = self
            .promises
            .iter()
            .filter(|(_, p)| p.state.is_active())
            .map(|(id, _)| id.clone())
            .collect();
        nodes.sort();
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_until_visible() {
        let mut tracker = PendingTracker::new();
        let n: NodeId = "n1".into();
        assert_eq!(tracker.promise(&n, "X=2"), None);
        assert_eq!(tracker.state(&n), Some(PendingState::Promised));

        assert_eq!(tracker.resolve("X=1"), vec![n.clone()]);
        assert!(tracker.is_pending(&n));
        assert_eq!(tracker.state(&n), Some(PendingState::Pending));

        assert!(tracker.resolve("X=2").is_empty());
        assert!(!tracker.is_pending(&n));
        assert_eq!(tracker.state(&n), Some(PendingState::Resolved));
    }

    #[test]
    fn test_new_promise_supersedes() {
        let mut tracker = PendingTracker::new();
        let n: NodeId = "n1".into();
        tracker.promise(&n, "X=2");
        assert_eq!(tracker.promise(&n, "X=3"), Some(PendingState::Superseded));

        // The superseded expectation no longer resolves the node.
        assert_eq!(tracker.resolve("X=2"), vec![n.clone()]);
        assert!(tracker.resolve("X=3").is_empty());
        assert_eq!(tracker.promise(&n, "X=4"), Some(PendingState::Resolved));
    }

    #[test]
    fn test_discard_and_clear() {
        let mut tracker = PendingTracker::new();
        let a: NodeId = "a".into();
        let b: NodeId = "b".into();
        tracker.promise(&a, "A");
        tracker.promise(&b, "B");

        assert!(tracker.discard(&a));
        assert!(!tracker.discard(&a));
        assert_eq!(tracker.state(&a), Some(PendingState::Discarded));
        assert_eq!(tracker.pending_nodes(), vec![b.clone()]);

        tracker.clear();
        assert!(tracker.pending_nodes().is_empty());
        assert!(tracker.resolve("").is_empty());
        assert_eq!(tracker.state(&b), Some(PendingState::Discarded));
    }
}
