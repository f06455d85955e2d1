//! The program graph: nodes, structural edges and a logical clock.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{GraphError, GraphResult};
use crate::id::{EdgeId, NodeId};
use crate::node::{Edge, Node, ParameterChange};
use crate::result::ResultPayload;

/// A DAG of program nodes.
///
/// Node iteration follows insertion order. Every fragment write stamps the
/// node with the next tick of a graph-wide logical clock.
#[derive(Debug, Clone, Default)]
pub struct ProgramGraph {
    dag: StableDiGraph<Node, Edge>,
    index: FxHashMap<NodeId, NodeIndex>,
    order: Vec<NodeId>,
    clock: u64,
}

/// Serializable form of a [`ProgramGraph`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Nodes in insertion order.
    pub nodes: Vec<Node>,
    /// Edges.
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl ProgramGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a graph from a snapshot.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> GraphResult<Self> {
        let mut graph = Self::new();
        for node in snapshot.nodes {
            graph.clock = graph.clock.max(node.updated_at);
            graph.add_node(node)?;
        }
        for edge in snapshot.edges {
            graph.add_edge(edge)?;
        }
        Ok(graph)
    }

    /// Serializable copy of the graph.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes().cloned().collect(),
            edges: self.edges().into_iter().cloned().collect(),
        }
    }

    /// Add a node.
    pub fn add_node(&mut self, node: Node) -> GraphResult<()> {
        if self.index.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        let id = node.id.clone();
        let idx = self.dag.add_node(node);
        self.index.insert(id.clone(), idx);
        self.order.push(id);
        Ok(())
    }

    /// Remove a node and its edges.
    pub fn remove_node(&mut self, id: &NodeId) -> GraphResult<Node> {
        let idx = self
            .index
            .remove(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        self.order.retain(|n| n != id);
        self.dag
            .remove_node(idx)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))
    }

    /// Connect `source` to `target` with a fresh edge ID.
    pub fn connect(&mut self, source: &NodeId, target: &NodeId) -> GraphResult<EdgeId> {
        let edge = Edge {
            id: EdgeId::new(),
            source: source.clone(),
            target: target.clone(),
        };
        let id = edge.id.clone();
        self.add_edge(edge)?;
        Ok(id)
    }

    /// Insert an edge. Edges that would close a cycle are rejected.
    pub fn add_edge(&mut self, edge: Edge) -> GraphResult<()> {
        let from = self.index_of(&edge.source)?;
        let to = self.index_of(&edge.target)?;

        if petgraph::algo::has_path_connecting(&self.dag, to, from, None) {
            return Err(GraphError::Cycle {
                source_id: edge.source,
                target: edge.target,
            });
        }

        debug!(source = %edge.source, target = %edge.target, "Connecting nodes");
        self.dag.add_edge(from, to, edge);
        Ok(())
    }

    /// Remove an edge by ID.
    pub fn disconnect(&mut self, id: &EdgeId) -> GraphResult<Edge> {
        let idx = self
            .dag
            .edge_indices()
            .find(|e| self.dag.edge_weight(*e).is_some_and(|w| &w.id == id))
            .ok_or_else(|| GraphError::EdgeNotFound(id.to_string()))?;
        self.dag
            .remove_edge(idx)
            .ok_or_else(|| GraphError::EdgeNotFound(id.to_string()))
    }

    /// Get a node by ID.
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.index.get(id).and_then(|idx| self.dag.node_weight(*idx))
    }

    /// Fragment fields must go through [`Self::write`] so the clock advances.
    pub(crate) fn node_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.index
            .get(id)
            .copied()
            .and_then(|idx| self.dag.node_weight_mut(idx))
    }

    /// Whether the graph contains `id`.
    pub fn contains(&self, id: &NodeId) -> bool {
        self.index.contains_key(id)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|id| self.node(id))
    }

    /// Node IDs in insertion order.
    pub fn node_ids(&self) -> &[NodeId] {
        &self.order
    }

    /// All edges, in index order.
    pub fn edges(&self) -> Vec<&Edge> {
        self.dag
            .edge_indices()
            .filter_map(|e| self.dag.edge_weight(e))
            .collect()
    }

    /// Direct upstream nodes of `id`.
    pub fn predecessors(&self, id: &NodeId) -> Vec<&Node> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Direct downstream nodes of `id`.
    pub fn successors(&self, id: &NodeId) -> Vec<&Node> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// All nodes with a path to `id`.
    pub fn ancestors(&self, id: &NodeId) -> Vec<&Node> {
        let Some(&start) = self.index.get(id) else {
            return Vec::new();
        };
        let mut seen = vec![start];
        let mut stack = vec![start];
        let mut found = Vec::new();
        while let Some(idx) = stack.pop() {
            for edge in self.dag.edges_directed(idx, Direction::Incoming) {
                let up = edge.source();
                if !seen.contains(&up) {
                    seen.push(up);
                    stack.push(up);
                    if let Some(node) = self.dag.node_weight(up) {
                        found.push(node);
                    }
                }
            }
        }
        found
    }

    fn neighbors(&self, id: &NodeId, dir: Direction) -> Vec<&Node> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        let mut found: Vec<_> = self
            .dag
            .edges_directed(idx, dir)
            .map(|e| match dir {
                Direction::Incoming => e.source(),
                Direction::Outgoing => e.target(),
            })
            .filter_map(|n| self.dag.node_weight(n))
            .collect();
        let ranks = self.ranks();
        found.sort_by_key(|n| rank_of(&ranks, &n.id));
        found
    }

    /// Node IDs in topological order; insertion order breaks ties.
    pub fn topological_order(&self) -> Vec<NodeId> {
        let ranks = self.ranks();
        let mut in_degree: FxHashMap<NodeIndex, usize> = self
            .dag
            .node_indices()
            .map(|idx| {
                let deg = self.dag.edges_directed(idx, Direction::Incoming).count();
                (idx, deg)
            })
            .collect();

        let mut ready: BinaryHeap<Reverse<(usize, NodeIndex)>> = in_degree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .filter_map(|(idx, _)| {
                let node = self.dag.node_weight(*idx)?;
                Some(Reverse((rank_of(&ranks, &node.id), *idx)))
            })
            .collect();

        let mut sorted = Vec::with_capacity(self.order.len());
        while let Some(Reverse((_, idx))) = ready.pop() {
            let Some(node) = self.dag.node_weight(idx) else {
                continue;
            };
            sorted.push(node.id.clone());
            for edge in self.dag.edges_directed(idx, Direction::Outgoing) {
                let next = edge.target();
                if let Some(deg) = in_degree.get_mut(&next) {
                    *deg -= 1;
                    if *deg == 0 {
                        if let Some(n) = self.dag.node_weight(next) {
                            ready.push(Reverse((rank_of(&ranks, &n.id), next)));
                        }
                    }
                }
            }
        }
        sorted
    }

    /// Insertion position of every node.
    fn ranks(&self) -> FxHashMap<&NodeId, usize> {
        self.order.iter().enumerate().map(|(i, id)| (id, i)).collect()
    }

    fn index_of(&self, id: &NodeId) -> GraphResult<NodeIndex> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))
    }

    fn write(&mut self, id: &NodeId, f: impl FnOnce(&mut Node)) -> GraphResult<u64> {
        let idx = self.index_of(id)?;
        let tick = self.clock + 1;
        let node = self
            .dag
            .node_weight_mut(idx)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        f(node);
        node.updated_at = tick;
        self.clock = tick;
        Ok(tick)
    }

    /// Write a node's primary fragment. Returns the new `updated_at`.
    pub fn set_primary_fragment(&mut self, id: &NodeId, code: Option<String>) -> GraphResult<u64> {
        self.write(id, |node| node.primary_fragment = code)
    }

    /// Write a node's raw-input fragment. Returns the new `updated_at`.
    pub fn set_raw_input_fragment(
        &mut self,
        id: &NodeId,
        code: Option<String>,
    ) -> GraphResult<u64> {
        self.write(id, |node| node.raw_input_fragment = code)
    }

    /// Record a parameter change on a node.
    pub fn set_parameter(
        &mut self,
        id: &NodeId,
        name: &str,
        value: &Value,
    ) -> GraphResult<ParameterChange> {
        let node = self
            .node_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        node.set_parameter(name, value)
    }

    /// Store an execution result on a node.
    pub fn set_output(&mut self, id: &NodeId, payload: ResultPayload) -> GraphResult<()> {
        let node = self
            .node_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        node.output = Some(payload);
        Ok(())
    }

    /// Current value of the logical clock.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.dag.node_count()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.dag.node_count() == 0
    }

    /// Remove all nodes and edges. The clock keeps running.
    pub fn clear(&mut self) {
        self.dag.clear();
        self.index.clear();
        self.order.clear();
    }
}

fn rank_of(ranks: &FxHashMap<&NodeId, usize>, id: &NodeId) -> usize {
    ranks.get(id).copied().unwrap_or(usize::MAX)
}
