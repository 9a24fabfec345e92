use std::collections::{HashMap, HashSet};

use petgraph::graph::DiGraph;

use crate::network::{
    routing::ShortestPathDag,
    types::{Channel, Link, Matrix, Node, NodeId},
};

/// The interface the simulator needs from a topology: link state, capacities, IGP weights and
/// the per-destination shortest-path DAGs derived from them.
pub trait Topology {
    /// The number of nodes. Node IDs range over `0..dimension()`.
    fn dimension(&self) -> usize;

    /// Returns true if there is a channel from `from` to `to`.
    fn edge_exists(&self, from: NodeId, to: NodeId) -> bool;

    /// Returns true if the channel exists and is up.
    fn is_up(&self, from: NodeId, to: NodeId) -> bool;

    /// The capacity of a channel, if it exists.
    fn bandwidth(&self, from: NodeId, to: NodeId) -> Option<f64>;

    /// All channels as `(from, to)` pairs, up or down.
    fn channels(&self) -> Vec<(NodeId, NodeId)>;

    /// The weights last applied, if any.
    fn weights(&self) -> Option<&Matrix>;

    /// Applies IGP weights and rebuilds every per-destination DAG.
    fn apply_weights(&mut self, weights: Matrix) -> Result<(), TopologyError>;

    /// Sets the status of the link between `a` and `b`. DAGs are left as they are until the
    /// next call to [`Topology::apply_weights`].
    fn set_link_up(&mut self, a: NodeId, b: NodeId, up: bool) -> Result<(), TopologyError>;

    /// The DAG of paths towards `dest` under the current weights.
    fn shortest_path_dag(&self, dest: NodeId) -> Result<&ShortestPathDag, TopologyError>;

    /// Nodes that can reach `dest` over up channels, farthest first.
    fn nodes_reachable_to(&self, dest: NodeId) -> Result<Vec<NodeId>, TopologyError> {
        Ok(self.shortest_path_dag(dest)?.order().to_vec())
    }
}

/// Builds a channel graph from a list of nodes and links. This function returns an error if
/// the given nodes and links fail to produce a valid topology. The checks are not exhaustive.
///
/// Correctness properties:
///
/// - Every node must have a unique ID.
/// - Node IDs must be dense, i.e. `0..nodes.len()`.
/// - Every link must have distinct endpoints in `nodes`.
/// - Every node must be referenced by some link.
/// - For any two nodes, there must be at most one link between them.
pub(crate) fn build_graph(
    nodes: &[Node],
    links: &[Link],
) -> Result<DiGraph<Node, Channel>, TopologyError> {
    let mut sorted = nodes.to_vec();
    sorted.sort_by_key(|n| n.id);
    let mut g = DiGraph::new();
    let mut id2idx = HashMap::new();
    for (i, n @ Node { id }) in sorted.into_iter().enumerate() {
        let idx = g.add_node(n);
        if id2idx.insert(id, idx).is_some() {
            // CORRECTNESS: Every node must have a unique ID.
            return Err(TopologyError::DuplicateNodeId(id));
        }
        // CORRECTNESS: Node IDs must be dense.
        if id.inner() != i {
            return Err(TopologyError::NonDenseNodeId(id));
        }
    }
    let mut referenced_nodes = HashSet::new();
    for &Link { a, b, bandwidth } in links {
        // CORRECTNESS: Every link must have distinct endpoints in `nodes`.
        if a == b {
            return Err(TopologyError::NodeAdjacentSelf(a));
        }
        let (Some(&ia), Some(&ib)) = (id2idx.get(&a), id2idx.get(&b)) else {
            let missing = if id2idx.contains_key(&a) { b } else { a };
            return Err(TopologyError::UndeclaredNode(missing));
        };
        // CORRECTNESS: For any two nodes, there must be at most one link between them.
        if g.find_edge(ia, ib).is_some() {
            return Err(TopologyError::DuplicateLink { n1: a, n2: b });
        }
        referenced_nodes.insert(a);
        referenced_nodes.insert(b);
        // Channels are unidirectional
        g.add_edge(ia, ib, Channel::new(a, b, bandwidth));
        g.add_edge(ib, ia, Channel::new(b, a, bandwidth));
    }
    // CORRECTNESS: Every node must be referenced by some link.
    for &id in id2idx.keys() {
        if !referenced_nodes.contains(&id) {
            return Err(TopologyError::IsolatedNode(id));
        }
    }
    Ok(g)
}

#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("Duplicate node ID {0}")]
    DuplicateNodeId(NodeId),

    #[error("Node ID {0} leaves a gap (node IDs must be 0..n)")]
    NonDenseNodeId(NodeId),

    #[error("Node {0} is connected to itself")]
    NodeAdjacentSelf(NodeId),

    #[error("Node {0} is not declared")]
    UndeclaredNode(NodeId),

    #[error("Duplicate links between {n1} and {n2}")]
    DuplicateLink { n1: NodeId, n2: NodeId },

    #[error("Node {0} is not connected to any other node")]
    IsolatedNode(NodeId),

    #[error("Unknown node {0}")]
    UnknownNode(NodeId),

    #[error("No link from {from} to {to}")]
    UnknownLink { from: NodeId, to: NodeId },

    #[error("Matrix has shape {got:?}, expected {expected}x{expected}")]
    DimensionMismatch { expected: usize, got: (usize, usize) },

    #[error("Invalid weight {weight} on link {from} -> {to}")]
    InvalidWeight { from: NodeId, to: NodeId, weight: f64 },

    #[error("No weights have been applied to the topology")]
    StaleTopology,
}
