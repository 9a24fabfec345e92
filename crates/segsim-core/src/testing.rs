//! Reference topologies for tests.

use crate::network::{
    types::{Link, Matrix, Node, NodeId},
    Network, Topology, TopologyError,
};

/// Every link gets this bandwidth.
pub const BANDWIDTH: f64 = 10.0;

/// Unit IGP weights for an `n`-node topology.
pub fn unit_weights(n: usize) -> Matrix {
    Matrix::ones((n, n))
}

fn config(n: usize, pairs: &[(usize, usize)]) -> (Vec<Node>, Vec<Link>) {
    let nodes = (0..n).map(|i| Node::new(NodeId::new(i))).collect();
    let links = pairs
        .iter()
        .map(|&(a, b)| Link::new(NodeId::new(a), NodeId::new(b), BANDWIDTH))
        .collect();
    (nodes, links)
}

fn weighted(n: usize, pairs: &[(usize, usize)]) -> Result<Network, TopologyError> {
    let (nodes, links) = config(n, pairs);
    let mut network = Network::new(&nodes, &links)?;
    network.apply_weights(unit_weights(n))?;
    Ok(network)
}

/// Three fully connected nodes.
pub fn triangle_config() -> (Vec<Node>, Vec<Link>) {
    config(3, &[(0, 1), (1, 2), (0, 2)])
}

/// [`triangle_config`] with unit weights applied.
pub fn triangle() -> Result<Network, TopologyError> {
    weighted(3, &[(0, 1), (1, 2), (0, 2)])
}

/// Four nodes in a cycle: 0 - 1 - 3 - 2 - 0. Node 0 has two equal-cost paths to node 3.
pub fn square_config() -> (Vec<Node>, Vec<Link>) {
    config(4, &[(0, 1), (0, 2), (1, 3), (2, 3)])
}

/// [`square_config`] with unit weights applied.
pub fn square() -> Result<Network, TopologyError> {
    weighted(4, &[(0, 1), (0, 2), (1, 3), (2, 3)])
}

/// A small leaf-spine fabric. Nodes 0-3 are edge routers, 4 and 5 are leaves, 6 and 7 are
/// spines.
pub fn eight_node_config() -> (Vec<Node>, Vec<Link>) {
    // Each leaf is connected to 2 edge routers, and each leaf is connected to both spines
    config(
        8,
        &[
            (0, 4),
            (1, 4),
            (2, 5),
            (3, 5),
            (4, 6),
            (4, 7),
            (5, 6),
            (5, 7),
        ],
    )
}
