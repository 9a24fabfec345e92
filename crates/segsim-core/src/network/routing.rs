//! Per-destination routing DAGs derived from IGP weights.

use std::{cmp::Reverse, collections::BinaryHeap};

use ordered_float::OrderedFloat;
use petgraph::{
    graph::{DiGraph, NodeIndex},
    visit::EdgeRef,
    Direction,
};

use crate::{
    constants::EPSILON,
    network::types::{Channel, Matrix, Node, NodeId},
};

/// A channel leading strictly closer to the DAG's destination.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct DagEdge {
    /// The next hop.
    pub to: NodeId,
    /// How much longer than the shortest path it is to go through `to`. Zero for channels on
    /// the shortest-path DAG.
    pub extra: f64,
}

impl DagEdge {
    pub fn is_shortest(&self) -> bool {
        self.extra == 0.0
    }
}

/// Distances towards one destination over up channels, along with every downward channel.
///
/// The channels with zero extra cost make up the shortest-path DAG used by ECMP. All downward
/// channels together still form a DAG (distances strictly decrease along them), which is what
/// penalizing policies such as DEFT and PEFT split over.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ShortestPathDag {
    dest: NodeId,
    distances: Vec<f64>,
    downward: Vec<Vec<DagEdge>>,
    // Reachable nodes sorted by decreasing distance
    order: Vec<NodeId>,
}

impl ShortestPathDag {
    /// Builds the DAG towards `dest` with a reverse Dijkstra over up channels.
    ///
    /// PRECONDITION: `weights` has been validated against `graph`.
    pub(crate) fn new(graph: &DiGraph<Node, Channel>, weights: &Matrix, dest: NodeId) -> Self {
        let n = graph.node_count();
        let mut distances = vec![f64::INFINITY; n];
        let mut heap = BinaryHeap::new();
        distances[dest.inner()] = 0.0;
        heap.push(Reverse((OrderedFloat(0.0), dest.inner())));
        while let Some(Reverse((OrderedFloat(d), x))) = heap.pop() {
            if d > distances[x] {
                continue;
            }
            // Relax every channel leading into `x`
            for e in graph.edges_directed(NodeIndex::new(x), Direction::Incoming) {
                if !e.weight().up {
                    continue;
                }
                let u = e.source().index();
                let candidate = d + weights[[u, x]];
                if candidate < distances[u] {
                    distances[u] = candidate;
                    heap.push(Reverse((OrderedFloat(candidate), u)));
                }
            }
        }

        let downward = (0..n)
            .map(|v| {
                let dv = distances[v];
                if !dv.is_finite() {
                    return Vec::new();
                }
                let mut edges = graph
                    .edges(NodeIndex::new(v))
                    .filter(|e| e.weight().up)
                    .filter_map(|e| {
                        let x = e.target().index();
                        let dx = distances[x];
                        (dx < dv).then(|| {
                            let extra = weights[[v, x]] + dx - dv;
                            let extra = if extra <= EPSILON * dv.max(1.0) {
                                0.0
                            } else {
                                extra
                            };
                            DagEdge {
                                to: NodeId::new(x),
                                extra,
                            }
                        })
                    })
                    .collect::<Vec<_>>();
                edges.sort_by_key(|e| e.to);
                edges
            })
            .collect();

        let mut order = (0..n)
            .filter(|&v| distances[v].is_finite())
            .map(NodeId::new)
            .collect::<Vec<_>>();
        order.sort_by_key(|&v| (Reverse(OrderedFloat(distances[v.inner()])), v));

        Self {
            dest,
            distances,
            downward,
            order,
        }
    }

    pub fn dest(&self) -> NodeId {
        self.dest
    }

    /// The number of nodes in the topology, reachable or not.
    pub fn nr_nodes(&self) -> usize {
        self.distances.len()
    }

    /// The shortest distance from `node` to the destination, if it can reach it.
    pub fn distance(&self, node: NodeId) -> Option<f64> {
        self.distances
            .get(node.inner())
            .copied()
            .filter(|d| d.is_finite())
    }

    pub fn is_reachable(&self, node: NodeId) -> bool {
        self.distance(node).is_some()
    }

    /// Every channel out of `node` that leads strictly closer to the destination.
    pub fn downward(&self, node: NodeId) -> &[DagEdge] {
        self.downward
            .get(node.inner())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Next hops of `node` on the shortest-path DAG.
    pub fn next_hops(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.downward(node)
            .iter()
            .filter(|e| e.is_shortest())
            .map(|e| e.to)
    }

    /// Returns true if the channel `from -> to` lies on some shortest path to the destination.
    pub fn is_on_shortest_path(&self, from: NodeId, to: NodeId) -> bool {
        self.downward(from)
            .iter()
            .any(|e| e.to == to && e.is_shortest())
    }

    /// Reachable nodes, farthest from the destination first.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Enumerates every equal-cost shortest path from `from` to the destination. The result is
    /// empty if `from` cannot reach the destination.
    pub fn shortest_paths(&self, from: NodeId) -> Vec<Vec<NodeId>> {
        let mut acc = Vec::new();
        if self.is_reachable(from) {
            self.walk(from, &mut vec![from], &mut acc);
        }
        acc
    }

    fn walk(&self, cur: NodeId, prefix: &mut Vec<NodeId>, acc: &mut Vec<Vec<NodeId>>) {
        if cur == self.dest {
            acc.push(prefix.clone());
            return;
        }
        for next in self.next_hops(cur) {
            prefix.push(next);
            self.walk(next, prefix, acc);
            prefix.pop();
        }
    }
}
