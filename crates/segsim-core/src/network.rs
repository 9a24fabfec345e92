//! The topology collaborator: the [`Topology`] trait and a petgraph-backed [`Network`]
//! implementing it.

pub mod routing;
pub mod topology;
pub mod types;

use log::info;
use petgraph::graph::{DiGraph, NodeIndex};
use rayon::prelude::*;

pub use routing::{DagEdge, ShortestPathDag};
pub use topology::{Topology, TopologyError};
pub use types::*;

#[derive(Debug, Clone)]
pub struct Network {
    graph: DiGraph<Node, Channel>,
    links: Vec<Link>,
    weights: Option<Matrix>,
    // One DAG per destination, indexed by node ID; empty until weights are applied
    dags: Vec<ShortestPathDag>,
}

impl Network {
    pub fn new(nodes: &[Node], links: &[Link]) -> Result<Self, TopologyError> {
        let graph = topology::build_graph(nodes, links)?;
        Ok(Self {
            graph,
            links: links.to_vec(),
            weights: None,
            dags: Vec::new(),
        })
    }

    fn channel(&self, from: NodeId, to: NodeId) -> Option<&Channel> {
        self.graph
            .find_edge(NodeIndex::new(from.inner()), NodeIndex::new(to.inner()))
            .map(|e| &self.graph[e])
    }

    fn channel_mut(&mut self, from: NodeId, to: NodeId) -> Option<&mut Channel> {
        self.graph
            .find_edge(NodeIndex::new(from.inner()), NodeIndex::new(to.inner()))
            .map(|e| &mut self.graph[e])
    }

    delegate::delegate! {
        to self.graph {
            #[call(node_weights)]
            pub fn nodes(&self) -> impl Iterator<Item = &Node>;
        }

        to self.links {
            #[call(iter)]
            pub fn links(&self) -> impl Iterator<Item = &Link>;
        }
    }
}

impl Topology for Network {
    fn dimension(&self) -> usize {
        self.graph.node_count()
    }

    fn edge_exists(&self, from: NodeId, to: NodeId) -> bool {
        self.channel(from, to).is_some()
    }

    fn is_up(&self, from: NodeId, to: NodeId) -> bool {
        self.channel(from, to).map_or(false, |c| c.up)
    }

    fn bandwidth(&self, from: NodeId, to: NodeId) -> Option<f64> {
        self.channel(from, to).map(|c| c.bandwidth)
    }

    fn channels(&self) -> Vec<(NodeId, NodeId)> {
        self.graph.edge_weights().map(|c| (c.src, c.dst)).collect()
    }

    fn weights(&self) -> Option<&Matrix> {
        self.weights.as_ref()
    }

    fn apply_weights(&mut self, weights: Matrix) -> Result<(), TopologyError> {
        let n = self.dimension();
        if weights.dim() != (n, n) {
            return Err(TopologyError::DimensionMismatch {
                expected: n,
                got: weights.dim(),
            });
        }
        for c in self.graph.edge_weights() {
            let weight = weights[[c.src.inner(), c.dst.inner()]];
            if !weight.is_finite() || weight <= 0.0 {
                return Err(TopologyError::InvalidWeight {
                    from: c.src,
                    to: c.dst,
                    weight,
                });
            }
        }
        // Each destination gets its own reverse Dijkstra. Do these in parallel.
        let graph = &self.graph;
        let dags = (0..n)
            .into_par_iter()
            .map(|dest| ShortestPathDag::new(graph, &weights, NodeId::new(dest)))
            .collect();
        self.dags = dags;
        self.weights = Some(weights);
        info!("Applied weights, rebuilt {n} destination DAGs");
        Ok(())
    }

    fn set_link_up(&mut self, a: NodeId, b: NodeId, up: bool) -> Result<(), TopologyError> {
        let forward = self.channel_mut(a, b).map(|c| c.up = up).is_some();
        let backward = self.channel_mut(b, a).map(|c| c.up = up).is_some();
        if !forward && !backward {
            return Err(TopologyError::UnknownLink { from: a, to: b });
        }
        Ok(())
    }

    fn shortest_path_dag(&self, dest: NodeId) -> Result<&ShortestPathDag, TopologyError> {
        if self.weights.is_none() {
            return Err(TopologyError::StaleTopology);
        }
        self.dags
            .get(dest.inner())
            .ok_or(TopologyError::UnknownNode(dest))
    }
}
