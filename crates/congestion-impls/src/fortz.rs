//! The Fortz-Thorup link cost.

use log::debug;
use petgraph::{
    algo,
    graph::{DiGraph, NodeIndex},
};
use segsim_core::{CongestionMeasure, Matrix, Topology};

// Slopes and intercepts (as multiples of capacity) of the linear pieces of the link cost
const SLOPES: [f64; 6] = [1.0, 3.0, 10.0, 70.0, 500.0, 5000.0];
const INTERCEPTS: [f64; 6] = [
    0.0,
    2.0 / 3.0,
    16.0 / 3.0,
    178.0 / 3.0,
    1468.0 / 3.0,
    16318.0 / 3.0,
];

/// The sum over all channels of the Fortz-Thorup cost of the channel's load. The cost is convex
/// and piecewise linear, with slopes 1, 3, 10, 70, 500 and 5000 starting at utilizations 0, 1/3,
/// 2/3, 9/10, 1 and 11/10.
#[derive(
    Debug, Default, Clone, Copy, typed_builder::TypedBuilder, serde::Serialize, serde::Deserialize,
)]
pub struct FortzThorup {
    /// Divide by the cost every demand would have if it crossed its minimum-hop path at unit
    /// cost per hop.
    #[builder(default)]
    pub normalized: bool,
}

/// The Fortz-Thorup cost of carrying `load` over a channel of capacity `capacity`.
pub fn link_cost(load: f64, capacity: f64) -> f64 {
    SLOPES
        .iter()
        .zip(INTERCEPTS)
        .map(|(&slope, intercept)| slope * load - intercept * capacity)
        .fold(0.0, f64::max)
}

impl CongestionMeasure for FortzThorup {
    fn congestion(&self, topology: &dyn Topology, loads: &Matrix, demands: &Matrix) -> f64 {
        let cost = topology
            .channels()
            .into_iter()
            .filter_map(|(from, to)| {
                let capacity = topology.bandwidth(from, to)?;
                let load = *loads.get([from.inner(), to.inner()])?;
                (capacity > 0.0).then(|| link_cost(load, capacity))
            })
            .sum::<f64>();
        if !self.normalized {
            return cost;
        }
        let uncapacitated = uncapacitated_cost(topology, demands);
        if uncapacitated <= 0.0 {
            return 0.0;
        }
        cost / uncapacitated
    }
}

// Sum of demand times minimum hop count over up channels. Unreachable demands add nothing.
fn uncapacitated_cost(topology: &dyn Topology, demands: &Matrix) -> f64 {
    let n = topology.dimension();
    let mut g = DiGraph::<(), ()>::new();
    for _ in 0..n {
        g.add_node(());
    }
    for (from, to) in topology.channels() {
        if topology.is_up(from, to) {
            g.add_edge(NodeIndex::new(from.inner()), NodeIndex::new(to.inner()), ());
        }
    }
    let mut total = 0.0;
    for (s, row) in demands.outer_iter().enumerate().take(n) {
        if row.iter().all(|&d| d <= 0.0) {
            continue;
        }
        let hops = algo::dijkstra(&g, NodeIndex::new(s), None, |_| 1usize);
        for (t, &demand) in row.iter().enumerate().filter(|&(_, &d)| d > 0.0) {
            match hops.get(&NodeIndex::new(t)) {
                Some(&h) => total += demand * h as f64,
                None => debug!("Fortz-Thorup: no path from {s} to {t}, ignoring {demand}"),
            }
        }
    }
    total
}
