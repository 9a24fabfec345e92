//! Traffic in excess of link capacity.

use segsim_core::{CongestionMeasure, Matrix, Topology};

/// The share of the total demand that exceeds the capacity of the channel it is on, summed
/// over all channels. A network where every load fits its channel scores 0.
#[derive(Debug, Default, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct Overflow;

impl CongestionMeasure for Overflow {
    fn congestion(&self, topology: &dyn Topology, loads: &Matrix, demands: &Matrix) -> f64 {
        let total = demands.iter().filter(|&&d| d > 0.0).sum::<f64>();
        if total <= 0.0 {
            return 0.0;
        }
        let excess = topology
            .channels()
            .into_iter()
            .filter_map(|(from, to)| {
                let capacity = topology.bandwidth(from, to)?;
                let load = *loads.get([from.inner(), to.inner()])?;
                Some((load - capacity).max(0.0))
            })
            .sum::<f64>();
        excess / total
    }
}
