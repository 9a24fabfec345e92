//! SR planners build whole SR configurations from a demand matrix. The simulator calls one when
//! a link failure is handled by global re-optimization.

use std::fmt;

use log::warn;

use crate::{
    network::{Matrix, NodeId, Topology, TopologyError},
    segment::LabelPath,
    sr_config::{ConfigError, SrConfig},
};

/// The trait that must be implemented by all SR planners.
pub trait SrPlanner: fmt::Debug {
    /// Given a topology with weights applied and a demand matrix, produce an SR configuration
    /// covering every positive demand.
    fn plan(&self, topology: &dyn Topology, demands: &Matrix) -> Result<SrConfig, PlanError>;
}

/// A planner that routes every demand over plain shortest paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShortestPathPlanner;

impl SrPlanner for ShortestPathPlanner {
    fn plan(&self, topology: &dyn Topology, demands: &Matrix) -> Result<SrConfig, PlanError> {
        let n = topology.dimension();
        if demands.dim() != (n, n) {
            return Err(TopologyError::DimensionMismatch {
                expected: n,
                got: demands.dim(),
            }
            .into());
        }
        let mut config = SrConfig::new();
        for ((s, t), &demand) in demands.indexed_iter() {
            if s == t || demand <= 0.0 {
                continue;
            }
            let (src, dst) = (NodeId::new(s), NodeId::new(t));
            if !topology.shortest_path_dag(dst)?.is_reachable(src) {
                warn!("No route from {src} to {dst}, leaving {demand} unplanned");
                continue;
            }
            config.add_label_path(src, dst, LabelPath::shortest(src, dst, 1.0))?;
        }
        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("cannot plan on topology")]
    Topology(#[from] TopologyError),

    #[error("planner produced an invalid configuration")]
    Config(#[from] ConfigError),
}
