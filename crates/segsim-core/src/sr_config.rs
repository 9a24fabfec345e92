//! SR configurations: for every source node, the label paths it uses towards each destination.

use std::collections::BTreeMap;

use log::debug;
use ndarray::Array1;
use ndarray_stats::QuantileExt;

use crate::{
    constants::{EPSILON, LONG_LABEL_STACK},
    network::{Matrix, NodeId, Topology, TopologyError},
    segment::{LabelPath, Segment},
};

/// The label paths configured at one source node.
///
/// Fractions towards a destination are expected to sum to 1, but this is not enforced on
/// insertion. Callers that need the guarantee check [`SrNodeConfig::is_split_valid`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SrNodeConfig {
    node: NodeId,
    paths: BTreeMap<NodeId, Vec<LabelPath>>,
}

impl SrNodeConfig {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            paths: BTreeMap::new(),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn add_label_path(&mut self, path: LabelPath) -> Result<(), ConfigError> {
        if path.src() != self.node {
            return Err(ConfigError::EndpointMismatch {
                src: self.node,
                dst: path.dst(),
                path: path.to_string(),
            });
        }
        self.paths.entry(path.dst()).or_default().push(path);
        Ok(())
    }

    /// The label paths towards `dest`, in insertion order.
    pub fn paths_to(&self, dest: NodeId) -> &[LabelPath] {
        self.paths.get(&dest).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns true if the fractions of the paths towards `dest` sum to 1.
    pub fn is_split_valid(&self, dest: NodeId) -> bool {
        let total = self.paths_to(dest).iter().map(LabelPath::fraction).sum::<f64>();
        (total - 1.0).abs() <= EPSILON.sqrt()
    }

    pub fn destinations(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.paths.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabelPath> + '_ {
        self.paths.values().flatten()
    }

    /// The number of configured paths.
    pub fn len(&self) -> usize {
        self.paths.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Label-stack depth statistics over a whole configuration.
#[derive(Debug, Default, Clone, Copy, PartialEq, serde::Serialize)]
pub struct PathStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
    /// Paths with more than [`LONG_LABEL_STACK`] labels.
    pub nr_long: usize,
}

/// The SR configuration of a whole network.
#[derive(Debug, Default, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SrConfig {
    nodes: BTreeMap<NodeId, SrNodeConfig>,
}

impl SrConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `path` to the paths `src` uses towards `dst`.
    pub fn add_label_path(
        &mut self,
        src: NodeId,
        dst: NodeId,
        path: LabelPath,
    ) -> Result<(), ConfigError> {
        if path.src() != src || path.dst() != dst {
            return Err(ConfigError::EndpointMismatch {
                src,
                dst,
                path: path.to_string(),
            });
        }
        self.nodes
            .entry(src)
            .or_insert_with(|| SrNodeConfig::new(src))
            .add_label_path(path)
    }

    pub fn node_config(&self, src: NodeId) -> Option<&SrNodeConfig> {
        self.nodes.get(&src)
    }

    pub fn paths_to_destination(&self, src: NodeId, dst: NodeId) -> &[LabelPath] {
        self.nodes
            .get(&src)
            .map(|c| c.paths_to(dst))
            .unwrap_or(&[])
    }

    /// Iterates over `(src, dst, path)` triples, ordered by source then destination.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, NodeId, &LabelPath)> + '_ {
        self.nodes
            .values()
            .flat_map(|c| c.iter().map(move |p| (c.node(), p.dst(), p)))
    }

    /// The total number of configured paths.
    pub fn size(&self) -> usize {
        self.nodes.values().map(SrNodeConfig::len).sum()
    }

    /// Returns true if every configured split sums to 1.
    pub fn is_valid(&self) -> bool {
        self.nodes
            .values()
            .all(|c| c.destinations().all(|d| c.is_split_valid(d)))
    }

    pub fn statistics(&self) -> PathStats {
        let lengths = self
            .iter()
            .map(|(_, _, p)| p.len() as f64)
            .collect::<Array1<f64>>();
        if lengths.is_empty() {
            return PathStats::default();
        }
        PathStats {
            count: lengths.len(),
            min: lengths.min().copied().unwrap_or_default(),
            max: lengths.max().copied().unwrap_or_default(),
            mean: lengths.mean().unwrap_or_default(),
            std_dev: lengths.std(0.0),
            nr_long: lengths
                .iter()
                .filter(|&&l| l > LONG_LABEL_STACK as f64)
                .count(),
        }
    }

    /// Rewrites `demands` into the plain demands that shortest-path routing would have to carry
    /// to reproduce this configuration.
    ///
    /// Every segment of every path becomes a sub-demand of `fraction * demand`: a node segment
    /// from its start to its destination, an adjacency segment over its own link. The first
    /// down adjacency stops the scan of a path. With `edge_reroute`, the whole path is replaced
    /// by its raw `src -> dst` demand; otherwise the segments before the failure are kept and
    /// the rest of the demand goes from the failed link's head straight to `dst`.
    pub fn shortest_path_fallback_demands<T>(
        &self,
        demands: &Matrix,
        topology: &T,
        edge_reroute: bool,
    ) -> Result<Matrix, TopologyError>
    where
        T: Topology + ?Sized,
    {
        let n = topology.dimension();
        if demands.dim() != (n, n) {
            return Err(TopologyError::DimensionMismatch {
                expected: n,
                got: demands.dim(),
            });
        }
        let mut out = Matrix::zeros((n, n));
        for (src, dst, path) in self.iter() {
            let total = demands
                .get([src.inner(), dst.inner()])
                .ok_or(TopologyError::UnknownNode(src.max(dst)))?;
            let demand = path.fraction() * total;
            if demand == 0.0 {
                continue;
            }
            let mut parts = Vec::new();
            let mut cur = src;
            for segment in path.segments() {
                if let Segment::Adjacency { from, to } = *segment {
                    if !topology.is_up(from, to) {
                        debug!("{path} crosses failed link {from} -> {to}");
                        if edge_reroute {
                            parts.clear();
                            parts.push((src, dst));
                        } else {
                            parts.push((from, dst));
                        }
                        break;
                    }
                }
                parts.push((cur, segment.end()));
                cur = segment.end();
            }
            for (a, b) in parts.into_iter().filter(|(a, b)| a != b) {
                *out
                    .get_mut([a.inner(), b.inner()])
                    .ok_or(TopologyError::UnknownNode(a.max(b)))? += demand;
            }
        }
        Ok(out)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("path {path} does not run from {src} to {dst}")]
    EndpointMismatch {
        src: NodeId,
        dst: NodeId,
        path: String,
    },
}
