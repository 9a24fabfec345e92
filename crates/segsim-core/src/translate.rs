//! Conversion between explicit node paths and compressed label paths.

use itertools::Itertools;
use log::debug;

use crate::{
    network::{NodeId, Topology, TopologyError},
    segment::{LabelPath, Segment},
};

/// Translates paths against the shortest-path DAGs of a topology. The topology must have
/// weights applied; otherwise every translation fails with [`TopologyError::StaleTopology`].
#[derive(Debug, derive_new::new)]
pub struct PathTranslator<'a, T: ?Sized> {
    topology: &'a T,
}

impl<'a, T> PathTranslator<'a, T>
where
    T: Topology + ?Sized,
{
    /// Compresses a node path into the shortest label stack that reproduces it.
    ///
    /// The path is scanned right to left. Starting from the current run end `t`, the run is
    /// extended backwards for as long as each hop lies on the shortest-path DAG rooted at `t`.
    /// A run of at least one hop becomes a node segment to `t`; a hop that is not on the DAG
    /// becomes an adjacency segment. The run end then moves to the start of what was emitted.
    pub fn translate(&self, nodes: &[NodeId]) -> Result<LabelPath, TranslateError> {
        let (&src, &dst) = match (nodes.first(), nodes.last()) {
            (Some(src), Some(dst)) => (src, dst),
            _ => return Err(TranslateError::EmptyPath),
        };
        for (&from, &to) in nodes.iter().tuple_windows() {
            if !self.topology.edge_exists(from, to) {
                return Err(TopologyError::UnknownLink { from, to }.into());
            }
        }

        let mut segments = Vec::new();
        let mut t = nodes.len() - 1;
        while t > 0 {
            let dag = self.topology.shortest_path_dag(nodes[t])?;
            // `start` is the first node of the run ending at `t`
            let mut start = t;
            while start > 0 && dag.is_on_shortest_path(nodes[start - 1], nodes[start]) {
                start -= 1;
            }
            if start < t {
                segments.push(Segment::node(nodes[t]));
                t = start;
            } else {
                segments.push(Segment::adjacency(nodes[t - 1], nodes[t]));
                t -= 1;
            }
        }
        segments.reverse();
        Ok(LabelPath::new(src, dst, 1.0, segments))
    }

    /// Like [`PathTranslator::translate`], but falls back to a plain shortest-path label path
    /// whenever the compressed stack would need more than `max_labels` labels.
    pub fn translate_bounded(
        &self,
        nodes: &[NodeId],
        max_labels: usize,
    ) -> Result<LabelPath, TranslateError> {
        let path = self.translate(nodes)?;
        if path.len() > max_labels {
            debug!(
                "{} needs {} labels (max {max_labels}), using shortest path",
                path,
                path.len()
            );
            return Ok(LabelPath::shortest(path.src(), path.dst(), path.fraction()));
        }
        Ok(path)
    }

    /// Expands a label path into every node path it may take. Adjacency segments add one hop;
    /// node segments branch over all equal-cost shortest paths to their destination.
    pub fn expand(&self, path: &LabelPath) -> Result<Vec<Vec<NodeId>>, TranslateError> {
        let mut candidates = vec![vec![path.src()]];
        let mut cur = path.src();
        for segment in path.segments() {
            match *segment {
                Segment::Adjacency { to, .. } => {
                    for candidate in &mut candidates {
                        candidate.push(to);
                    }
                }
                Segment::Node { dst } => {
                    if cur == dst {
                        continue;
                    }
                    let dag = self.topology.shortest_path_dag(dst)?;
                    let tails = dag.shortest_paths(cur);
                    if tails.is_empty() {
                        return Err(TranslateError::Unreachable { from: cur, to: dst });
                    }
                    candidates = candidates
                        .iter()
                        .cartesian_product(&tails)
                        .map(|(prefix, tail)| {
                            // The tail starts where the prefix ends
                            prefix.iter().chain(&tail[1..]).copied().collect()
                        })
                        .collect();
                }
            }
            cur = segment.end();
        }
        Ok(candidates.into_iter().unique().collect())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("cannot translate an empty path")]
    EmptyPath,

    #[error("node {from} cannot reach {to}")]
    Unreachable { from: NodeId, to: NodeId },

    #[error("cannot resolve path")]
    Topology(#[from] TopologyError),
}
