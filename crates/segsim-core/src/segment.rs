//! Segment-routing instructions and the label paths built from them.

use std::fmt;

use crate::network::NodeId;

/// A single SR instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Segment {
    /// Forward over the current shortest paths to `dst`.
    Node { dst: NodeId },
    /// Traverse the link `from -> to` next.
    Adjacency { from: NodeId, to: NodeId },
}

impl Segment {
    pub fn node(dst: NodeId) -> Self {
        Self::Node { dst }
    }

    pub fn adjacency(from: NodeId, to: NodeId) -> Self {
        Self::Adjacency { from, to }
    }

    /// Where traffic is once this segment has been executed.
    pub fn end(&self) -> NodeId {
        match *self {
            Segment::Node { dst } => dst,
            Segment::Adjacency { to, .. } => to,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Node { dst } => write!(f, "N({dst})"),
            Segment::Adjacency { from, to } => write!(f, "A({from}->{to})"),
        }
    }
}

/// An ordered label stack from `src` to `dst` carrying `fraction` of the demand between them.
///
/// A label path is contiguous when executing its segments in order walks from `src` to `dst`:
/// node segments jump to their destination, and adjacency segments must start where the
/// previous segment ended.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LabelPath {
    src: NodeId,
    dst: NodeId,
    fraction: f64,
    segments: Vec<Segment>,
}

impl LabelPath {
    pub fn new(src: NodeId, dst: NodeId, fraction: f64, segments: Vec<Segment>) -> Self {
        Self {
            src,
            dst,
            fraction,
            segments,
        }
    }

    /// The plain shortest-path route: a single node segment to `dst`, or no segment at all if
    /// `src == dst`.
    pub fn shortest(src: NodeId, dst: NodeId, fraction: f64) -> Self {
        let segments = if src == dst {
            Vec::new()
        } else {
            vec![Segment::node(dst)]
        };
        Self::new(src, dst, fraction, segments)
    }

    pub fn src(&self) -> NodeId {
        self.src
    }

    pub fn dst(&self) -> NodeId {
        self.dst
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns the same path carrying a different share of the demand.
    pub fn with_fraction(mut self, fraction: f64) -> Self {
        self.fraction = fraction;
        self
    }

    /// Returns the same endpoints and fraction with a new segment list.
    pub fn with_segments(&self, segments: Vec<Segment>) -> Self {
        Self::new(self.src, self.dst, self.fraction, segments)
    }

    /// Returns true if the segments form a walk from `src` to `dst`.
    pub fn is_contiguous(&self) -> bool {
        let mut cur = self.src;
        for segment in &self.segments {
            if let Segment::Adjacency { from, .. } = *segment {
                if from != cur {
                    return false;
                }
            }
            cur = segment.end();
        }
        cur == self.dst
    }

    /// Iterates over adjacency segments as `(from, to)` links.
    pub fn adjacencies(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.segments.iter().filter_map(|s| match *s {
            Segment::Adjacency { from, to } => Some((from, to)),
            Segment::Node { .. } => None,
        })
    }

    delegate::delegate! {
        to self.segments {
            /// The label-stack depth.
            pub fn len(&self) -> usize;

            pub fn is_empty(&self) -> bool;
        }
    }
}

impl fmt::Display for LabelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} [", self.src, self.dst)?;
        for (i, s) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{s}")?;
        }
        write!(f, "] x{}", self.fraction)
    }
}
