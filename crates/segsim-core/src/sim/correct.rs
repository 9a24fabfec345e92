//! Path validation and repair after link failures.

use parking_lot::RwLock;

use crate::{
    flow::{Flow, FlowClass},
    network::{NodeId, Topology},
    segment::{LabelPath, Segment},
};

/// How flows crossing a failed link are repaired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum RecoveryPolicy {
    /// Cut the path at the failed link and forward from there over shortest paths.
    TiLfa,
    /// Replace the whole path with the shortest path from source to destination.
    EdgeToEdge,
    /// Plan a new SR configuration for the whole network.
    GlobalReoptimization,
}

/// A source of the active recovery policy. The simulator asks for the policy at every link
/// failure, so the answer may change between failures.
pub trait RecoveryConfig {
    fn policy(&self) -> Option<RecoveryPolicy>;
}

impl RecoveryConfig for RecoveryPolicy {
    fn policy(&self) -> Option<RecoveryPolicy> {
        Some(*self)
    }
}

impl<F> RecoveryConfig for F
where
    F: Fn() -> Option<RecoveryPolicy>,
{
    fn policy(&self) -> Option<RecoveryPolicy> {
        self()
    }
}

/// A recovery policy that can be changed while a simulator is running.
#[derive(Debug, Default)]
pub struct RecoverySetting {
    inner: RwLock<Option<RecoveryPolicy>>,
}

impl RecoverySetting {
    pub fn new(policy: Option<RecoveryPolicy>) -> Self {
        Self {
            inner: RwLock::new(policy),
        }
    }

    pub fn set(&self, policy: Option<RecoveryPolicy>) {
        *self.inner.write() = policy;
    }
}

impl RecoveryConfig for RecoverySetting {
    fn policy(&self) -> Option<RecoveryPolicy> {
        *self.inner.read()
    }
}

/// A repaired path together with the class its flow now belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Correction {
    pub path: LabelPath,
    pub class: FlowClass,
}

/// Returns true if every adjacency segment of `path` is over a link that is up.
pub fn validate_path<T>(topology: &T, path: &LabelPath) -> bool
where
    T: Topology + ?Sized,
{
    path.adjacencies().all(|(from, to)| topology.is_up(from, to))
}

/// Repairs the first adjacency segment of `path` that crosses a down link.
///
/// Node segments are never touched: they follow whatever the current DAGs say. A path without
/// failed adjacencies is returned as it is, with the flow's class unchanged.
pub fn correct_path<T>(
    topology: &T,
    flow: &Flow,
    path: &LabelPath,
    policy: Option<RecoveryPolicy>,
) -> Result<Correction, CorrectionError>
where
    T: Topology + ?Sized,
{
    let failure = path
        .segments()
        .iter()
        .enumerate()
        .find_map(|(i, segment)| match *segment {
            Segment::Adjacency { from, to } if !topology.is_up(from, to) => Some((i, from, to)),
            _ => None,
        });
    let Some((i, from, to)) = failure else {
        return Ok(Correction {
            path: path.clone(),
            class: flow.class,
        });
    };
    match policy {
        Some(RecoveryPolicy::TiLfa) => {
            let mut segments = path.segments()[..i].to_vec();
            segments.push(Segment::node(path.dst()));
            Ok(Correction {
                path: path.with_segments(segments),
                class: FlowClass::TiLfa,
            })
        }
        Some(RecoveryPolicy::EdgeToEdge) => Ok(Correction {
            path: LabelPath::shortest(path.src(), path.dst(), path.fraction()),
            class: FlowClass::E2e,
        }),
        // Global re-optimization replaces whole configurations, not single paths
        Some(RecoveryPolicy::GlobalReoptimization) | None => {
            Err(CorrectionError::Uncorrectable { from, to })
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CorrectionError {
    #[error("link {from} -> {to} is down and no recovery policy repairs it")]
    Uncorrectable { from: NodeId, to: NodeId },
}
