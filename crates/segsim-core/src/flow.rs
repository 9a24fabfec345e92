use std::fmt;

use crate::network::NodeId;

identifier!(FlowId, usize);

/// Why a flow is routed the way it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FlowClass {
    /// Added by a user with an explicit or default path.
    User,
    /// Synthesized from an SR configuration (load-balance correction).
    Salp,
    /// Patched locally at the point of failure.
    TiLfa,
    /// Rerouted edge-to-edge over the shortest path after a failure.
    E2e,
}

impl fmt::Display for FlowClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowClass::User => "USER",
            FlowClass::Salp => "SALP",
            FlowClass::TiLfa => "TI-LFA",
            FlowClass::E2e => "E2E",
        };
        f.write_str(name)
    }
}

/// A single traffic instance. Flows are identified by their [`FlowId`] alone, so two flows with
/// the same endpoints and class are still distinct.
#[derive(Debug, Clone, Copy, PartialEq, derive_new::new, serde::Serialize, serde::Deserialize)]
pub struct Flow {
    pub id: FlowId,
    pub src: NodeId,
    pub dst: NodeId,
    /// Bandwidth carried by this flow.
    pub demand: f64,
    /// Share of the `(src, dst)` demand this flow represents.
    pub fraction: f64,
    pub class: FlowClass,
}
