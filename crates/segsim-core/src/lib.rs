#![warn(unreachable_pub, missing_debug_implementations)]

//! The core segment-routing simulator. This crate defines the [`Simulator`], which routes
//! flows over [label paths](LabelPath) on a [`Topology`] and tracks the link loads they
//! produce, together with the traits for the pluggable pieces: [load
//! balancers](LoadBalancer), [congestion measures](CongestionMeasure) and [SR
//! planners](SrPlanner).

#[macro_use]
mod ident;

mod balance;
mod congestion;
mod distribute;
mod flow;
mod opts;
mod planning;
mod segment;
mod sim;
mod sr_config;
mod translate;

pub mod constants;
pub mod network;

#[doc(hidden)]
pub mod testing;

pub use balance::{BalanceError, Ecmp, LoadBalancer, PValues, SplitRatios};
pub use congestion::{max_utilization, CongestionMeasure, MaxUtilization};
pub use distribute::{distribute, DistributeError, LoadDelta};
pub use flow::{Flow, FlowClass, FlowId};
pub use network::{
    DagEdge, Link, Matrix, Network, Node, NodeId, ShortestPathDag, Topology, TopologyError,
};
pub use opts::SimOpts;
pub use planning::{PlanError, ShortestPathPlanner, SrPlanner};
pub use segment::{LabelPath, Segment};
pub use sim::{
    correct_path, validate_path, Correction, CorrectionError, Error, FailureReport,
    RecoveryConfig, RecoveryPolicy, RecoverySetting, Route, Simulator,
};
pub use sr_config::{ConfigError, PathStats, SrConfig, SrNodeConfig};
pub use translate::{PathTranslator, TranslateError};
