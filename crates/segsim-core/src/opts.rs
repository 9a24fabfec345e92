//! This module defines the [`SimOpts`] configuration which describes how the simulator builds
//! and repairs routes.

use crate::planning::{ShortestPathPlanner, SrPlanner};

/// Simulator options.
///
/// The recovery policy is not part of these options: it is read anew at every link failure.
#[derive(Debug, typed_builder::TypedBuilder)]
pub struct SimOpts {
    /// The deepest label stack the translator may produce. Deeper stacks fall back to the
    /// shortest path.
    #[builder(default, setter(strip_option))]
    pub max_labels: Option<usize>,
    /// Planner used for global re-optimization.
    #[builder(default = Box::new(ShortestPathPlanner))]
    pub planner: Box<dyn SrPlanner + Send + Sync>,
}

impl Default for SimOpts {
    fn default() -> Self {
        Self::builder().build()
    }
}
