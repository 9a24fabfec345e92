//! Numerical constants shared by the simulator.

/// Tolerance used when comparing path costs, split sums and loads.
pub const EPSILON: f64 = 1e-9;

/// Label stacks longer than this are counted as long in path statistics.
pub const LONG_LABEL_STACK: usize = 3;
