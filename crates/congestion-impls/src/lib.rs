//! This crate contains implementations of the
//! [`CongestionMeasure`](segsim_core::CongestionMeasure) trait beyond the maximum link
//! utilization shipped with the core.

#![warn(unreachable_pub, missing_debug_implementations, missing_docs)]

pub mod fortz;
pub mod overflow;

pub use crate::fortz::FortzThorup;
pub use crate::overflow::Overflow;
