//! This crate contains load-balancing policies that penalize longer next hops.

#![warn(unreachable_pub, missing_debug_implementations, missing_docs)]

pub mod deft;
pub mod peft;

pub use deft::Deft;
pub use peft::Peft;

/// The weight of a downward channel whose cost exceeds the shortest path by `extra`.
pub(crate) fn penalty(p: f64, extra: f64) -> f64 {
    (-p * extra).exp()
}
