//! Core segsim data structures, traits, and routines. The most common entry point is the
//! [`Simulator`], which routes [flows](Flow) over [label paths](LabelPath).

pub use segsim_core::*;
