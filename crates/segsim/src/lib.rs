//! `segsim` simulates segment-routed traffic. Given a topology with IGP weights, a load-balancing
//! policy and a set of flows routed over label paths, it computes the load on every link and
//! keeps it up to date as weights change, flows come and go and links fail.

#![warn(unreachable_pub, missing_docs)]

pub mod core;

pub mod impls;
