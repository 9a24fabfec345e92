//! Implementations of the core traits that live outside the core crate.

/// [Load balancers](crate::core::LoadBalancer) that penalize longer next hops.
pub mod balancing {
    pub use balancing_impls::*;
}

/// Additional [congestion measures](crate::core::CongestionMeasure).
pub mod congestion {
    pub use congestion_impls::*;
}
