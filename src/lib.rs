//! A scenario graph engine for procedural training simulators.
//!

pub use waypoint_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use waypoint_internal::prelude::*;
}
