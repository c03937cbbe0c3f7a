//! # Waypoint Internal Library
//!
//! Re-exports the core waypoint crates for convenience.

/// The scenario graph engine.
pub use waypoint_graph;

/// Logging setup.
pub use waypoint_tracing;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use waypoint_graph::prelude::*;
    pub use waypoint_tracing::{TracingConfig, TracingFormat};
}
