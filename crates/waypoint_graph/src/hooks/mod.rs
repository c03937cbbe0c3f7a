//! Observation hooks for scenario controllers.
//!
//! Observers are registered by name on a controller's [`HooksAPI`] and
//! receive every [`GraphEvent`] it raises, in registration order.
//!
//! - **Events** ([`events`]): the `GraphEvent` enum and its `EventKind` filter
//! - **API** ([`api`]): registration and invocation
//!
//! # Example
//!
//! ```
//! use waypoint_graph::hooks::{GraphEvent, HooksAPI};
//!
//! let hooks = HooksAPI::new();
//! hooks.register_observer("progress", |event: &GraphEvent| {
//!     if let GraphEvent::CurrentVertexChanged { to, .. } = event {
//!         tracing::debug!(vertex = %to, "advanced");
//!     }
//! })?;
//! # Ok::<(), waypoint_graph::hooks::HookRegistrationError>(())
//! ```

pub mod api;
pub mod events;

pub use api::{HookRegistrationError, HooksAPI};
pub use events::{EventKind, GraphEvent};
