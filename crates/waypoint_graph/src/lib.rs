//! Scenario graph engine for Waypoint.
//!
//! `waypoint_graph` decides, from live external signals, when a training
//! procedure may advance from one step to the next. A procedure is a
//! directed graph of steps joined by three kinds of edges, evaluated by a
//! [`GraphController`] after every external poke.
//!
//! # Core Concepts
//!
//! - [`GraphData`] - Typed, optionally type-locked value with comparison rules
//! - [`Vertex`] - A step carrying a value and enter/leave callbacks
//! - [`Edge`] - Traversable, reliant, and data-check connections
//! - [`Graph`] - The multigraph container with reachability and path queries
//! - [`TaskableRegistry`] - Binding of user-task steps to externally owned objects
//! - [`GraphController`] - The traversal and evaluation engine
//! - [`ScenarioSession`] - A controller attached to its registry
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use waypoint_graph::prelude::*;
//!
//! let mut graph = Graph::with_allocator(IdAllocator::new());
//! let brief = graph.add_vertex("brief", GraphData::empty());
//! let master = graph.add_vertex("master switch", GraphData::empty());
//! let done = graph.add_vertex("done", GraphData::empty());
//! graph.add_traversable(brief, master, GraphData::always())?;
//! graph.add_traversable(master, done, GraphData::button("battery"))?;
//!
//! let mut controller = GraphController::new(graph, brief, done, Arc::new(TaskableRegistry::new()))?;
//! controller.start()?;
//! assert_eq!(controller.current(), Some(master));
//! assert!(controller.press_button("battery")?.finished);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Graph values, special cases, and comparison.
pub mod data;

/// Vertex types and callback lists.
pub mod vertex;

/// Edge types.
pub mod edge;

/// Graph structure and authoring API.
pub mod graph;

/// Live data binding to externally owned objects.
pub mod taskable;

/// Scenario traversal engine.
pub mod controller;

/// Observation hooks.
pub mod hooks;

/// Registry-wired scenario sessions.
pub mod session;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::controller::{ControllerConfig, ControllerError, GraphController, Progress};
    pub use crate::data::{
        DataType, GraphData, ObjectRef, ObjectType, SpecialCase, Value, button_value, compare,
    };
    pub use crate::edge::{
        DataCheckEdge, DepthBudget, Edge, EdgeId, EdgeKind, ReliantEdge, ReliantOptions,
        TraversableEdge,
    };
    pub use crate::graph::{Graph, GraphError, IdAllocator, ValidationError, reset_vertex_ids};
    pub use crate::hooks::{EventKind, GraphEvent, HookRegistrationError, HooksAPI};
    pub use crate::session::ScenarioSession;
    pub use crate::taskable::{
        PokeListener, RegistryError, Taskable, TaskableRegistry, TaskableType,
    };
    pub use crate::vertex::{CallbackId, TaskState, UserTask, Vertex, VertexId, VertexKind};
}

pub use controller::{ControllerConfig, ControllerError, GraphController, Progress};
pub use data::{DataType, GraphData, SpecialCase, Value};
pub use edge::{Edge, EdgeId, EdgeKind, ReliantOptions};
pub use graph::{Graph, IdAllocator, ValidationError};
pub use session::ScenarioSession;
pub use taskable::{Taskable, TaskableRegistry};
pub use vertex::{Vertex, VertexId};
