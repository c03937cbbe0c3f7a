//! Unified event enum for scenario hooks.
//!
//! All observers receive `&GraphEvent` and match on variants for typed access.
//!
//! # Example
//!
//! ```
//! use waypoint_graph::hooks::GraphEvent;
//!
//! fn handle_event(event: &GraphEvent) {
//!     match event {
//!         GraphEvent::CurrentVertexChanged { to, .. } => println!("now at {to}"),
//!         GraphEvent::GraphEnded { .. } => println!("procedure complete"),
//!         _ => {}
//!     }
//! }
//! ```

use core::fmt;

use crate::edge::EdgeId;
use crate::vertex::VertexId;

/// Discriminant of a [`GraphEvent`], used to filter observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// See [`GraphEvent::GraphStarted`].
    GraphStarted,
    /// See [`GraphEvent::CurrentVertexChanged`].
    CurrentVertexChanged,
    /// See [`GraphEvent::VertexCompletionChanged`].
    VertexCompletionChanged,
    /// See [`GraphEvent::GraphEnded`].
    GraphEnded,
    /// See [`GraphEvent::ProgressBlocked`].
    ProgressBlocked,
}

/// Events raised by a [`GraphController`](crate::controller::GraphController).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphEvent {
    /// The start vertex became current.
    GraphStarted {
        /// The start vertex.
        start: VertexId,
    },

    /// A traversable edge was taken.
    CurrentVertexChanged {
        /// The vertex left.
        from: VertexId,
        /// The new current vertex.
        to: VertexId,
        /// The edge taken.
        edge: EdgeId,
    },

    /// A reliant check flipped the completion state of a side-branch vertex.
    VertexCompletionChanged {
        /// The side-branch vertex.
        vertex: VertexId,
        /// The new completion state.
        complete: bool,
    },

    /// The end vertex became current.
    GraphEnded {
        /// The end vertex.
        end: VertexId,
    },

    /// A poke left the controller on the same vertex.
    ProgressBlocked {
        /// The current vertex.
        vertex: VertexId,
    },
}

impl GraphEvent {
    /// Returns the discriminant of this event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            GraphEvent::GraphStarted { .. } => EventKind::GraphStarted,
            GraphEvent::CurrentVertexChanged { .. } => EventKind::CurrentVertexChanged,
            GraphEvent::VertexCompletionChanged { .. } => EventKind::VertexCompletionChanged,
            GraphEvent::GraphEnded { .. } => EventKind::GraphEnded,
            GraphEvent::ProgressBlocked { .. } => EventKind::ProgressBlocked,
        }
    }

    /// Returns the event name, e.g. `"GraphStarted"`.
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            GraphEvent::GraphStarted { .. } => "GraphStarted",
            GraphEvent::CurrentVertexChanged { .. } => "CurrentVertexChanged",
            GraphEvent::VertexCompletionChanged { .. } => "VertexCompletionChanged",
            GraphEvent::GraphEnded { .. } => "GraphEnded",
            GraphEvent::ProgressBlocked { .. } => "ProgressBlocked",
        }
    }

    /// Returns the vertex the event is about.
    ///
    /// For [`GraphEvent::CurrentVertexChanged`] this is the new current vertex.
    #[must_use]
    pub fn vertex_id(&self) -> VertexId {
        match self {
            GraphEvent::GraphStarted { start } => *start,
            GraphEvent::CurrentVertexChanged { to, .. } => *to,
            GraphEvent::VertexCompletionChanged { vertex, .. }
            | GraphEvent::ProgressBlocked { vertex } => *vertex,
            GraphEvent::GraphEnded { end } => *end,
        }
    }
}

impl fmt::Display for GraphEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphEvent::GraphStarted { start } => write!(f, "GraphStarted({start})"),
            GraphEvent::CurrentVertexChanged { from, to, edge } => {
                write!(f, "CurrentVertexChanged({from} -> {to} via {edge})")
            }
            GraphEvent::VertexCompletionChanged { vertex, complete } => {
                write!(f, "VertexCompletionChanged({vertex}, complete: {complete})")
            }
            GraphEvent::GraphEnded { end } => write!(f, "GraphEnded({end})"),
            GraphEvent::ProgressBlocked { vertex } => write!(f, "ProgressBlocked({vertex})"),
        }
    }
}
