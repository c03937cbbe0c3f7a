//! Scenario traversal engine.
//!
//! The [`GraphController`] owns the current vertex of a running scenario and
//! decides, after every external [`poke`](GraphController::poke), whether the
//! procedure may advance:
//!
//! 1. Data-check edges of the current vertex run, cascading through their
//!    targets and copying derived values back.
//! 2. Every reliant edge must be satisfied. Reliant checks recurse through
//!    side-branches with a bounded look-ahead.
//! 3. The first traversable edge (in insertion order) whose condition matches
//!    the current value is taken, and progression repeats from the new vertex.
//!
//! All recursion is bounded by [`ControllerConfig`]; a graph that would
//! recurse or chain transitions past those limits yields an error instead.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use waypoint_graph::prelude::*;
//!
//! let mut graph = Graph::with_allocator(IdAllocator::new());
//! let a = graph.add_vertex("a", GraphData::empty());
//! let b = graph.add_vertex("b", GraphData::locked(DataType::Int));
//! let c = graph.add_vertex("c", GraphData::empty());
//! graph.add_traversable(a, b, GraphData::always())?;
//! graph.add_traversable(b, c, GraphData::new(1))?;
//!
//! let mut controller = GraphController::new(graph, a, c, Arc::new(TaskableRegistry::new()))?;
//! controller.start()?;
//! assert_eq!(controller.current(), Some(b));
//!
//! let progress = controller.poke(1)?;
//! assert!(progress.finished);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::sync::Arc;

use hashbrown::HashSet;
use thiserror::Error;

use crate::data::{GraphData, Value, button_value, compare};
use crate::edge::{Edge, EdgeId, EdgeKind, ReliantEdge};
use crate::graph::{Graph, GraphError, ValidationError};
use crate::hooks::{GraphEvent, HooksAPI};
use crate::taskable::{RegistryError, TaskableRegistry};
use crate::vertex::{Vertex, VertexId};

// ─────────────────────────────────────────────────────────────────────────────
// Errors and results
// ─────────────────────────────────────────────────────────────────────────────

/// Structural errors raised while driving a scenario.
///
/// Unsatisfied conditions are never errors; they simply block progression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    /// A referenced vertex is not in the graph.
    #[error("vertex not found: {0}")]
    VertexNotFound(VertexId),
    /// The operation needs a running scenario.
    #[error("controller has not been started")]
    NotStarted,
    /// Data-check or reliant evaluation nested too deeply.
    #[error("recursion limit exceeded: depth {depth} exceeds max {max}")]
    RecursionLimitExceeded {
        /// The depth reached.
        depth: usize,
        /// The maximum allowed depth.
        max: usize,
    },
    /// A single progression took too many automatic transitions.
    #[error("more than {max} chained transitions, stopped at {vertex}")]
    TransitionLimitExceeded {
        /// The vertex where progression stopped.
        vertex: VertexId,
        /// The maximum allowed transitions.
        max: usize,
    },
    /// The graph cannot be run between the requested endpoints.
    #[error("invalid graph ({} problem(s))", .0.len())]
    InvalidGraph(Vec<ValidationError>),
    /// Graph mutation failed.
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// Registry wiring failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Summary of one progression attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Number of traversable edges taken.
    pub transitions: usize,
    /// Whether the end vertex is now current.
    pub finished: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Limits and start-up options for a [`GraphController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    max_recursion_depth: usize,
    max_chained_transitions: usize,
    save_point: Option<VertexId>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_recursion_depth: Self::DEFAULT_MAX_RECURSION_DEPTH,
            max_chained_transitions: Self::DEFAULT_MAX_CHAINED_TRANSITIONS,
            save_point: None,
        }
    }
}

impl ControllerConfig {
    /// Default maximum depth of nested data-check and reliant evaluation.
    pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 64;
    /// Default maximum number of automatic transitions per progression.
    pub const DEFAULT_MAX_CHAINED_TRANSITIONS: usize = 1024;

    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum nesting depth of data-check and reliant evaluation.
    #[must_use]
    pub fn with_max_recursion_depth(mut self, max: usize) -> Self {
        self.max_recursion_depth = max;
        self
    }

    /// Sets the maximum number of transitions one progression may take.
    #[must_use]
    pub fn with_max_chained_transitions(mut self, max: usize) -> Self {
        self.max_chained_transitions = max;
        self
    }

    /// Fast-forwards to one vertex past `vertex` when the scenario starts.
    #[must_use]
    pub fn with_save_point(mut self, vertex: VertexId) -> Self {
        self.save_point = Some(vertex);
        self
    }

    /// Returns the maximum recursion depth.
    #[must_use]
    pub fn max_recursion_depth(&self) -> usize {
        self.max_recursion_depth
    }

    /// Returns the maximum number of chained transitions.
    #[must_use]
    pub fn max_chained_transitions(&self) -> usize {
        self.max_chained_transitions
    }

    /// Returns the save point, if any.
    #[must_use]
    pub fn save_point(&self) -> Option<VertexId> {
        self.save_point
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GraphController
// ─────────────────────────────────────────────────────────────────────────────

/// Drives one scenario graph from its start vertex to its end vertex.
#[derive(Debug)]
pub struct GraphController {
    graph: Graph,
    start: VertexId,
    end: VertexId,
    current: Option<VertexId>,
    registry: Arc<TaskableRegistry>,
    /// Complete-once reliant edges already satisfied at the current vertex.
    completed: HashSet<EdgeId>,
    paused: bool,
    finished: bool,
    config: ControllerConfig,
    hooks: HooksAPI,
}

impl GraphController {
    /// Creates a controller for `graph`, running from `start` to `end`.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::InvalidGraph`] if [`Graph::validate`] fails.
    pub fn new(
        graph: Graph,
        start: VertexId,
        end: VertexId,
        registry: Arc<TaskableRegistry>,
    ) -> Result<Self, ControllerError> {
        graph
            .validate(start, end)
            .map_err(ControllerError::InvalidGraph)?;
        Ok(Self {
            graph,
            start,
            end,
            current: None,
            registry,
            completed: HashSet::new(),
            paused: false,
            finished: false,
            config: ControllerConfig::default(),
            hooks: HooksAPI::new(),
        })
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Returns the observer registry.
    #[must_use]
    pub fn hooks(&self) -> &HooksAPI {
        &self.hooks
    }

    /// Returns the taskable registry user tasks pull from.
    #[must_use]
    pub fn registry(&self) -> &Arc<TaskableRegistry> {
        &self.registry
    }

    /// Returns the graph.
    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Returns the graph mutably, e.g. to subscribe vertex callbacks.
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// Returns the current vertex, or `None` before [`start`](Self::start).
    #[must_use]
    pub fn current(&self) -> Option<VertexId> {
        self.current
    }

    /// Returns the start vertex.
    #[must_use]
    pub fn start_vertex(&self) -> VertexId {
        self.start
    }

    /// Returns the end vertex.
    #[must_use]
    pub fn end_vertex(&self) -> VertexId {
        self.end
    }

    /// Returns `true` while paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Returns `true` once the end vertex has been reached.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Driving
    // ─────────────────────────────────────────────────────────────────────────

    /// Enters the start vertex and advances as far as possible.
    ///
    /// If the configuration names a save point, the graph is first rewired
    /// to skip past it (see [`fast_forward_to`](Self::fast_forward_to)).
    ///
    /// # Errors
    ///
    /// Returns an error if evaluation exceeds a configured limit.
    pub fn start(&mut self) -> Result<Progress, ControllerError> {
        let start = self.start;
        self.completed.clear();
        self.paused = false;
        self.finished = false;

        let registry = Arc::clone(&self.registry);
        let vertex = self.vertex_mut(start)?;
        vertex.refresh(&registry, None);
        vertex.mark_entered();
        vertex.fire_enter(None);
        self.current = Some(start);

        tracing::info!(vertex = %start, "scenario started");
        self.hooks.invoke(&GraphEvent::GraphStarted { start });

        if let Some(save_point) = self.config.save_point {
            self.fast_forward_to(save_point)?;
        }
        if start == self.end {
            self.finish(start);
            return Ok(Progress {
                transitions: 0,
                finished: true,
            });
        }
        self.progress_if_possible()
    }

    /// Pushes `data` into the current vertex and advances as far as possible.
    ///
    /// User-task vertices ignore `data` and re-query their taskable instead.
    /// Raises [`GraphEvent::ProgressBlocked`] when nothing moved.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::NotStarted`] before [`start`](Self::start),
    /// or an error if evaluation exceeds a configured limit.
    pub fn poke(&mut self, data: impl Into<Value>) -> Result<Progress, ControllerError> {
        let current = self.current.ok_or(ControllerError::NotStarted)?;
        let value = data.into();
        tracing::trace!(vertex = %current, value = %value, "poke");

        let registry = Arc::clone(&self.registry);
        self.vertex_mut(current)?.refresh(&registry, Some(value));

        let progress = self.progress_if_possible()?;
        if progress.transitions == 0 && !self.paused && !self.finished {
            tracing::trace!(vertex = %current, "progress blocked");
            self.hooks
                .invoke(&GraphEvent::ProgressBlocked { vertex: current });
        }
        Ok(progress)
    }

    /// Pokes the well-known value of the named button.
    ///
    /// # Errors
    ///
    /// See [`poke`](Self::poke).
    pub fn press_button(&mut self, name: &str) -> Result<Progress, ControllerError> {
        self.poke(button_value(name))
    }

    /// Advances through every satisfiable transition from the current vertex.
    ///
    /// Does nothing while paused or once finished. Calling it twice with no
    /// external change in between takes no further transition.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::NotStarted`] before [`start`](Self::start),
    /// [`ControllerError::RecursionLimitExceeded`] if checks nest too deeply, or
    /// [`ControllerError::TransitionLimitExceeded`] if automatic transitions
    /// do not settle.
    pub fn progress_if_possible(&mut self) -> Result<Progress, ControllerError> {
        let mut progress = Progress::default();

        while !self.paused && !self.finished {
            let current = self.current.ok_or(ControllerError::NotStarted)?;
            if current == self.end {
                break;
            }

            self.run_data_checks(current, 0)?;
            if !self.check_all_reliant(current, None, 0)? {
                tracing::trace!(vertex = %current, "waiting on reliant edges");
                break;
            }
            let Some(edge) = self.select_traversable(current)? else {
                break;
            };

            if progress.transitions >= self.config.max_chained_transitions {
                return Err(ControllerError::TransitionLimitExceeded {
                    vertex: current,
                    max: self.config.max_chained_transitions,
                });
            }
            self.transition(&edge)?;
            progress.transitions += 1;
        }

        progress.finished = self.finished;
        Ok(progress)
    }

    /// Stops progression until [`resume`](Self::resume).
    pub fn pause(&mut self) {
        tracing::debug!("scenario paused");
        self.paused = true;
    }

    /// Clears the pause flag and advances as far as possible.
    ///
    /// # Errors
    ///
    /// See [`progress_if_possible`](Self::progress_if_possible).
    pub fn resume(&mut self) -> Result<Progress, ControllerError> {
        tracing::debug!("scenario resumed");
        self.paused = false;
        self.progress_if_possible()
    }

    /// Takes the single outgoing traversable edge regardless of its
    /// condition, then advances as far as possible.
    ///
    /// With zero or several outgoing traversable edges this logs a warning
    /// and changes nothing. Does nothing while paused.
    ///
    /// # Errors
    ///
    /// See [`progress_if_possible`](Self::progress_if_possible).
    pub fn skip_step(&mut self) -> Result<Progress, ControllerError> {
        let current = self.current.ok_or(ControllerError::NotStarted)?;
        if self.finished {
            return Ok(Progress {
                transitions: 0,
                finished: true,
            });
        }
        if self.paused {
            tracing::debug!(vertex = %current, "cannot skip while paused");
            return Ok(Progress::default());
        }

        let Some(edge) = self.graph.unique_traversable(current) else {
            tracing::warn!(vertex = %current, "cannot skip: no unique traversable edge");
            return Ok(Progress::default());
        };
        let edge = edge.id().clone();
        tracing::debug!(vertex = %current, edge = %edge, "skipping step");

        self.transition(&edge)?;
        let mut progress = self.progress_if_possible()?;
        progress.transitions += 1;
        Ok(progress)
    }

    /// Rewires the start vertex to jump straight to the vertex after
    /// `save_point`.
    ///
    /// The path from start to `save_point`, and the step after it, must be a
    /// single chain of unique traversable edges. Otherwise a warning is
    /// logged, the graph is left untouched and `false` is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::VertexNotFound`] if `save_point` is not in the graph.
    pub fn fast_forward_to(&mut self, save_point: VertexId) -> Result<bool, ControllerError> {
        if !self.graph.contains_vertex(save_point) {
            return Err(ControllerError::VertexNotFound(save_point));
        }
        if save_point == self.end {
            tracing::warn!(vertex = %save_point, "cannot fast-forward past the end vertex");
            return Ok(false);
        }

        let mut at = self.start;
        let mut hops = 0;
        while at != save_point {
            let Some(edge) = self.graph.unique_traversable(at) else {
                tracing::warn!(vertex = %at, "cannot fast-forward: path is not a single chain");
                return Ok(false);
            };
            at = edge.target();
            hops += 1;
            if hops > self.graph.vertex_count() {
                tracing::warn!(vertex = %save_point, "cannot fast-forward: save point not on the chain");
                return Ok(false);
            }
        }
        let Some(next) = self.graph.unique_traversable(save_point).map(Edge::target) else {
            tracing::warn!(vertex = %save_point, "cannot fast-forward: no unique step after save point");
            return Ok(false);
        };

        let start = self.start;
        let stale: Vec<EdgeId> = self
            .graph
            .out_edges(start, EdgeKind::Traversable)
            .map(|edge| edge.id().clone())
            .collect();
        for id in &stale {
            self.graph.remove_edge(id)?;
        }
        self.graph.add_traversable(start, next, GraphData::always())?;

        tracing::info!(save_point = %save_point, next = %next, "fast-forwarded to save point");
        Ok(true)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Evaluation
    // ─────────────────────────────────────────────────────────────────────────

    fn vertex(&self, id: VertexId) -> Result<&Vertex, ControllerError> {
        self.graph.vertex(id).ok_or(ControllerError::VertexNotFound(id))
    }

    fn vertex_mut(&mut self, id: VertexId) -> Result<&mut Vertex, ControllerError> {
        self.graph
            .vertex_mut(id)
            .ok_or(ControllerError::VertexNotFound(id))
    }

    fn value_of(&self, id: VertexId) -> Result<Value, ControllerError> {
        Ok(self.vertex(id)?.value().clone())
    }

    fn check_depth(&self, depth: usize) -> Result<(), ControllerError> {
        let max = self.config.max_recursion_depth;
        if depth > max {
            return Err(ControllerError::RecursionLimitExceeded { depth, max });
        }
        Ok(())
    }

    /// Runs every data-check edge of `vertex` in insertion order: copy the
    /// source value into the target, cascade into the target's own checks,
    /// then copy the target's value back.
    fn run_data_checks(&mut self, vertex: VertexId, depth: usize) -> Result<(), ControllerError> {
        self.check_depth(depth)?;
        let edges: Vec<(VertexId, bool)> = self
            .graph
            .out_edges(vertex, EdgeKind::DataCheck)
            .map(|edge| (edge.target(), edge.propagates_source_data()))
            .collect();

        let registry = Arc::clone(&self.registry);
        for (target, propagate) in edges {
            let incoming = if propagate {
                Some(self.value_of(vertex)?)
            } else {
                None
            };
            self.vertex_mut(target)?.refresh(&registry, incoming);
            self.run_data_checks(target, depth + 1)?;
            let derived = self.value_of(target)?;
            self.vertex_mut(vertex)?.refresh(&registry, Some(derived));
        }
        Ok(())
    }

    /// Whether every reliant edge of `vertex` is satisfied.
    ///
    /// At the current vertex each edge brings its own budget. Below it the
    /// inherited budget shrinks by one per level, and once exhausted the
    /// remaining subtree is assumed satisfied.
    fn check_all_reliant(
        &mut self,
        vertex: VertexId,
        budget: Option<i64>,
        depth: usize,
    ) -> Result<bool, ControllerError> {
        self.check_depth(depth)?;
        let at_current = self.current == Some(vertex);
        let budget = if at_current { None } else { budget.map(|b| b - 1) };
        if budget.is_some_and(|b| b < 0) {
            return Ok(true);
        }

        let (sub_edges, regular): (Vec<ReliantEdge>, Vec<ReliantEdge>) = self
            .graph
            .reliant_out_edges(vertex)
            .cloned()
            .partition(|edge| edge.sub_edge);

        let budget_for = |edge: &ReliantEdge| {
            if at_current {
                edge.depth.remaining()
            } else {
                budget
            }
        };

        let mut satisfied = true;
        for edge in &regular {
            satisfied &= self.check_reliant_edge(edge, budget_for(edge), depth)?;
        }
        if !satisfied {
            return Ok(false);
        }
        for edge in &sub_edges {
            satisfied &= self.check_reliant_edge(edge, budget_for(edge), depth)?;
        }
        Ok(satisfied)
    }

    fn check_reliant_edge(
        &mut self,
        edge: &ReliantEdge,
        budget: Option<i64>,
        depth: usize,
    ) -> Result<bool, ControllerError> {
        if edge.complete_once && self.completed.contains(&edge.id) {
            return Ok(true);
        }

        let target = edge.target;
        let incoming = if edge.propagate_source_data {
            Some(self.value_of(edge.source)?)
        } else {
            None
        };
        let registry = Arc::clone(&self.registry);
        self.vertex_mut(target)?.refresh(&registry, incoming);
        self.run_data_checks(target, depth + 1)?;

        let nested = self.check_all_reliant(target, budget, depth + 1)?;
        let complete = nested
            && compare(self.vertex(target)?.data(), &edge.condition)
            && (edge.sub_edge || self.graph.is_leaf(target) || self.rejoins(target));

        if complete && edge.complete_once {
            self.completed.insert(edge.id.clone());
        }
        if self.vertex_mut(target)?.report_completion(complete) {
            tracing::debug!(vertex = %target, complete, "completion changed");
            self.hooks.invoke(&GraphEvent::VertexCompletionChanged {
                vertex: target,
                complete,
            });
        }
        Ok(complete)
    }

    /// Whether some traversable edge out of `vertex` leads back to the current vertex.
    fn rejoins(&self, vertex: VertexId) -> bool {
        let Some(current) = self.current else {
            return false;
        };
        self.graph
            .out_edges(vertex, EdgeKind::Traversable)
            .any(|edge| self.graph.is_reachable(edge.id(), current))
    }

    /// The first traversable edge, in insertion order, satisfied by the vertex's value.
    fn select_traversable(&self, vertex: VertexId) -> Result<Option<EdgeId>, ControllerError> {
        let data = self.vertex(vertex)?.data();
        Ok(self
            .graph
            .out_edges(vertex, EdgeKind::Traversable)
            .find(|edge| compare(data, edge.condition()))
            .map(|edge| edge.id().clone()))
    }

    fn transition(&mut self, edge: &EdgeId) -> Result<(), ControllerError> {
        let edge = self
            .graph
            .edge(edge)
            .cloned()
            .ok_or_else(|| GraphError::UnknownEdge(edge.clone()))?;
        let (from, to) = (edge.source(), edge.target());

        self.completed.clear();
        self.vertex(from)?.fire_leave(Some(&edge));
        self.current = Some(to);

        let incoming = if edge.propagates_source_data() {
            Some(self.value_of(from)?)
        } else {
            None
        };
        let registry = Arc::clone(&self.registry);
        let vertex = self.vertex_mut(to)?;
        vertex.mark_entered();
        vertex.fire_enter(Some(&edge));
        vertex.refresh(&registry, incoming);

        tracing::debug!(from = %from, to = %to, edge = %edge.id(), "transition");
        self.hooks.invoke(&GraphEvent::CurrentVertexChanged {
            from,
            to,
            edge: edge.id().clone(),
        });

        if to == self.end {
            self.finish(to);
        }
        Ok(())
    }

    fn finish(&mut self, end: VertexId) {
        self.finished = true;
        tracing::info!(vertex = %end, "scenario finished");
        self.hooks.invoke(&GraphEvent::GraphEnded { end });
    }
}
