//! Graph structure and authoring API.
//!
//! The [`Graph`] is a directed multigraph of [`Vertex`] steps joined by typed
//! [`Edge`]s. Parallel edges between the same pair of vertices are legal and
//! usually express alternative ways of satisfying a step.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};

use hashbrown::{HashMap, HashSet};
use thiserror::Error;

use crate::data::GraphData;
use crate::edge::{DataCheckEdge, Edge, EdgeId, EdgeKind, ReliantEdge, ReliantOptions, TraversableEdge};
use crate::vertex::{UserTask, Vertex, VertexId, VertexKind};

// ─────────────────────────────────────────────────────────────────────────────
// ID Allocator
// ─────────────────────────────────────────────────────────────────────────────

/// Shared allocator for vertex IDs.
///
/// Clones share the same counter. Graphs created with [`Graph::new`] draw
/// from one process-wide allocator, so ids are unique per run until
/// [`reset_vertex_ids`] is called.
///
/// # Example
///
/// ```
/// use waypoint_graph::graph::IdAllocator;
///
/// let allocator = IdAllocator::new();
/// let a = allocator.allocate_vertex_id();
/// let b = allocator.clone().allocate_vertex_id();
/// assert_eq!((a.index(), b.index()), (0, 1));
/// ```
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    next_vertex_id: Arc<AtomicUsize>,
}

impl IdAllocator {
    /// Creates a new ID allocator starting at 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next unique vertex ID.
    pub fn allocate_vertex_id(&self) -> VertexId {
        VertexId::new(self.next_vertex_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the current counter value (for debugging).
    #[must_use]
    pub fn current_vertex_id(&self) -> usize {
        self.next_vertex_id.load(Ordering::Relaxed)
    }

    /// Restarts the counter at 0.
    pub fn reset(&self) {
        self.next_vertex_id.store(0, Ordering::Relaxed);
    }
}

static GLOBAL_ALLOCATOR: LazyLock<IdAllocator> = LazyLock::new(IdAllocator::new);

/// Restarts the process-wide vertex id counter.
///
/// Call between scenarios, once the previous graph has been discarded.
pub fn reset_vertex_ids() {
    GLOBAL_ALLOCATOR.reset();
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised while authoring a graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// An edge endpoint refers to a vertex that is not in the graph.
    #[error("unknown vertex: {0}")]
    UnknownVertex(VertexId),
    /// No edge with this id exists.
    #[error("unknown edge: {0}")]
    UnknownEdge(EdgeId),
}

/// Structural problems found by [`Graph::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The start vertex is not in the graph.
    #[error("start vertex {0} is not in the graph")]
    UnknownStart(VertexId),
    /// The end vertex is not in the graph.
    #[error("end vertex {0} is not in the graph")]
    UnknownEnd(VertexId),
    /// No chain of traversable edges leads from start to end.
    #[error("end vertex {end} is unreachable from {start}")]
    EndUnreachable {
        /// The start vertex.
        start: VertexId,
        /// The end vertex.
        end: VertexId,
    },
    /// A data-check edge loops back to its own source.
    #[error("data-check edge {edge} loops on {vertex}")]
    DataCheckSelfLoop {
        /// The offending edge.
        edge: EdgeId,
        /// The vertex it loops on.
        vertex: VertexId,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Graph
// ─────────────────────────────────────────────────────────────────────────────

/// A scenario graph.
///
/// # Example
///
/// ```
/// use waypoint_graph::prelude::*;
///
/// let mut graph = Graph::with_allocator(IdAllocator::new());
/// let a = graph.add_vertex("a", GraphData::empty());
/// let b = graph.add_vertex("b", GraphData::locked(DataType::Int));
/// graph.add_traversable(a, b, GraphData::always()).unwrap();
/// assert!(graph.validate(a, b).is_ok());
/// ```
#[derive(Debug)]
pub struct Graph {
    /// Vertices in insertion order.
    vertices: Vec<Vertex>,
    /// Position of each vertex in `vertices`.
    index: HashMap<VertexId, usize>,
    /// Edges in insertion order. Selection order depends on this.
    edges: Vec<Edge>,
    allocator: IdAllocator,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Creates an empty graph drawing ids from the process-wide allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::with_allocator(GLOBAL_ALLOCATOR.clone())
    }

    /// Creates an empty graph with its own allocator.
    #[must_use]
    pub fn with_allocator(allocator: IdAllocator) -> Self {
        Self {
            vertices: Vec::new(),
            index: HashMap::new(),
            edges: Vec::new(),
            allocator,
        }
    }

    /// Returns all vertices in insertion order.
    #[must_use]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Returns all edges in insertion order.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Returns the number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Returns the number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Returns `true` if the graph has no vertices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Returns `true` if the vertex is in the graph.
    #[must_use]
    pub fn contains_vertex(&self, id: VertexId) -> bool {
        self.index.contains_key(&id)
    }

    /// Gets a vertex by ID.
    #[must_use]
    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.index.get(&id).map(|&pos| &self.vertices[pos])
    }

    /// Gets a vertex mutably by ID.
    pub fn vertex_mut(&mut self, id: VertexId) -> Option<&mut Vertex> {
        self.index.get(&id).map(|&pos| &mut self.vertices[pos])
    }

    /// Gets an edge by ID.
    #[must_use]
    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges.iter().find(|edge| edge.id() == id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Authoring
    // ─────────────────────────────────────────────────────────────────────────

    /// Adds a plain vertex.
    pub fn add_vertex(&mut self, name: impl Into<String>, data: GraphData) -> VertexId {
        self.insert_vertex(name.into(), data, VertexKind::Plain)
    }

    /// Adds a vertex whose value is pulled from the taskable registry.
    pub fn add_user_task(&mut self, name: impl Into<String>, task: UserTask) -> VertexId {
        self.insert_vertex(name.into(), GraphData::empty(), VertexKind::UserTask(task))
    }

    fn insert_vertex(&mut self, name: String, data: GraphData, kind: VertexKind) -> VertexId {
        let id = self.allocator.allocate_vertex_id();
        self.index.insert(id, self.vertices.len());
        self.vertices.push(Vertex::new(id, name, data, kind));
        id
    }

    /// Adds a prebuilt edge after checking both endpoints exist.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownVertex`] if either endpoint is missing.
    pub fn add_edge(&mut self, edge: impl Into<Edge>) -> Result<EdgeId, GraphError> {
        let edge = edge.into();
        for endpoint in [edge.source(), edge.target()] {
            if !self.contains_vertex(endpoint) {
                return Err(GraphError::UnknownVertex(endpoint));
            }
        }
        let id = edge.id().clone();
        self.edges.push(edge);
        Ok(id)
    }

    /// Adds a traversable edge taken when `condition` matches the source's value.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownVertex`] if either endpoint is missing.
    pub fn add_traversable(
        &mut self,
        from: VertexId,
        to: VertexId,
        condition: GraphData,
    ) -> Result<EdgeId, GraphError> {
        self.add_edge(TraversableEdge::new(from, to, condition))
    }

    /// Adds a data-check edge that copies `from`'s value into `to` and back.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownVertex`] if either endpoint is missing.
    pub fn add_data_check(&mut self, from: VertexId, to: VertexId) -> Result<EdgeId, GraphError> {
        self.add_edge(DataCheckEdge::new(from, to))
    }

    /// Adds a reliant edge making `from` depend on the side-branch at `to`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownVertex`] if either endpoint is missing.
    pub fn add_reliant(
        &mut self,
        from: VertexId,
        to: VertexId,
        condition: GraphData,
        options: ReliantOptions,
    ) -> Result<EdgeId, GraphError> {
        self.add_edge(ReliantEdge::new(from, to, options).with_condition(condition))
    }

    /// Removes an edge, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownEdge`] if no such edge exists.
    pub fn remove_edge(&mut self, id: &EdgeId) -> Result<Edge, GraphError> {
        let pos = self
            .edges
            .iter()
            .position(|edge| edge.id() == id)
            .ok_or_else(|| GraphError::UnknownEdge(id.clone()))?;
        Ok(self.edges.remove(pos))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Outgoing edges of `vertex` of the given kind, in insertion order.
    pub fn out_edges(&self, vertex: VertexId, kind: EdgeKind) -> impl Iterator<Item = &Edge> {
        self.edges
            .iter()
            .filter(move |edge| edge.source() == vertex && edge.kind() == kind)
    }

    /// Outgoing reliant edges of `vertex`, in insertion order.
    pub fn reliant_out_edges(&self, vertex: VertexId) -> impl Iterator<Item = &ReliantEdge> {
        self.out_edges(vertex, EdgeKind::Reliant)
            .filter_map(Edge::as_reliant)
    }

    /// The single outgoing traversable edge of `vertex`, or `None` if there
    /// are zero or several.
    #[must_use]
    pub fn unique_traversable(&self, vertex: VertexId) -> Option<&Edge> {
        let mut edges = self.out_edges(vertex, EdgeKind::Traversable);
        let first = edges.next()?;
        edges.next().is_none().then_some(first)
    }

    /// A vertex is a leaf when its only outgoing traversable edge loops back to itself.
    #[must_use]
    pub fn is_leaf(&self, vertex: VertexId) -> bool {
        self.unique_traversable(vertex).is_some_and(Edge::is_self_loop)
    }

    /// Whether `to` can be reached by following `from_edge` and then
    /// traversable edges only.
    #[must_use]
    pub fn is_reachable(&self, from_edge: &EdgeId, to: VertexId) -> bool {
        let Some(edge) = self.edge(from_edge) else {
            return false;
        };
        self.reachable_from(edge.target()).contains(&to)
    }

    /// Every vertex reachable from `start` over traversable edges, `start` included.
    fn reachable_from(&self, start: VertexId) -> HashSet<VertexId> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        seen.insert(start);
        queue.push_back(start);

        while let Some(vertex) = queue.pop_front() {
            for edge in self.out_edges(vertex, EdgeKind::Traversable) {
                if seen.insert(edge.target()) {
                    queue.push_back(edge.target());
                }
            }
        }
        seen
    }

    /// Depth-first search for any chain of traversable edges from `start` to `end`.
    ///
    /// Edges are explored in insertion order and the first path found is
    /// returned, which need not be the shortest. Each vertex is expanded at
    /// most once, so the search terminates on cyclic graphs.
    ///
    /// Returns the edges of the path, empty when `start == end`.
    #[must_use]
    pub fn find_any_path(&self, start: VertexId, end: VertexId) -> Option<Vec<EdgeId>> {
        if !self.contains_vertex(start) || !self.contains_vertex(end) {
            return None;
        }
        if start == end {
            return Some(Vec::new());
        }

        let mut visited = HashSet::new();
        visited.insert(start);
        // Each frame holds the vertex's remaining out-edges; `path` holds the edge taken into each frame.
        let mut frames: Vec<std::vec::IntoIter<&Edge>> = vec![self.traversable_vec(start).into_iter()];
        let mut path: Vec<EdgeId> = Vec::new();

        while let Some(frame) = frames.last_mut() {
            let Some(edge) = frame.next() else {
                frames.pop();
                path.pop();
                continue;
            };
            let next = edge.target();
            if !visited.insert(next) {
                continue;
            }
            path.push(edge.id().clone());
            if next == end {
                return Some(path);
            }
            frames.push(self.traversable_vec(next).into_iter());
        }
        None
    }

    fn traversable_vec(&self, vertex: VertexId) -> Vec<&Edge> {
        self.out_edges(vertex, EdgeKind::Traversable).collect()
    }

    /// Checks the graph can be run from `start` to `end`.
    ///
    /// # Errors
    ///
    /// Returns every problem found.
    pub fn validate(&self, start: VertexId, end: VertexId) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if !self.contains_vertex(start) {
            errors.push(ValidationError::UnknownStart(start));
        }
        if !self.contains_vertex(end) {
            errors.push(ValidationError::UnknownEnd(end));
        }
        if errors.is_empty() && !self.reachable_from(start).contains(&end) {
            errors.push(ValidationError::EndUnreachable { start, end });
        }

        for edge in &self.edges {
            if edge.kind() == EdgeKind::DataCheck && edge.is_self_loop() {
                errors.push(ValidationError::DataCheckSelfLoop {
                    edge: edge.id().clone(),
                    vertex: edge.source(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
