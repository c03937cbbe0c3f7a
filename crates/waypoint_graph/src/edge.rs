//! Edge types for scenario graphs.
//!
//! Edges connect two vertices and carry the [`GraphData`] condition that
//! decides whether the connection is satisfied. There are three kinds:
//!
//! - [`TraversableEdge`]: a candidate transition between steps.
//! - [`ReliantEdge`]: a side-branch that must be resolvable before the
//!   current step may advance, checked with bounded look-ahead.
//! - [`DataCheckEdge`]: an eager edge that lets an auxiliary vertex derive or
//!   annotate a value without becoming part of the traversed path.

use core::fmt;
use std::sync::Arc;

use crate::data::GraphData;
use crate::vertex::VertexId;

/// Unique identifier for an edge in the graph.
///
/// Edge IDs are generated using nanoid, so ids never collide between graphs.
/// Internally uses `Arc<str>` for cheap cloning.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeId(Arc<str>);

impl EdgeId {
    /// Creates a new edge ID with a unique nanoid.
    #[must_use]
    pub fn new() -> Self {
        Self(nanoid::nanoid!().into())
    }

    /// Creates an edge ID from a specific string value.
    #[must_use]
    pub fn from_string(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EdgeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "edge_{}", self.0)
    }
}

/// Discriminant used to filter edges by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// See [`TraversableEdge`].
    Traversable,
    /// See [`ReliantEdge`].
    Reliant,
    /// See [`DataCheckEdge`].
    DataCheck,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeKind::Traversable => f.write_str("traversable"),
            EdgeKind::Reliant => f.write_str("reliant"),
            EdgeKind::DataCheck => f.write_str("data-check"),
        }
    }
}

/// A directed connection between two vertices.
#[derive(Debug, Clone, PartialEq)]
pub enum Edge {
    /// Candidate transition, taken when its condition matches.
    Traversable(TraversableEdge),
    /// Dependency on a side-branch.
    Reliant(ReliantEdge),
    /// Eager value propagation.
    DataCheck(DataCheckEdge),
}

impl Edge {
    /// Returns the edge's ID.
    #[must_use]
    pub fn id(&self) -> &EdgeId {
        match self {
            Edge::Traversable(edge) => &edge.id,
            Edge::Reliant(edge) => &edge.id,
            Edge::DataCheck(edge) => &edge.id,
        }
    }

    /// Returns the edge kind.
    #[must_use]
    pub fn kind(&self) -> EdgeKind {
        match self {
            Edge::Traversable(_) => EdgeKind::Traversable,
            Edge::Reliant(_) => EdgeKind::Reliant,
            Edge::DataCheck(_) => EdgeKind::DataCheck,
        }
    }

    /// Returns the source vertex ID.
    #[must_use]
    pub fn source(&self) -> VertexId {
        match self {
            Edge::Traversable(edge) => edge.source,
            Edge::Reliant(edge) => edge.source,
            Edge::DataCheck(edge) => edge.source,
        }
    }

    /// Returns the target vertex ID.
    #[must_use]
    pub fn target(&self) -> VertexId {
        match self {
            Edge::Traversable(edge) => edge.target,
            Edge::Reliant(edge) => edge.target,
            Edge::DataCheck(edge) => edge.target,
        }
    }

    /// Returns the satisfaction condition.
    #[must_use]
    pub fn condition(&self) -> &GraphData {
        match self {
            Edge::Traversable(edge) => &edge.condition,
            Edge::Reliant(edge) => &edge.condition,
            Edge::DataCheck(edge) => &edge.condition,
        }
    }

    /// Returns whether the source value is copied into the target when the edge is used.
    #[must_use]
    pub fn propagates_source_data(&self) -> bool {
        match self {
            Edge::Traversable(edge) => edge.propagate_source_data,
            Edge::Reliant(edge) => edge.propagate_source_data,
            Edge::DataCheck(edge) => edge.propagate_source_data,
        }
    }

    /// Returns `true` if source and target are the same vertex.
    #[must_use]
    pub fn is_self_loop(&self) -> bool {
        self.source() == self.target()
    }

    /// Returns the reliant payload, if this is a reliant edge.
    #[must_use]
    pub fn as_reliant(&self) -> Option<&ReliantEdge> {
        match self {
            Edge::Reliant(edge) => Some(edge),
            _ => None,
        }
    }
}

/// A candidate transition: A -> B when A's data satisfies the condition.
///
/// Parallel traversable edges between the same pair are legal; they model
/// alternative ways of satisfying the step.
#[derive(Debug, Clone, PartialEq)]
pub struct TraversableEdge {
    /// Unique identifier for this edge.
    pub id: EdgeId,
    /// Source vertex ID.
    pub source: VertexId,
    /// Destination vertex ID.
    pub target: VertexId,
    /// Condition matched against the source vertex data.
    pub condition: GraphData,
    /// Whether the target inherits the source value on transition.
    pub propagate_source_data: bool,
}

impl TraversableEdge {
    /// Creates a new traversable edge. Button conditions are resolved here.
    #[must_use]
    pub fn new(source: VertexId, target: VertexId, condition: GraphData) -> Self {
        Self {
            id: EdgeId::new(),
            source,
            target,
            condition: condition.resolve_button(),
            propagate_source_data: false,
        }
    }

    /// Sets whether the source value propagates to the target.
    #[must_use]
    pub fn with_propagation(mut self, propagate: bool) -> Self {
        self.propagate_source_data = propagate;
        self
    }
}

/// A data-check edge: target derives a value from the source.
#[derive(Debug, Clone, PartialEq)]
pub struct DataCheckEdge {
    /// Unique identifier for this edge.
    pub id: EdgeId,
    /// Source vertex ID.
    pub source: VertexId,
    /// Auxiliary vertex that derives a value.
    pub target: VertexId,
    /// Condition data (unused by propagation, kept for inspection).
    pub condition: GraphData,
    /// Whether the source value is copied into the target first.
    pub propagate_source_data: bool,
}

impl DataCheckEdge {
    /// Creates a new data-check edge that propagates the source value.
    #[must_use]
    pub fn new(source: VertexId, target: VertexId) -> Self {
        Self {
            id: EdgeId::new(),
            source,
            target,
            condition: GraphData::always(),
            propagate_source_data: true,
        }
    }

    /// Sets whether the source value is copied into the target first.
    #[must_use]
    pub fn with_propagation(mut self, propagate: bool) -> Self {
        self.propagate_source_data = propagate;
        self
    }
}

/// How far a reliant check may look below its target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DepthBudget {
    /// Look `n` reliant levels below the target; deeper levels are assumed satisfied.
    Limited(u32),
    /// No horizon. Cycles are caught by the controller's recursion limit.
    #[default]
    Unlimited,
}

impl DepthBudget {
    pub(crate) fn remaining(self) -> Option<i64> {
        match self {
            DepthBudget::Limited(n) => Some(i64::from(n)),
            DepthBudget::Unlimited => None,
        }
    }
}

/// Authoring options for a [`ReliantEdge`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReliantOptions {
    /// Look-ahead budget.
    pub depth: DepthBudget,
    /// Once satisfied, stay satisfied until the current vertex changes.
    pub complete_once: bool,
    /// Evaluate only after every regular reliant edge of the source is satisfied.
    pub sub_edge: bool,
}

impl ReliantOptions {
    /// Creates default options: unlimited depth, re-evaluated every check.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the look-ahead budget.
    #[must_use]
    pub fn with_depth(mut self, depth: DepthBudget) -> Self {
        self.depth = depth;
        self
    }

    /// Marks the edge complete-once.
    #[must_use]
    pub fn complete_once(mut self) -> Self {
        self.complete_once = true;
        self
    }

    /// Marks the edge as a sub-edge.
    #[must_use]
    pub fn sub_edge(mut self) -> Self {
        self.sub_edge = true;
        self
    }
}

/// A reliant edge: the source may only advance once the target side-branch is resolvable.
#[derive(Debug, Clone, PartialEq)]
pub struct ReliantEdge {
    /// Unique identifier for this edge.
    pub id: EdgeId,
    /// Vertex whose progression depends on the side-branch.
    pub source: VertexId,
    /// Entry of the side-branch.
    pub target: VertexId,
    /// Condition matched against the target's data. Defaults to always-pass.
    pub condition: GraphData,
    /// Whether the source value is copied into the target before checking.
    pub propagate_source_data: bool,
    /// Look-ahead budget.
    pub depth: DepthBudget,
    /// See [`ReliantOptions::complete_once`].
    pub complete_once: bool,
    /// See [`ReliantOptions::sub_edge`].
    pub sub_edge: bool,
}

impl ReliantEdge {
    /// Creates a new reliant edge.
    #[must_use]
    pub fn new(source: VertexId, target: VertexId, options: ReliantOptions) -> Self {
        Self {
            id: EdgeId::new(),
            source,
            target,
            condition: GraphData::always(),
            propagate_source_data: false,
            depth: options.depth,
            complete_once: options.complete_once,
            sub_edge: options.sub_edge,
        }
    }

    /// Sets the condition matched against the target's data.
    #[must_use]
    pub fn with_condition(mut self, condition: GraphData) -> Self {
        self.condition = condition.resolve_button();
        self
    }

    /// Sets whether the source value is copied into the target before checking.
    #[must_use]
    pub fn with_propagation(mut self, propagate: bool) -> Self {
        self.propagate_source_data = propagate;
        self
    }
}

impl From<TraversableEdge> for Edge {
    fn from(edge: TraversableEdge) -> Self {
        Edge::Traversable(edge)
    }
}

impl From<ReliantEdge> for Edge {
    fn from(edge: ReliantEdge) -> Self {
        Edge::Reliant(edge)
    }
}

impl From<DataCheckEdge> for Edge {
    fn from(edge: DataCheckEdge) -> Self {
        Edge::DataCheck(edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SpecialCase, Value, button_value};

    #[test]
    fn edge_id_uniqueness() {
        let id1 = EdgeId::new();
        let id2 = EdgeId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn traversable_edge_creation() {
        let edge = TraversableEdge::new(VertexId::new(1), VertexId::new(2), GraphData::new(1));
        assert!(!edge.id.as_str().is_empty());
        assert_eq!(edge.source, VertexId::new(1));
        assert_eq!(edge.target, VertexId::new(2));
        assert!(!edge.propagate_source_data);
    }

    #[test]
    fn button_condition_resolved_on_construction() {
        let edge = TraversableEdge::new(
            VertexId::new(0),
            VertexId::new(1),
            GraphData::special(SpecialCase::Button("start".into())),
        );
        assert_eq!(edge.condition.special_case(), &SpecialCase::None);
        assert_eq!(edge.condition.value(), &button_value("start"));
    }

    #[test]
    fn edge_enum_accessors() {
        let reliant: Edge = ReliantEdge::new(
            VertexId::new(3),
            VertexId::new(3),
            ReliantOptions::new()
                .with_depth(DepthBudget::Limited(2))
                .complete_once(),
        )
        .into();
        assert_eq!(reliant.kind(), EdgeKind::Reliant);
        assert!(reliant.is_self_loop());
        let payload = reliant.as_reliant().unwrap();
        assert_eq!(payload.depth, DepthBudget::Limited(2));
        assert!(payload.complete_once);
        assert!(!payload.sub_edge);

        let check: Edge = DataCheckEdge::new(VertexId::new(1), VertexId::new(4)).into();
        assert_eq!(check.kind(), EdgeKind::DataCheck);
        assert!(check.propagates_source_data());
        assert!(check.as_reliant().is_none());
        assert_eq!(check.condition().value(), &Value::Absent);
    }

    #[test]
    fn depth_budget_remaining() {
        assert_eq!(DepthBudget::Limited(3).remaining(), Some(3));
        assert_eq!(DepthBudget::Unlimited.remaining(), None);
    }
}
