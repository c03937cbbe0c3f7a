//! Shared test utilities for `waypoint_graph` integration tests.
//!
//! Import via `mod test_utils;` in test files.

#![allow(
    dead_code,
    missing_docs,
    reason = "shared test utilities, not all items used in every test binary"
)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use waypoint_graph::prelude::*;

// ═══════════════════════════════════════════════════════════════════════════════
// GRAPH HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// A graph with its own id counter, so ids start at 0 in every test.
pub fn new_graph() -> Graph {
    Graph::with_allocator(IdAllocator::new())
}

/// A fresh registry.
pub fn registry() -> Arc<TaskableRegistry> {
    Arc::new(TaskableRegistry::new())
}

/// Adds an unlocked, empty vertex.
pub fn plain(graph: &mut Graph, name: &str) -> VertexId {
    graph.add_vertex(name, GraphData::empty())
}

/// Adds a vertex locked to `Int` (starts at 0).
pub fn int_vertex(graph: &mut Graph, name: &str) -> VertexId {
    graph.add_vertex(name, GraphData::locked(DataType::Int))
}

/// Adds a self-loop so `vertex` counts as a leaf.
pub fn make_leaf(graph: &mut Graph, vertex: VertexId) {
    graph
        .add_traversable(vertex, vertex, GraphData::always())
        .expect("vertex exists");
}

/// Builds a controller and starts it.
pub fn started(graph: Graph, start: VertexId, end: VertexId) -> GraphController {
    started_with(graph, start, end, registry())
}

/// Builds a controller over `registry` and starts it.
pub fn started_with(
    graph: Graph,
    start: VertexId,
    end: VertexId,
    registry: Arc<TaskableRegistry>,
) -> GraphController {
    let mut controller = GraphController::new(graph, start, end, registry).expect("valid graph");
    controller.start().expect("start");
    controller
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT RECORDING
// ═══════════════════════════════════════════════════════════════════════════════

/// Records every [`GraphEvent`] raised by a controller.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<GraphEvent>>>,
}

impl EventLog {
    /// Registers the log as an observer named `"event-log"`.
    pub fn attach(hooks: &HooksAPI) -> Self {
        let log = Self::default();
        let events = Arc::clone(&log.events);
        hooks
            .register_observer("event-log", move |event: &GraphEvent| {
                events.lock().push(event.clone());
            })
            .expect("unique hook name");
        log
    }

    pub fn events(&self) -> Vec<GraphEvent> {
        self.events.lock().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().iter().map(GraphEvent::kind).collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.lock().iter().filter(|event| event.kind() == kind).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TASKABLES
// ═══════════════════════════════════════════════════════════════════════════════

/// A taskable whose reported value is set by the test.
pub struct Probe {
    name: Option<String>,
    value: Mutex<Value>,
    checks: AtomicUsize,
    listener: Mutex<Option<PokeListener>>,
}

impl Probe {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            name: None,
            value: Mutex::new(value.into()),
            checks: AtomicUsize::new(0),
            listener: Mutex::new(None),
        }
    }

    pub fn named(name: &str, value: impl Into<Value>) -> Self {
        Self {
            name: Some(name.to_owned()),
            ..Self::new(value)
        }
    }

    /// Changes the reported value without poking.
    pub fn set(&self, value: impl Into<Value>) {
        *self.value.lock() = value.into();
    }

    /// Changes the reported value and pokes the wired listener.
    pub fn change(&self, value: impl Into<Value>) {
        let value = value.into();
        self.set(value.clone());
        let listener = self.listener.lock().clone();
        if let Some(listener) = listener {
            listener(value);
        }
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }

    pub fn is_wired(&self) -> bool {
        self.listener.lock().is_some()
    }
}

impl Taskable for Probe {
    fn check_task(&self, _check_kind: i32, _payload: &Value) -> Value {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.value.lock().clone()
    }

    fn identifier(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn wire_poke(&self, listener: PokeListener) {
        *self.listener.lock() = Some(listener);
    }

    fn unwire_poke(&self) {
        *self.listener.lock() = None;
    }
}

/// A taskable that echoes `payload` scaled by `check_kind`.
pub struct Scaler;

impl Taskable for Scaler {
    fn check_task(&self, check_kind: i32, payload: &Value) -> Value {
        match payload.as_int() {
            Some(n) => Value::Int(n * i64::from(check_kind)),
            None => Value::Absent,
        }
    }
}
