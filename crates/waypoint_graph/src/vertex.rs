//! Vertex types for scenario graphs.
//!
//! A vertex is one step of a training procedure. It carries a [`GraphData`]
//! value, ordered enter/leave callback lists, and an optional hook that is
//! told whenever a reliant check decides whether the step is complete.
//!
//! User-task vertices ([`VertexKind::UserTask`]) never take values directly:
//! every refresh pulls the live value from the [`TaskableRegistry`].

use core::fmt;

use crate::data::{GraphData, Value};
use crate::edge::Edge;
use crate::taskable::{Taskable, TaskableRegistry, TaskableType};

/// Unique identifier for a vertex.
///
/// Allocated from a monotonically increasing counter; see
/// [`IdAllocator`](crate::graph::IdAllocator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(pub(crate) usize);

impl VertexId {
    /// Creates a new vertex ID.
    #[must_use]
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vertex_{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Callbacks
// ─────────────────────────────────────────────────────────────────────────────

/// Callback fired with the edge used to enter or leave a vertex.
///
/// The edge is `None` when entering the start vertex.
pub type EdgeCallback = dyn Fn(Option<&Edge>) + Send + Sync;

/// Callback told the outcome of a completion check. Returns `true` if the
/// step's completion state flipped.
pub type CompletionCallback = dyn Fn(bool) -> bool + Send + Sync;

/// Handle returned by [`CallbackList::subscribe`], used to detach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

/// An ordered list of subscribers, invoked in registration order.
pub struct CallbackList<F: ?Sized> {
    entries: Vec<(CallbackId, Box<F>)>,
    next_id: u64,
}

impl<F: ?Sized> Default for CallbackList<F> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }
}

impl<F: ?Sized> CallbackList<F> {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a subscriber.
    pub fn subscribe(&mut self, callback: Box<F>) -> CallbackId {
        let id = CallbackId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, callback));
        id
    }

    /// Removes a subscriber. Returns `false` if it was not present.
    pub fn detach(&mut self, id: CallbackId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    /// Returns the number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates subscribers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &F> {
        self.entries.iter().map(|(_, callback)| callback.as_ref())
    }
}

impl<F: ?Sized> fmt::Debug for CallbackList<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackList")
            .field("len", &self.entries.len())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// User tasks
// ─────────────────────────────────────────────────────────────────────────────

/// Progress of a user task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Never entered.
    #[default]
    NotStarted,
    /// Entered, not yet complete.
    Started,
    /// A completion check succeeded.
    Complete,
    /// Marked failed by a collaborator.
    Failed,
    /// Was complete, then a later check failed.
    Undone,
}

/// Binding of a vertex to a taskable source.
#[derive(Debug, Clone, PartialEq)]
pub struct UserTask {
    source: Option<TaskableType>,
    check_kind: i32,
    identifier: Option<String>,
    payload: Value,
    state: TaskState,
}

impl UserTask {
    /// Binds to the first (or identified) registered taskable of type `T`.
    #[must_use]
    pub fn new<T: Taskable>(check_kind: i32) -> Self {
        Self {
            source: Some(TaskableType::of::<T>()),
            check_kind,
            identifier: None,
            payload: Value::Absent,
            state: TaskState::NotStarted,
        }
    }

    /// A task with no source. The vertex then behaves like a plain vertex.
    #[must_use]
    pub fn unbound() -> Self {
        Self {
            source: None,
            check_kind: 0,
            identifier: None,
            payload: Value::Absent,
            state: TaskState::NotStarted,
        }
    }

    /// Selects one instance among several of the same type.
    #[must_use]
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Sets the constant payload passed to [`Taskable::check_task`].
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Returns the bound taskable type.
    #[must_use]
    pub fn source(&self) -> Option<TaskableType> {
        self.source
    }

    /// Returns the check kind.
    #[must_use]
    pub fn check_kind(&self) -> i32 {
        self.check_kind
    }

    /// Returns the instance identifier.
    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// Returns the constant payload.
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Returns the task state.
    #[must_use]
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Overrides the task state (e.g. to mark it failed).
    pub fn set_state(&mut self, state: TaskState) {
        self.state = state;
    }

    fn record_completion(&mut self, complete: bool) -> bool {
        let next = match (complete, self.state) {
            (true, TaskState::Complete) => return false,
            (true, _) => TaskState::Complete,
            (false, TaskState::Complete) => TaskState::Undone,
            (false, _) => return false,
        };
        self.state = next;
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Vertex
// ─────────────────────────────────────────────────────────────────────────────

/// What a vertex draws its value from.
#[derive(Debug, Clone, PartialEq)]
pub enum VertexKind {
    /// Value is assigned by pokes and propagation.
    Plain,
    /// Value is pulled from the taskable registry.
    UserTask(UserTask),
}

/// A step in a training procedure.
pub struct Vertex {
    id: VertexId,
    name: String,
    data: GraphData,
    kind: VertexKind,
    on_enter: CallbackList<EdgeCallback>,
    on_leave: CallbackList<EdgeCallback>,
    on_completion_checked: Option<Box<CompletionCallback>>,
}

impl Vertex {
    pub(crate) fn new(id: VertexId, name: impl Into<String>, data: GraphData, kind: VertexKind) -> Self {
        Self {
            id,
            name: name.into(),
            data,
            kind,
            on_enter: CallbackList::new(),
            on_leave: CallbackList::new(),
            on_completion_checked: None,
        }
    }

    /// Returns the vertex ID.
    #[must_use]
    pub fn id(&self) -> VertexId {
        self.id
    }

    /// Returns the human-readable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current data.
    #[must_use]
    pub fn data(&self) -> &GraphData {
        &self.data
    }

    /// Returns the current value.
    #[must_use]
    pub fn value(&self) -> &Value {
        self.data.value()
    }

    /// Returns the vertex kind.
    #[must_use]
    pub fn kind(&self) -> &VertexKind {
        &self.kind
    }

    /// Returns the user task binding, if any.
    #[must_use]
    pub fn user_task(&self) -> Option<&UserTask> {
        match &self.kind {
            VertexKind::UserTask(task) => Some(task),
            VertexKind::Plain => None,
        }
    }

    /// Returns the user task binding mutably, if any.
    pub fn user_task_mut(&mut self) -> Option<&mut UserTask> {
        match &mut self.kind {
            VertexKind::UserTask(task) => Some(task),
            VertexKind::Plain => None,
        }
    }

    /// Subscribes to entry into this vertex.
    pub fn on_enter(&mut self, callback: impl Fn(Option<&Edge>) + Send + Sync + 'static) -> CallbackId {
        self.on_enter.subscribe(Box::new(callback))
    }

    /// Subscribes to departure from this vertex.
    pub fn on_leave(&mut self, callback: impl Fn(Option<&Edge>) + Send + Sync + 'static) -> CallbackId {
        self.on_leave.subscribe(Box::new(callback))
    }

    /// Removes an enter subscriber.
    pub fn detach_enter(&mut self, id: CallbackId) -> bool {
        self.on_enter.detach(id)
    }

    /// Removes a leave subscriber.
    pub fn detach_leave(&mut self, id: CallbackId) -> bool {
        self.on_leave.detach(id)
    }

    /// Installs the completion-check hook, replacing any previous one.
    pub fn on_completion_checked(&mut self, callback: impl Fn(bool) -> bool + Send + Sync + 'static) {
        self.on_completion_checked = Some(Box::new(callback));
    }

    /// Removes the completion-check hook.
    pub fn clear_completion_checked(&mut self) {
        self.on_completion_checked = None;
    }

    /// Assigns directly, honoring the type lock.
    ///
    /// A user task bound to a taskable type only takes values from the
    /// registry, so this returns `false` and leaves it unchanged.
    pub fn assign(&mut self, value: impl Into<Value>) -> bool {
        if self.user_task().is_some_and(|task| task.source.is_some()) {
            tracing::trace!(vertex = %self.id, "direct assignment to a bound user task ignored");
            return false;
        }
        self.data.assign(value)
    }

    /// Brings the value up to date.
    ///
    /// A user task bound to a taskable type queries the registry and ignores
    /// `incoming`; if the taskable is unavailable the value is left as is.
    /// Any other vertex assigns `incoming` when present.
    ///
    /// Returns `true` if a value was stored.
    pub fn refresh(&mut self, registry: &TaskableRegistry, incoming: Option<Value>) -> bool {
        if let VertexKind::UserTask(task) = &self.kind
            && let Some(source) = task.source
        {
            return match registry.query(source, task.check_kind, &task.payload, task.identifier.as_deref()) {
                Some(value) => self.data.assign(value),
                None => {
                    tracing::trace!(vertex = %self.id, taskable = source.name(), "taskable unavailable");
                    false
                }
            };
        }

        match incoming {
            Some(value) => self.data.assign(value),
            None => false,
        }
    }

    pub(crate) fn fire_enter(&self, edge: Option<&Edge>) {
        for callback in self.on_enter.iter() {
            callback(edge);
        }
    }

    pub(crate) fn fire_leave(&self, edge: Option<&Edge>) {
        for callback in self.on_leave.iter() {
            callback(edge);
        }
    }

    pub(crate) fn mark_entered(&mut self) {
        if let VertexKind::UserTask(task) = &mut self.kind
            && matches!(task.state, TaskState::NotStarted | TaskState::Undone)
        {
            task.state = TaskState::Started;
        }
    }

    /// Records a completion outcome. Returns `true` if the completion state flipped.
    pub(crate) fn report_completion(&mut self, complete: bool) -> bool {
        let mut flipped = match &mut self.kind {
            VertexKind::UserTask(task) => task.record_completion(complete),
            VertexKind::Plain => false,
        };
        if let Some(callback) = &self.on_completion_checked {
            flipped |= callback(complete);
        }
        flipped
    }
}

impl fmt::Debug for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vertex")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("data", &self.data)
            .field("kind", &self.kind)
            .field("on_enter", &self.on_enter)
            .field("on_leave", &self.on_leave)
            .field("has_completion_hook", &self.on_completion_checked.is_some())
            .finish()
    }
}
