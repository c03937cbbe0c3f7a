//! A loaded scenario wired to its taskables.
//!
//! [`ScenarioSession`] owns a [`GraphController`] and attaches it to the
//! controller's [`TaskableRegistry`] for as long as the session lives. Wired
//! taskables poke the session through the registry's listener.
//!
//! Pokes can arrive while a progression is already running, for instance
//! from a vertex enter callback or from a taskable queried mid-evaluation.
//! Those pokes are queued and processed by the call that is already
//! driving the controller, after its current progression returns.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use waypoint_graph::prelude::*;
//!
//! let mut graph = Graph::with_allocator(IdAllocator::new());
//! let a = graph.add_vertex("a", GraphData::empty());
//! let b = graph.add_vertex("b", GraphData::empty());
//! graph.add_traversable(a, b, GraphData::button("engage"))?;
//!
//! let registry = Arc::new(TaskableRegistry::new());
//! let controller = GraphController::new(graph, a, b, Arc::clone(&registry))?;
//! let session = ScenarioSession::load(controller, [])?;
//! session.start()?;
//! assert!(session.press_button("engage")?.finished);
//!
//! session.unload();
//! assert!(!registry.is_attached());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::controller::{ControllerError, GraphController, Progress};
use crate::data::{Value, button_value};
use crate::taskable::{TaskableRegistry, TaskableType};
use crate::vertex::VertexId;

/// A scenario attached to its taskable registry.
pub struct ScenarioSession {
    controller: Mutex<GraphController>,
    pending: Mutex<VecDeque<Value>>,
    registry: Arc<TaskableRegistry>,
    loaded: AtomicBool,
    // Snapshot of the controller, refreshed whenever a call releases it.
    current: AtomicUsize,
    finished: AtomicBool,
}

const NO_VERTEX: usize = usize::MAX;

impl core::fmt::Debug for ScenarioSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScenarioSession")
            .field("pending", &self.pending.lock().len())
            .field("loaded", &self.loaded.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl ScenarioSession {
    /// Attaches `controller` to its registry and wires `active_types`.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Registry`] if another scenario is still attached.
    pub fn load(
        controller: GraphController,
        active_types: impl IntoIterator<Item = TaskableType>,
    ) -> Result<Arc<Self>, ControllerError> {
        let registry = Arc::clone(controller.registry());
        let session = Arc::new(Self {
            controller: Mutex::new(controller),
            pending: Mutex::new(VecDeque::new()),
            registry: Arc::clone(&registry),
            loaded: AtomicBool::new(false),
            current: AtomicUsize::new(NO_VERTEX),
            finished: AtomicBool::new(false),
        });

        let weak = Arc::downgrade(&session);
        registry.attach(Arc::new(move |value: Value| {
            let Some(session) = weak.upgrade() else {
                return;
            };
            if let Err(err) = session.poke(value) {
                tracing::warn!(error = %err, "taskable poke failed");
            }
        }))?;
        session.loaded.store(true, Ordering::Release);

        registry.set_active_types(active_types)?;
        tracing::debug!("scenario loaded");
        Ok(session)
    }

    /// Detaches the registry listener and unwires every active taskable.
    ///
    /// Called automatically on drop. Further calls do nothing.
    pub fn unload(&self) {
        if self.loaded.swap(false, Ordering::AcqRel) {
            self.registry.detach();
            tracing::debug!("scenario unloaded");
        }
    }

    /// Returns `true` until [`unload`](Self::unload).
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Starts the scenario, then processes any pokes raised meanwhile.
    ///
    /// Must not be called from inside a vertex callback of this session.
    ///
    /// # Errors
    ///
    /// See [`GraphController::start`].
    pub fn start(&self) -> Result<Progress, ControllerError> {
        let started = {
            let mut controller = self.controller.lock();
            let started = controller.start();
            self.snapshot(&controller);
            started?
        };
        let queued = self.drain()?;
        Ok(merge(started, queued))
    }

    /// Queues `data` and, unless another call is already driving the
    /// controller, processes the queue.
    ///
    /// A poke made while the controller is busy returns an empty
    /// [`Progress`]; its effect is applied by the busy caller.
    ///
    /// # Errors
    ///
    /// See [`GraphController::poke`].
    pub fn poke(&self, data: impl Into<Value>) -> Result<Progress, ControllerError> {
        self.pending.lock().push_back(data.into());
        self.drain()
    }

    /// Pokes the well-known value of the named button.
    ///
    /// # Errors
    ///
    /// See [`poke`](Self::poke).
    pub fn press_button(&self, name: &str) -> Result<Progress, ControllerError> {
        self.poke(button_value(name))
    }

    /// Returns the number of pokes waiting to be processed.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns the current vertex as of the last completed call.
    ///
    /// Never blocks, so it is safe to call from a vertex callback or hook
    /// observer while a progression is running.
    #[must_use]
    pub fn current(&self) -> Option<VertexId> {
        match self.current.load(Ordering::Acquire) {
            NO_VERTEX => None,
            index => Some(VertexId::new(index)),
        }
    }

    /// Returns whether the scenario reached its end vertex.
    ///
    /// Never blocks; see [`current`](Self::current).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Runs `f` with exclusive access to the controller.
    ///
    /// Must not be called from a vertex callback or hook observer of this
    /// session; the controller lock is not re-entrant.
    pub fn with_controller<R>(&self, f: impl FnOnce(&mut GraphController) -> R) -> R {
        let mut controller = self.controller.lock();
        let result = f(&mut controller);
        self.snapshot(&controller);
        result
    }

    fn snapshot(&self, controller: &GraphController) {
        let current = controller.current().map_or(NO_VERTEX, |id| id.index());
        self.current.store(current, Ordering::Release);
        self.finished.store(controller.is_finished(), Ordering::Release);
    }

    fn next_pending(&self) -> Option<Value> {
        self.pending.lock().pop_front()
    }

    fn drain(&self) -> Result<Progress, ControllerError> {
        let mut total = Progress::default();
        loop {
            let Some(mut controller) = self.controller.try_lock() else {
                return Ok(total);
            };
            while let Some(value) = self.next_pending() {
                let progress = controller.poke(value);
                self.snapshot(&controller);
                total = merge(total, progress?);
            }
            total.finished = controller.is_finished();
            drop(controller);

            // A poke may have been queued between the last pop and the unlock.
            if self.pending.lock().is_empty() {
                return Ok(total);
            }
        }
    }
}

impl Drop for ScenarioSession {
    fn drop(&mut self) {
        self.unload();
    }
}

fn merge(first: Progress, second: Progress) -> Progress {
    Progress {
        transitions: first.transitions + second.transitions,
        finished: first.finished || second.finished,
    }
}
