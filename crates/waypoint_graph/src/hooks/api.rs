//! Hook registration API for scenario controllers.
//!
//! The [`HooksAPI`] holds named observers that react to [`GraphEvent`]s.
//! Observers either receive every event ([`register_observer`](HooksAPI::register_observer))
//! or only the kinds they ask for ([`register_filtered`](HooksAPI::register_filtered)).
//!
//! # Example
//!
//! ```
//! use waypoint_graph::hooks::{EventKind, GraphEvent, HooksAPI};
//!
//! let hooks = HooksAPI::new();
//! hooks
//!     .register_observer("logger", |event: &GraphEvent| {
//!         tracing::info!(event = %event, "scenario event");
//!     })?
//!     .register_filtered("finish", [EventKind::GraphEnded], |_: &GraphEvent| {
//!         println!("done");
//!     })?;
//! # Ok::<(), waypoint_graph::hooks::HookRegistrationError>(())
//! ```

use std::sync::Arc;

use hashbrown::HashSet;
use parking_lot::RwLock;
use thiserror::Error;

use super::events::{EventKind, GraphEvent};

type Observer = Arc<dyn Fn(&GraphEvent) + Send + Sync>;

// ─────────────────────────────────────────────────────────────────────────────
// HookRegistrationError
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during hook registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookRegistrationError {
    /// An observer with this name already exists.
    #[error("hook '{name}' already registered")]
    DuplicateName {
        /// The duplicate hook name.
        name: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// HookEntry
// ─────────────────────────────────────────────────────────────────────────────

struct HookEntry {
    /// Human-readable name for debugging and removal.
    name: String,
    /// Kinds this observer wants; `None` means all.
    kinds: Option<HashSet<EventKind>>,
    hook: Observer,
}

impl HookEntry {
    fn wants(&self, kind: EventKind) -> bool {
        self.kinds.as_ref().is_none_or(|kinds| kinds.contains(&kind))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HooksAPI
// ─────────────────────────────────────────────────────────────────────────────

/// Registry of named event observers.
///
/// # Thread Safety
///
/// Registration takes `&self` behind a [`RwLock`]. Observers are invoked
/// after the lock is released, so an observer may register or remove hooks.
#[derive(Default)]
pub struct HooksAPI {
    hooks: RwLock<Vec<HookEntry>>,
}

impl core::fmt::Debug for HooksAPI {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let hooks = self.hooks.read();
        f.debug_struct("HooksAPI")
            .field("hooks", &hooks.iter().map(|entry| &entry.name).collect::<Vec<_>>())
            .finish()
    }
}

impl HooksAPI {
    /// Creates a new empty hooks registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer for every event.
    ///
    /// # Errors
    ///
    /// Returns [`HookRegistrationError::DuplicateName`] if the name is taken.
    pub fn register_observer<F>(
        &self,
        name: impl Into<String>,
        hook: F,
    ) -> Result<&Self, HookRegistrationError>
    where
        F: Fn(&GraphEvent) + Send + Sync + 'static,
    {
        self.insert(name.into(), None, Arc::new(hook))?;
        Ok(self)
    }

    /// Registers an observer for the given event kinds only.
    ///
    /// # Errors
    ///
    /// Returns [`HookRegistrationError::DuplicateName`] if the name is taken.
    pub fn register_filtered<F>(
        &self,
        name: impl Into<String>,
        kinds: impl IntoIterator<Item = EventKind>,
        hook: F,
    ) -> Result<&Self, HookRegistrationError>
    where
        F: Fn(&GraphEvent) + Send + Sync + 'static,
    {
        let kinds = kinds.into_iter().collect();
        self.insert(name.into(), Some(kinds), Arc::new(hook))?;
        Ok(self)
    }

    fn insert(
        &self,
        name: String,
        kinds: Option<HashSet<EventKind>>,
        hook: Observer,
    ) -> Result<(), HookRegistrationError> {
        let mut hooks = self.hooks.write();
        if hooks.iter().any(|entry| entry.name == name) {
            return Err(HookRegistrationError::DuplicateName { name });
        }
        hooks.push(HookEntry { name, kinds, hook });
        Ok(())
    }

    /// Removes an observer. Returns `false` if no observer had that name.
    pub fn unregister(&self, name: &str) -> bool {
        let mut hooks = self.hooks.write();
        let before = hooks.len();
        hooks.retain(|entry| entry.name != name);
        hooks.len() != before
    }

    /// Invokes every interested observer in registration order.
    pub fn invoke(&self, event: &GraphEvent) {
        let kind = event.kind();
        let observers: Vec<Observer> = self
            .hooks
            .read()
            .iter()
            .filter(|entry| entry.wants(kind))
            .map(|entry| Arc::clone(&entry.hook))
            .collect();

        for observer in observers {
            observer(event);
        }
    }

    /// Returns the number of registered observers.
    #[must_use]
    pub fn hook_count(&self) -> usize {
        self.hooks.read().len()
    }

    /// Checks if an observer with the given name exists.
    #[must_use]
    pub fn contains_hook(&self, name: &str) -> bool {
        self.hooks.read().iter().any(|entry| entry.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertex::VertexId;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ended() -> GraphEvent {
        GraphEvent::GraphEnded {
            end: VertexId::new(1),
        }
    }

    #[test]
    fn register_increments_count() {
        let api = HooksAPI::new();
        api.register_observer("first", |_: &GraphEvent| {})
            .expect("registration should succeed");
        api.register_observer("second", |_: &GraphEvent| {})
            .expect("registration should succeed");
        assert_eq!(api.hook_count(), 2);
        assert!(api.contains_hook("second"));
    }

    #[test]
    fn invoke_calls_hooks_in_order() {
        let api = HooksAPI::new();
        let execution_order = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let order_clone = Arc::clone(&execution_order);
            api.register_observer(name, move |_: &GraphEvent| {
                order_clone.lock().unwrap().push(name);
            })
            .expect("registration should succeed");
        }

        api.invoke(&ended());
        assert_eq!(
            *execution_order.lock().unwrap(),
            vec!["first", "second", "third"],
            "hooks should execute in registration order"
        );
    }

    #[test]
    fn duplicate_names_rejected() {
        let api = HooksAPI::new();
        api.register_observer("dup", |_: &GraphEvent| {}).unwrap();
        let result = api.register_filtered("dup", [EventKind::GraphEnded], |_: &GraphEvent| {});
        assert_eq!(
            result.err(),
            Some(HookRegistrationError::DuplicateName { name: "dup".into() })
        );
    }

    #[test]
    fn filtered_observer_only_sees_requested_kinds() {
        let api = HooksAPI::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);
        api.register_filtered("ends", [EventKind::GraphEnded], move |_: &GraphEvent| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        api.invoke(&GraphEvent::ProgressBlocked {
            vertex: VertexId::new(0),
        });
        api.invoke(&ended());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unregister_removes_observer() {
        let api = HooksAPI::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);
        api.register_observer("count", move |_: &GraphEvent| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        assert!(api.unregister("count"));
        assert!(!api.unregister("count"));
        api.invoke(&ended());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn observer_may_register_during_invoke() {
        let api = Arc::new(HooksAPI::new());
        let inner = Arc::clone(&api);
        api.register_observer("spawner", move |_: &GraphEvent| {
            let _ = inner.register_observer("spawned", |_: &GraphEvent| {});
        })
        .unwrap();

        api.invoke(&ended());
        assert!(api.contains_hook("spawned"));
    }
}
