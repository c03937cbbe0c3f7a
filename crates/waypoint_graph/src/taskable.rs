//! Live data binding to externally owned objects.
//!
//! Simulated mechanisms (doors, gauges, switches) implement [`Taskable`] and
//! register themselves with a [`TaskableRegistry`]. User-task vertices pull
//! their value from the registry instead of being assigned directly.
//!
//! The registry holds [`Weak`] references: it never keeps a mechanism
//! alive, and entries whose owner has been dropped are pruned lazily on the
//! next query for that type.
//!
//! # Poke wiring
//!
//! A loaded scenario attaches one [`PokeListener`] with
//! [`attach`](TaskableRegistry::attach) and chooses which taskable types are
//! relevant with [`set_active_types`](TaskableRegistry::set_active_types).
//! Only members of active types receive the listener, so mechanisms that
//! play no part in the current scenario stay quiet. At most one listener is
//! attached at a time; a second `attach` fails until
//! [`detach`](TaskableRegistry::detach) is called.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use waypoint_graph::data::Value;
//! use waypoint_graph::taskable::{Taskable, TaskableRegistry, TaskableType};
//!
//! struct Gauge {
//!     side: &'static str,
//!     reading: f64,
//! }
//!
//! impl Taskable for Gauge {
//!     fn identifier(&self) -> Option<&str> {
//!         Some(self.side)
//!     }
//!
//!     fn check_task(&self, _check_kind: i32, _payload: &Value) -> Value {
//!         Value::Float(self.reading)
//!     }
//! }
//!
//! let registry = TaskableRegistry::new();
//! let left = Arc::new(Gauge { side: "left", reading: 1.0 });
//! let right = Arc::new(Gauge { side: "right", reading: 2.0 });
//! registry.register(&left);
//! registry.register(&right);
//!
//! let ty = TaskableType::of::<Gauge>();
//! assert_eq!(registry.query(ty, 0, &Value::Absent, Some("right")), Some(Value::Float(2.0)));
//! assert_eq!(registry.query(ty, 0, &Value::Absent, Some("middle")), None);
//! ```

use core::any::TypeId;
use core::fmt;
use std::sync::{Arc, Weak};

use hashbrown::{HashMap, HashSet};
use parking_lot::RwLock;

use crate::data::Value;

/// Callback a wired taskable invokes when its state changes.
pub type PokeListener = Arc<dyn Fn(Value) + Send + Sync>;

/// Contract implemented by every externally owned simulated object.
pub trait Taskable: Send + Sync + 'static {
    /// Computes the current value for the given check kind.
    fn check_task(&self, check_kind: i32, payload: &Value) -> Value;

    /// Disambiguates several registered instances of the same type.
    fn identifier(&self) -> Option<&str> {
        None
    }

    /// Called when this object's type becomes active for the loaded scenario.
    fn wire_poke(&self, _listener: PokeListener) {}

    /// Called when this object's type stops being active.
    fn unwire_poke(&self) {}
}

/// Registry key: the concrete Rust type of a taskable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskableType {
    id: TypeId,
    name: &'static str,
}

impl TaskableType {
    /// Returns the key for `T`.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: core::any::type_name::<T>(),
        }
    }

    /// Returns the Rust type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for TaskableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Errors raised by the poke wiring lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Another scenario's listener is still attached.
    #[error("a poke listener is already attached; detach the previous scenario first")]
    AlreadyAttached,
    /// Active types were requested with no listener attached.
    #[error("no poke listener is attached")]
    NotAttached,
}

#[derive(Default)]
struct RegistryState {
    members: HashMap<TaskableType, Vec<Weak<dyn Taskable>>>,
    active: HashSet<TaskableType>,
    listener: Option<PokeListener>,
}

/// Type-keyed registry of live taskable objects.
///
/// # Thread Safety
///
/// Interior mutability via [`RwLock`]. Taskable callbacks
/// ([`check_task`](Taskable::check_task), [`wire_poke`](Taskable::wire_poke))
/// always run after the lock is released, so they may call back into the
/// registry.
#[derive(Default)]
pub struct TaskableRegistry {
    state: RwLock<RegistryState>,
}

impl fmt::Debug for TaskableRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("TaskableRegistry")
            .field("types", &state.members.keys().map(TaskableType::name).collect::<Vec<_>>())
            .field("active", &state.active.len())
            .field("attached", &state.listener.is_some())
            .finish()
    }
}

impl TaskableRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a taskable under its concrete type.
    ///
    /// The registry keeps a weak reference only. If the type is currently
    /// active the object is wired immediately. Returns `false` if this exact
    /// object was already registered.
    pub fn register<T: Taskable>(&self, component: &Arc<T>) -> bool {
        let ty = TaskableType::of::<T>();
        let weak: Weak<dyn Taskable> = Arc::downgrade(component) as Weak<dyn Taskable>;

        let listener = {
            let mut guard = self.state.write();
            let state = &mut *guard;
            let list = state.members.entry(ty).or_default();
            if list.iter().any(|existing| Weak::ptr_eq(existing, &weak)) {
                return false;
            }
            list.push(weak);
            if state.active.contains(&ty) {
                state.listener.clone()
            } else {
                None
            }
        };

        if let Some(listener) = listener {
            component.wire_poke(listener);
        }
        tracing::debug!(taskable = ty.name(), "taskable registered");
        true
    }

    /// Removes a taskable. Returns `false` if it was not registered.
    pub fn unregister<T: Taskable>(&self, component: &Arc<T>) -> bool {
        let ty = TaskableType::of::<T>();
        let weak: Weak<dyn Taskable> = Arc::downgrade(component) as Weak<dyn Taskable>;

        let (removed, wired) = {
            let mut guard = self.state.write();
            let state = &mut *guard;
            let Some(list) = state.members.get_mut(&ty) else {
                return false;
            };
            let before = list.len();
            list.retain(|existing| !Weak::ptr_eq(existing, &weak));
            let removed = list.len() != before;
            (removed, removed && state.active.contains(&ty) && state.listener.is_some())
        };

        if wired {
            component.unwire_poke();
        }
        if removed {
            tracing::debug!(taskable = ty.name(), "taskable unregistered");
        }
        removed
    }

    /// Attaches the poke listener of the scenario being loaded.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyAttached`] while another listener is attached.
    pub fn attach(&self, listener: PokeListener) -> Result<(), RegistryError> {
        let mut state = self.state.write();
        if state.listener.is_some() {
            return Err(RegistryError::AlreadyAttached);
        }
        state.listener = Some(listener);
        Ok(())
    }

    /// Unwires every active member and drops the listener.
    pub fn detach(&self) {
        let unwire = {
            let mut guard = self.state.write();
            let state = &mut *guard;
            if state.listener.take().is_none() {
                return;
            }
            let active: Vec<TaskableType> = state.active.drain().collect();
            live_members(&state.members, &active)
        };

        for member in unwire {
            member.unwire_poke();
        }
        tracing::debug!("poke listener detached");
    }

    /// Replaces the set of active types, wiring and unwiring only the difference.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotAttached`] if no listener is attached.
    pub fn set_active_types(
        &self,
        types: impl IntoIterator<Item = TaskableType>,
    ) -> Result<(), RegistryError> {
        let requested: HashSet<TaskableType> = types.into_iter().collect();

        let (unwire, wire, listener) = {
            let mut guard = self.state.write();
            let state = &mut *guard;
            let listener = state.listener.clone().ok_or(RegistryError::NotAttached)?;
            let removed: Vec<TaskableType> =
                state.active.difference(&requested).copied().collect();
            let added: Vec<TaskableType> = requested.difference(&state.active).copied().collect();
            let unwire = live_members(&state.members, &removed);
            let wire = live_members(&state.members, &added);
            state.active = requested;
            (unwire, wire, listener)
        };

        tracing::debug!(
            unwired = unwire.len(),
            wired = wire.len(),
            "active taskable types updated"
        );
        for member in unwire {
            member.unwire_poke();
        }
        for member in wire {
            member.wire_poke(Arc::clone(&listener));
        }
        Ok(())
    }

    /// Returns whether a listener is attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.state.read().listener.is_some()
    }

    /// Returns whether the type is currently active.
    #[must_use]
    pub fn is_active(&self, ty: TaskableType) -> bool {
        self.state.read().active.contains(&ty)
    }

    /// Returns the number of live members of a type.
    #[must_use]
    pub fn live_count(&self, ty: TaskableType) -> usize {
        self.state
            .read()
            .members
            .get(&ty)
            .map_or(0, |list| list.iter().filter(|weak| weak.strong_count() > 0).count())
    }

    /// Pulls a value from a registered taskable of type `ty`.
    ///
    /// Dead entries for `ty` are pruned first. With an `identifier`, the
    /// single instance whose own identifier matches is queried; if none
    /// matches this logs and returns `None` rather than falling back to
    /// another instance. Without an identifier the first registered instance
    /// is used. Returns `None` when no instance is available.
    pub fn query(
        &self,
        ty: TaskableType,
        check_kind: i32,
        payload: &Value,
        identifier: Option<&str>,
    ) -> Option<Value> {
        let live: Vec<Arc<dyn Taskable>> = {
            let mut state = self.state.write();
            let list = state.members.get_mut(&ty)?;
            list.retain(|weak| weak.strong_count() > 0);
            list.iter().filter_map(Weak::upgrade).collect()
        };

        let source = match identifier {
            Some(wanted) => {
                let found = live
                    .into_iter()
                    .find(|member| member.identifier() == Some(wanted));
                if found.is_none() {
                    tracing::warn!(
                        taskable = ty.name(),
                        identifier = wanted,
                        "no registered taskable matches identifier"
                    );
                }
                found?
            }
            None => {
                let first = live.into_iter().next();
                if first.is_none() {
                    tracing::trace!(taskable = ty.name(), "no live taskable of this type");
                }
                first?
            }
        };

        Some(source.check_task(check_kind, payload))
    }
}

fn live_members(
    members: &HashMap<TaskableType, Vec<Weak<dyn Taskable>>>,
    types: &[TaskableType],
) -> Vec<Arc<dyn Taskable>> {
    types
        .iter()
        .filter_map(|ty| members.get(ty))
        .flatten()
        .filter_map(Weak::upgrade)
        .collect()
}
