//! Simulated cockpit mechanisms.
//!
//! Each mechanism owns its state and reports it to the scenario through
//! the [`Taskable`] contract. When its type is active it also pokes the
//! loaded scenario whenever that state changes.

use parking_lot::Mutex;
use waypoint_graph::data::Value;
use waypoint_graph::taskable::{PokeListener, Taskable, TaskableType};

/// Check kind: current numeric reading of a gauge.
pub const READING: i32 = 0;

/// Check kind: on/off position of a switch.
pub const POSITION: i32 = 1;

/// Taskable types the drill wires while loaded.
#[must_use]
pub fn active_types() -> [TaskableType; 2] {
    [TaskableType::of::<Gauge>(), TaskableType::of::<Switch>()]
}

/// Holds the listener a mechanism pokes when its state changes.
#[derive(Default)]
struct Wiring {
    listener: Mutex<Option<PokeListener>>,
}

impl Wiring {
    fn notify(&self, value: Value) {
        let listener = self.listener.lock().clone();
        if let Some(listener) = listener {
            listener(value);
        }
    }

    fn set(&self, listener: Option<PokeListener>) {
        *self.listener.lock() = listener;
    }

    fn is_wired(&self) -> bool {
        self.listener.lock().is_some()
    }
}

/// An analogue gauge, e.g. oil pressure in psi.
pub struct Gauge {
    name: String,
    reading: Mutex<f64>,
    wiring: Wiring,
}

impl Gauge {
    /// Creates a gauge showing `reading`.
    #[must_use]
    pub fn new(name: impl Into<String>, reading: f64) -> Self {
        Self {
            name: name.into(),
            reading: Mutex::new(reading),
            wiring: Wiring::default(),
        }
    }

    /// Moves the needle and pokes the scenario if wired.
    pub fn set_reading(&self, reading: f64) {
        *self.reading.lock() = reading;
        tracing::debug!(gauge = %self.name, reading, "gauge moved");
        self.wiring.notify(Value::Float(reading));
    }

    /// Returns the current reading.
    #[must_use]
    pub fn reading(&self) -> f64 {
        *self.reading.lock()
    }

    /// Returns whether the scenario listens to this gauge.
    #[must_use]
    pub fn is_wired(&self) -> bool {
        self.wiring.is_wired()
    }
}

impl Taskable for Gauge {
    fn check_task(&self, check_kind: i32, _payload: &Value) -> Value {
        match check_kind {
            READING => Value::Float(self.reading()),
            _ => Value::Absent,
        }
    }

    fn identifier(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn wire_poke(&self, listener: PokeListener) {
        self.wiring.set(Some(listener));
    }

    fn unwire_poke(&self) {
        self.wiring.set(None);
    }
}

/// A two-position panel switch.
pub struct Switch {
    name: String,
    on: Mutex<bool>,
    wiring: Wiring,
}

impl Switch {
    /// Creates a switch in the off position.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            on: Mutex::new(false),
            wiring: Wiring::default(),
        }
    }

    /// Flips the switch and pokes the scenario if wired.
    pub fn set(&self, on: bool) {
        *self.on.lock() = on;
        tracing::debug!(switch = %self.name, on, "switch flipped");
        self.wiring.notify(Value::Bool(on));
    }

    /// Returns the switch position.
    #[must_use]
    pub fn is_on(&self) -> bool {
        *self.on.lock()
    }
}

impl Taskable for Switch {
    fn check_task(&self, check_kind: i32, _payload: &Value) -> Value {
        match check_kind {
            POSITION => Value::Bool(self.is_on()),
            _ => Value::Absent,
        }
    }

    fn identifier(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn wire_poke(&self, listener: PokeListener) {
        self.wiring.set(Some(listener));
    }

    fn unwire_poke(&self) {
        self.wiring.set(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn gauge_reports_reading_by_kind() {
        let gauge = Gauge::new("oil", 12.5);
        assert_eq!(gauge.check_task(READING, &Value::Absent), Value::Float(12.5));
        assert_eq!(gauge.check_task(POSITION, &Value::Absent), Value::Absent);
        assert_eq!(gauge.identifier(), Some("oil"));
    }

    #[test]
    fn switch_pokes_only_when_wired() {
        let switch = Switch::new("fuel_pump");
        let pokes = Arc::new(AtomicUsize::new(0));
        switch.set(true);

        let counter = Arc::clone(&pokes);
        switch.wire_poke(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        switch.set(false);
        switch.unwire_poke();
        switch.set(true);

        assert_eq!(pokes.load(Ordering::SeqCst), 1);
        assert!(switch.is_on());
    }
}
