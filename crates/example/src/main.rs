//! Cockpit start-up drill.
//!
//! Runs the scripted checklist from the `example` library against simulated
//! mechanisms and logs every scenario event.
//!
//! # Usage
//!
//! ```bash
//! WAYPOINT_LOG=info WAYPOINT_LOG_FORMAT=compact drill
//! ```

use std::sync::Arc;

use example::mechanisms::{self, Gauge, Switch};
use example::{BATTERY_BUTTON, TAXI_BUTTON, announce_steps, build_checklist};
use waypoint_graph::prelude::*;
use waypoint_tracing::TracingConfig;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    TracingConfig::from_env().init();

    let registry = Arc::new(TaskableRegistry::new());
    let fuel_pump = Arc::new(Switch::new("fuel_pump"));
    let nav_lights = Arc::new(Switch::new("nav_lights"));
    let oil = Arc::new(Gauge::new("oil", 0.0));
    registry.register(&fuel_pump);
    registry.register(&nav_lights);
    registry.register(&oil);

    let mut checklist = build_checklist(Graph::new())?;
    announce_steps(&mut checklist.graph);

    let controller = GraphController::new(
        checklist.graph,
        checklist.brief,
        checklist.taxi,
        Arc::clone(&registry),
    )?;
    controller
        .hooks()
        .register_observer("drill-log", |event: &GraphEvent| {
            tracing::info!(event = %event, "scenario event");
        })?
        .register_filtered("blocked", [EventKind::ProgressBlocked], |event: &GraphEvent| {
            tracing::warn!(vertex = %event.vertex_id(), "that did not complete the step");
        })?;

    let session = ScenarioSession::load(controller, mechanisms::active_types())?;
    session.start()?;

    session.press_button(BATTERY_BUTTON)?;
    fuel_pump.set(true);
    oil.set_reading(12.0);
    oil.set_reading(41.5);
    // Taxi is requested before the nav lights are on, so the first press stalls.
    session.press_button(TAXI_BUTTON)?;
    nav_lights.set(true);

    tracing::info!(finished = session.is_finished(), "drill complete");
    session.unload();
    Ok(())
}
