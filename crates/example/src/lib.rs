//! Example cockpit start-up drill built with Waypoint.
//!
//! The drill walks a trainee through a short start-up checklist. Each step
//! exercises a different part of the engine.
//!
//! # Procedure
//!
//! ```text
//!  brief ──always──▶ battery ──[battery button]──▶ fuel pump ──[on]──▶ oil pressure
//!                                                     │                    │
//!                                               data-check            [> 25 psi]
//!                                                     ▼                    ▼
//!                                                 fuel log            ready for taxi ──[taxi button]──▶ taxi
//!                                                                          │
//!                                                                       reliant
//!                                                                          ▼
//!                                                                      nav lights ◀─┐
//!                                                                          └────────┘
//! ```
//!
//! - The battery and taxi steps wait for named UI buttons.
//! - The fuel pump, oil pressure and nav lights steps pull their values from
//!   [`mechanisms`] through the taskable registry.
//! - The fuel log mirrors the pump position through a data-check edge.
//! - Taxi is only possible once the nav lights side-branch is complete.

pub mod mechanisms;

use waypoint_graph::data::{DataType, GraphData, SpecialCase};
use waypoint_graph::edge::ReliantOptions;
use waypoint_graph::graph::{Graph, GraphError};
use waypoint_graph::vertex::{UserTask, VertexId};

use mechanisms::{Gauge, POSITION, READING, Switch};

/// Button that closes the battery master.
pub const BATTERY_BUTTON: &str = "battery";

/// Button that requests taxi clearance.
pub const TAXI_BUTTON: &str = "taxi";

/// Minimum oil pressure, in psi.
pub const MIN_OIL_PRESSURE: f64 = 25.0;

/// The drill graph and the ids of its steps.
#[derive(Debug)]
pub struct Checklist {
    /// The procedure.
    pub graph: Graph,
    /// Start vertex.
    pub brief: VertexId,
    /// Waits for the battery button.
    pub battery: VertexId,
    /// Waits for the fuel pump switch.
    pub fuel_pump: VertexId,
    /// Mirrors the fuel pump position.
    pub fuel_log: VertexId,
    /// Waits for oil pressure to build.
    pub oil_pressure: VertexId,
    /// Waits for the taxi button and the nav lights.
    pub ready: VertexId,
    /// Side-branch: nav lights on.
    pub nav_lights: VertexId,
    /// End vertex.
    pub taxi: VertexId,
}

/// Builds the start-up checklist into `graph`.
///
/// # Errors
///
/// Returns [`GraphError`] if an edge refers to a missing vertex.
pub fn build_checklist(mut graph: Graph) -> Result<Checklist, GraphError> {
    let brief = graph.add_vertex("brief", GraphData::empty());
    let battery = graph.add_vertex("battery master", GraphData::locked(DataType::Str));
    let fuel_pump = graph.add_user_task(
        "fuel pump",
        UserTask::new::<Switch>(POSITION).with_identifier("fuel_pump"),
    );
    let fuel_log = graph.add_vertex("fuel log", GraphData::empty());
    let oil_pressure = graph.add_user_task(
        "oil pressure",
        UserTask::new::<Gauge>(READING).with_identifier("oil"),
    );
    let ready = graph.add_vertex("ready for taxi", GraphData::locked(DataType::Str));
    let nav_lights = graph.add_user_task(
        "nav lights",
        UserTask::new::<Switch>(POSITION).with_identifier("nav_lights"),
    );
    let taxi = graph.add_vertex("taxi", GraphData::empty());

    graph.add_traversable(brief, battery, GraphData::always())?;
    graph.add_traversable(battery, fuel_pump, GraphData::button(BATTERY_BUTTON))?;
    graph.add_traversable(fuel_pump, oil_pressure, GraphData::new(true))?;
    graph.add_data_check(fuel_pump, fuel_log)?;
    graph.add_traversable(
        oil_pressure,
        ready,
        GraphData::new(MIN_OIL_PRESSURE).with_special(SpecialCase::GreaterThanFloat),
    )?;
    graph.add_traversable(ready, taxi, GraphData::button(TAXI_BUTTON))?;
    graph.add_reliant(ready, nav_lights, GraphData::new(true), ReliantOptions::new())?;
    graph.add_traversable(nav_lights, nav_lights, GraphData::always())?;

    Ok(Checklist {
        graph,
        brief,
        battery,
        fuel_pump,
        fuel_log,
        oil_pressure,
        ready,
        nav_lights,
        taxi,
    })
}

/// Logs every step as it is entered.
pub fn announce_steps(graph: &mut Graph) {
    let steps: Vec<(VertexId, String)> = graph
        .vertices()
        .iter()
        .map(|vertex| (vertex.id(), vertex.name().to_owned()))
        .collect();

    for (id, name) in steps {
        if let Some(vertex) = graph.vertex_mut(id) {
            vertex.on_enter(move |_| tracing::info!(step = %name, "step entered"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use waypoint_graph::controller::GraphController;
    use waypoint_graph::graph::IdAllocator;
    use waypoint_graph::session::ScenarioSession;
    use waypoint_graph::taskable::TaskableRegistry;

    struct Cockpit {
        registry: Arc<TaskableRegistry>,
        fuel_pump: Arc<Switch>,
        nav_lights: Arc<Switch>,
        oil: Arc<Gauge>,
    }

    fn cockpit() -> Cockpit {
        let cockpit = Cockpit {
            registry: Arc::new(TaskableRegistry::new()),
            fuel_pump: Arc::new(Switch::new("fuel_pump")),
            nav_lights: Arc::new(Switch::new("nav_lights")),
            oil: Arc::new(Gauge::new("oil", 0.0)),
        };
        cockpit.registry.register(&cockpit.fuel_pump);
        cockpit.registry.register(&cockpit.nav_lights);
        cockpit.registry.register(&cockpit.oil);
        cockpit
    }

    #[test]
    fn checklist_validates() {
        let checklist = build_checklist(Graph::with_allocator(IdAllocator::new())).unwrap();
        assert!(checklist.graph.validate(checklist.brief, checklist.taxi).is_ok());
        assert!(checklist.graph.is_leaf(checklist.nav_lights));
    }

    #[test]
    fn drill_runs_to_taxi() {
        let cockpit = cockpit();
        let checklist = build_checklist(Graph::with_allocator(IdAllocator::new())).unwrap();
        let ids = (checklist.battery, checklist.fuel_pump, checklist.oil_pressure, checklist.ready);
        let fuel_log = checklist.fuel_log;
        let controller = GraphController::new(
            checklist.graph,
            checklist.brief,
            checklist.taxi,
            Arc::clone(&cockpit.registry),
        )
        .unwrap();
        let session = ScenarioSession::load(controller, mechanisms::active_types()).unwrap();
        assert!(cockpit.oil.is_wired());

        session.start().unwrap();
        assert_eq!(session.current(), Some(ids.0));

        session.press_button(BATTERY_BUTTON).unwrap();
        assert_eq!(session.current(), Some(ids.1));

        cockpit.fuel_pump.set(true);
        assert_eq!(session.current(), Some(ids.2));
        let logged = session.with_controller(|c| c.graph().vertex(fuel_log).unwrap().value().clone());
        assert_eq!(logged.as_bool(), Some(true));

        cockpit.oil.set_reading(12.0);
        assert_eq!(session.current(), Some(ids.2));
        cockpit.oil.set_reading(41.5);
        assert_eq!(session.current(), Some(ids.3));

        session.press_button(TAXI_BUTTON).unwrap();
        assert_eq!(session.current(), Some(ids.3), "nav lights still off");

        cockpit.nav_lights.set(true);
        assert!(session.is_finished());

        drop(session);
        assert!(!cockpit.oil.is_wired());
    }
}
