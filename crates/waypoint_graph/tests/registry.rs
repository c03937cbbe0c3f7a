//! Taskable binding and session wiring.

mod test_utils;

use std::sync::{Arc, OnceLock, Weak};
use std::thread;

use parking_lot::Mutex;
use test_utils::{Probe, Scaler, new_graph, plain, registry, started_with};
use waypoint_graph::prelude::*;

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRY QUERIES
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn identifier_selects_one_instance() {
    let registry = registry();
    let left = Arc::new(Probe::named("left", 1.0));
    let right = Arc::new(Probe::named("right", 2.0));
    registry.register(&left);
    registry.register(&right);

    let ty = TaskableType::of::<Probe>();
    assert_eq!(registry.query(ty, 0, &Value::Absent, Some("right")), Some(Value::Float(2.0)));
    assert_eq!(registry.query(ty, 0, &Value::Absent, Some("left")), Some(Value::Float(1.0)));
    assert_eq!(registry.query(ty, 0, &Value::Absent, Some("middle")), None);
    assert_eq!(registry.query(ty, 0, &Value::Absent, None), Some(Value::Float(1.0)));
}

#[test]
fn identified_user_task_reads_its_instance() {
    let registry = registry();
    let left = Arc::new(Probe::named("left", 1.0));
    let right = Arc::new(Probe::named("right", 2.0));
    registry.register(&left);
    registry.register(&right);

    let mut graph = new_graph();
    let a = plain(&mut graph, "a");
    let task = graph.add_user_task("right gauge", UserTask::new::<Probe>(0).with_identifier("right"));
    let end = plain(&mut graph, "end");
    graph.add_traversable(a, task, GraphData::always()).unwrap();
    graph.add_traversable(task, end, GraphData::new(2.1)).unwrap();

    let controller = started_with(graph, a, end, registry);
    assert!(controller.is_finished(), "2.0 is within tolerance of 2.1");
    assert_eq!(left.checks(), 0);
    assert_eq!(right.checks(), 1);
}

#[test]
fn payload_and_check_kind_reach_taskable() {
    let registry = registry();
    let scaler = Arc::new(Scaler);
    registry.register(&scaler);

    let mut graph = new_graph();
    let task = graph.add_user_task("scaled", UserTask::new::<Scaler>(3).with_payload(4));
    let end = plain(&mut graph, "end");
    graph.add_traversable(task, end, GraphData::new(12)).unwrap();

    assert!(started_with(graph, task, end, registry).is_finished());
}

#[test]
fn dropped_taskables_are_pruned() {
    let registry = registry();
    let ty = TaskableType::of::<Probe>();
    let probe = Arc::new(Probe::new(5));
    assert!(registry.register(&probe));
    assert!(!registry.register(&probe), "same object twice");
    assert_eq!(registry.live_count(ty), 1);

    drop(probe);
    assert_eq!(registry.live_count(ty), 0);
    assert_eq!(registry.query(ty, 0, &Value::Absent, None), None);
}

#[test]
fn user_task_keeps_value_when_taskable_is_gone() {
    let registry = registry();
    let probe = Arc::new(Probe::new(5));
    registry.register(&probe);

    let mut graph = new_graph();
    let task = graph.add_user_task("task", UserTask::new::<Probe>(0));
    let end = plain(&mut graph, "end");
    graph.add_traversable(task, end, GraphData::new(6)).unwrap();

    let mut controller = started_with(graph, task, end, Arc::clone(&registry));
    assert_eq!(controller.graph().vertex(task).unwrap().value(), &Value::Int(5));

    drop(probe);
    controller.poke(6).unwrap();
    assert_eq!(controller.graph().vertex(task).unwrap().value(), &Value::Int(5));
    assert!(!controller.is_finished());
}

// ═══════════════════════════════════════════════════════════════════════════════
// SESSIONS
// ═══════════════════════════════════════════════════════════════════════════════

fn switch_scenario(registry: &Arc<TaskableRegistry>) -> (GraphController, VertexId) {
    let mut graph = new_graph();
    let task = graph.add_user_task("switch", UserTask::new::<Probe>(0));
    let end = plain(&mut graph, "end");
    graph.add_traversable(task, end, GraphData::new(true)).unwrap();
    let controller = GraphController::new(graph, task, end, Arc::clone(registry)).unwrap();
    (controller, task)
}

#[test]
fn wired_taskable_drives_session() {
    let registry = registry();
    let probe = Arc::new(Probe::new(false));
    registry.register(&probe);

    let (controller, task) = switch_scenario(&registry);
    let session = ScenarioSession::load(controller, [TaskableType::of::<Probe>()]).unwrap();
    assert!(probe.is_wired());

    session.start().unwrap();
    assert_eq!(session.current(), Some(task));

    probe.change(true);
    assert!(session.is_finished());

    session.unload();
    assert!(!probe.is_wired());
    assert!(!registry.is_attached());
}

#[test]
fn inactive_types_stay_unwired() {
    let registry = registry();
    let probe = Arc::new(Probe::new(false));
    registry.register(&probe);

    let (controller, task) = switch_scenario(&registry);
    let session = ScenarioSession::load(controller, []).unwrap();
    session.start().unwrap();
    assert!(!probe.is_wired());

    probe.change(true);
    assert_eq!(session.current(), Some(task), "no poke without wiring");

    session.poke(Value::Absent).unwrap();
    assert!(session.is_finished());
}

#[test]
fn late_registration_is_wired_immediately() {
    let registry = registry();
    let (controller, _) = switch_scenario(&registry);
    let session = ScenarioSession::load(controller, [TaskableType::of::<Probe>()]).unwrap();

    let probe = Arc::new(Probe::new(false));
    registry.register(&probe);
    assert!(probe.is_wired());

    assert!(registry.unregister(&probe));
    assert!(!probe.is_wired());
    drop(session);
}

#[test]
fn poke_from_enter_callback_is_queued() {
    let registry = registry();
    let slot: Arc<OnceLock<Weak<ScenarioSession>>> = Arc::default();

    let mut graph = new_graph();
    let a = plain(&mut graph, "a");
    let b = plain(&mut graph, "b");
    let c = plain(&mut graph, "c");
    graph.add_traversable(a, b, GraphData::always()).unwrap();
    graph.add_traversable(b, c, GraphData::new(5)).unwrap();

    let hook = Arc::clone(&slot);
    graph.vertex_mut(b).unwrap().on_enter(move |_| {
        if let Some(session) = hook.get().and_then(Weak::upgrade) {
            let progress = session.poke(5).expect("queued poke");
            assert_eq!(progress, Progress::default());
        }
    });

    let controller = GraphController::new(graph, a, c, Arc::clone(&registry)).unwrap();
    let session = ScenarioSession::load(controller, []).unwrap();
    slot.set(Arc::downgrade(&session)).unwrap();

    let progress = session.start().unwrap();
    assert_eq!(progress, Progress { transitions: 2, finished: true });
    assert_eq!(session.pending_len(), 0);
}

#[test]
fn observers_can_read_session_state_mid_progression() {
    let slot: Arc<OnceLock<Weak<ScenarioSession>>> = Arc::default();
    let seen: Arc<Mutex<Vec<(Option<VertexId>, bool)>>> = Arc::default();

    let mut graph = new_graph();
    let a = plain(&mut graph, "a");
    let b = plain(&mut graph, "b");
    let c = plain(&mut graph, "c");
    graph.add_traversable(a, b, GraphData::always()).unwrap();
    graph.add_traversable(b, c, GraphData::button("go")).unwrap();

    let controller = GraphController::new(graph, a, c, registry()).unwrap();
    let hook = Arc::clone(&slot);
    let record = Arc::clone(&seen);
    controller
        .hooks()
        .register_filtered("reader", [EventKind::CurrentVertexChanged], move |_: &GraphEvent| {
            if let Some(session) = hook.get().and_then(Weak::upgrade) {
                record.lock().push((session.current(), session.is_finished()));
            }
        })
        .unwrap();

    let session = ScenarioSession::load(controller, []).unwrap();
    slot.set(Arc::downgrade(&session)).unwrap();
    session.start().unwrap();
    session.press_button("go").unwrap();

    assert_eq!(*seen.lock(), vec![(None, false), (Some(b), false)]);
    assert_eq!(session.current(), Some(c));
    assert!(session.is_finished());
}

#[test]
fn concurrent_pokes_are_all_applied() {
    const STEPS: usize = 8;

    let mut graph = new_graph();
    let ids: Vec<_> = (0..=STEPS).map(|i| plain(&mut graph, &format!("step{i}"))).collect();
    for pair in ids.windows(2) {
        graph.add_traversable(pair[0], pair[1], GraphData::button("go")).unwrap();
    }

    let controller = GraphController::new(graph, ids[0], ids[STEPS], registry()).unwrap();
    let session = ScenarioSession::load(controller, []).unwrap();
    session.start().unwrap();

    thread::scope(|scope| {
        for _ in 0..STEPS {
            scope.spawn(|| session.press_button("go").unwrap());
        }
    });

    assert_eq!(session.pending_len(), 0);
    assert_eq!(session.current(), Some(ids[STEPS]));
    assert!(session.is_finished());
}
