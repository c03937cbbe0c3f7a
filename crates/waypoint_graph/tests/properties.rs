//! Property tests for comparison rules, typed assignment, and progression.

mod test_utils;

use proptest::prelude::*;
use test_utils::{new_graph, registry};
use waypoint_graph::prelude::*;

fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Absent),
        any::<i64>().prop_map(Value::Int),
        (-1.0e6..1.0e6f64).prop_map(Value::Float),
        any::<bool>().prop_map(Value::Bool),
        "[a-z]{0,8}".prop_map(Value::from),
    ]
}

fn arb_non_int() -> impl Strategy<Value = Value> {
    prop_oneof![
        (-1.0e6..1.0e6f64).prop_map(Value::Float),
        any::<bool>().prop_map(Value::Bool),
        "[a-z]{0,8}".prop_map(Value::from),
    ]
}

/// A chain of int-locked vertices; `None` is an always-pass edge.
fn build_chain(conditions: &[Option<i64>]) -> (Graph, Vec<VertexId>) {
    let mut graph = new_graph();
    let ids: Vec<_> = (0..=conditions.len())
        .map(|i| graph.add_vertex(format!("v{i}"), GraphData::locked(DataType::Int)))
        .collect();
    for (pair, condition) in ids.windows(2).zip(conditions) {
        let condition = condition.map_or_else(GraphData::always, GraphData::new);
        graph.add_traversable(pair[0], pair[1], condition).unwrap();
    }
    (graph, ids)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn floats_within_tolerance_are_equal(a in -1.0e3..1.0e3f64, delta in -0.29..0.29f64) {
        prop_assert!(compare(&GraphData::new(a), &GraphData::new(a + delta)));
    }

    #[test]
    fn floats_beyond_tolerance_differ(a in -1.0e3..1.0e3f64, delta in 0.31..50.0f64, below in any::<bool>()) {
        let b = if below { a - delta } else { a + delta };
        prop_assert!(!compare(&GraphData::new(a), &GraphData::new(b)));
    }

    #[test]
    fn locked_box_keeps_value_on_mismatch(initial in any::<i64>(), other in arb_non_int()) {
        let mut data = GraphData::locked(DataType::Int);
        prop_assert!(data.assign(initial));
        prop_assert!(!data.assign(other));
        prop_assert_eq!(data.value(), &Value::Int(initial));
    }

    #[test]
    fn always_pass_accepts_anything(value in arb_value()) {
        prop_assert!(compare(&GraphData::new(value), &GraphData::always()));
    }

    #[test]
    fn int_ordering_compares_vertex_against_edge(a in any::<i64>(), b in any::<i64>()) {
        let vertex = GraphData::new(a);
        let greater = GraphData::new(b).with_special(SpecialCase::GreaterThanInt);
        let less = GraphData::new(b).with_special(SpecialCase::LessThanInt);
        prop_assert_eq!(compare(&vertex, &greater), a > b);
        prop_assert_eq!(compare(&vertex, &less), a < b);
    }

    #[test]
    fn progression_settles(
        conditions in prop::collection::vec(prop::option::of(0..3i64), 1..6),
        pokes in prop::collection::vec(0..3i64, 0..8),
    ) {
        let (graph, ids) = build_chain(&conditions);
        let end = ids[ids.len() - 1];
        let mut controller = GraphController::new(graph, ids[0], end, registry()).unwrap();
        controller.start().unwrap();
        for value in pokes {
            controller.poke(value).unwrap();
        }

        let settled = controller.current();
        prop_assert_eq!(controller.progress_if_possible().unwrap().transitions, 0);
        prop_assert_eq!(controller.current(), settled);
        prop_assert_eq!(controller.is_finished(), settled == Some(end));
    }

    #[test]
    fn found_paths_connect_start_to_end(
        n in 2..8usize,
        raw_edges in prop::collection::vec((0..8usize, 0..8usize), 0..20),
    ) {
        let mut graph = new_graph();
        let ids: Vec<_> = (0..n)
            .map(|i| graph.add_vertex(format!("v{i}"), GraphData::empty()))
            .collect();
        for (from, to) in raw_edges {
            graph.add_traversable(ids[from % n], ids[to % n], GraphData::always()).unwrap();
        }

        let (start, end) = (ids[0], ids[n - 1]);
        let path = graph.find_any_path(start, end);
        prop_assert_eq!(path.is_some(), graph.validate(start, end).is_ok());

        if let Some(path) = path {
            let mut at = start;
            for id in &path {
                let edge = graph.edge(id).unwrap();
                prop_assert_eq!(edge.source(), at);
                at = edge.target();
            }
            prop_assert_eq!(at, end);
        }
    }
}
