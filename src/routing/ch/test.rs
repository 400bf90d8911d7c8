use approx::assert_relative_eq;
use geo::{Distance as _, Haversine};
use pathfinding::prelude::dijkstra;

use crate::engine::{Ch, ForceLoops, SearchEngineData};
use crate::facade::{BaseFacade, ChFacade, EdgeFacade};
use crate::fixtures::*;
use crate::primitives::{NodeId, PackedPath, PhantomEndpoints, PhantomNode, Weight};
use crate::routing::ch::*;
use crate::routing::insert_nodes_in_heaps;

fn route<F: ChFacade>(
    engine: &mut SearchEngineData<Ch>,
    facade: &F,
    source: PhantomNode,
    target: PhantomNode,
) -> Option<(Weight, PackedPath)> {
    engine.ensure_capacity(facade.number_of_nodes());
    insert_nodes_in_heaps(
        &mut engine.forward_heap_1,
        &mut engine.reverse_heap_1,
        &PhantomEndpoints::new(source, target),
    );
    search(engine, facade, ForceLoops::between(&source, &target), None)
}

fn route_nodes<F: ChFacade>(facade: &F, source: NodeId, target: NodeId) -> Option<(Weight, PackedPath)> {
    let mut engine = SearchEngineData::default();
    route(&mut engine, facade, phantom(facade, source), phantom(facade, target))
}

#[test_log::test]
fn line_end_to_end() {
    let graph = line_ch();
    let (weight, packed) = route_nodes(&graph, A, E).expect("line is connected");

    assert_eq!(weight, 40);
    assert_eq!(packed, vec![A, B, C, D, E]);
}

#[test_log::test]
fn line_is_symmetric() {
    let graph = line_ch();
    let forward = route_nodes(&graph, B, E).map(|(weight, _)| weight);
    let backward = route_nodes(&graph, E, B).map(|(weight, _)| weight);

    assert_eq!(forward, Some(30));
    assert_eq!(forward, backward);
}

#[test_log::test]
fn same_node_is_free() {
    let graph = line_ch();
    let (weight, packed) = route_nodes(&graph, C, C).expect("trivial route");

    assert_eq!(weight, 0);
    assert_eq!(packed, vec![C]);
}

#[test_log::test]
fn hierarchy_meets_at_top() {
    let graph = contracted_line();

    let (weight, packed) = route_nodes(&graph, A, E).expect("line is connected");
    assert_eq!(weight, 40);
    assert_eq!(packed, vec![A, E]);

    let unpacked = unpack_to_path(&graph, &packed);
    assert_eq!(unpacked.nodes, vec![A, B, C, D, E]);
    assert_eq!(unpacked.edges.len(), 4);

    let (weight, packed) = route_nodes(&graph, B, D).expect("line is connected");
    assert_eq!(weight, 20);
    assert_eq!(packed, vec![B, C, D]);
}

#[test_log::test]
fn unpacked_edges_join_their_nodes() {
    let graph = contracted_line();
    let unpacked = unpack_to_path(&graph, &[A, E]);

    for (hop, edge) in unpacked.nodes.windows(2).zip(&unpacked.edges) {
        let data = graph.edge_data(*edge);
        assert!(!data.shortcut);

        let target = graph.target(*edge);
        assert!(target == hop[1] || target == hop[0]);
    }
}

#[test_log::test]
fn unpack_single_edge() {
    let graph = contracted_line();

    assert_eq!(unpack_edge(&graph, C, E), Some(vec![C, D, E]));
    assert_eq!(unpack_edge(&graph, A, C), Some(vec![A, B, C]));
}

#[test_log::test]
fn forced_loop_takes_the_self_loop() {
    let graph = loop_ch(true);
    let source = phantom_with_offset(&graph, 0, 5);
    let target = phantom_with_offset(&graph, 0, 3);

    let mut engine = SearchEngineData::default();
    let (weight, packed) = route(&mut engine, &graph, source, target).expect("loop exists");

    assert_eq!(weight, 28);
    assert_eq!(packed, vec![0, 0]);

    let unpacked = unpack_to_path(&graph, &packed);
    assert_eq!(unpacked.nodes, vec![0, 0]);
    assert_eq!(unpacked.edges.len(), 1);
}

#[test_log::test]
fn target_ahead_on_segment_needs_no_loop() {
    let graph = loop_ch(true);
    let source = phantom_with_offset(&graph, 0, 3);
    let target = phantom_with_offset(&graph, 0, 5);

    let mut engine = SearchEngineData::default();
    let (weight, packed) = route(&mut engine, &graph, source, target).expect("same segment");

    assert_eq!(weight, 2);
    assert_eq!(packed, vec![0]);
}

#[test_log::test]
fn forced_loop_without_loop_edge_is_unreachable() {
    let graph = loop_ch(false);
    let source = phantom_with_offset(&graph, 0, 5);
    let target = phantom_with_offset(&graph, 0, 3);

    let mut engine = SearchEngineData::default();
    assert_eq!(route(&mut engine, &graph, source, target), None);
}

#[test_log::test]
fn loop_weight_by_metric() {
    let graph = loop_ch(true);

    assert_eq!(get_loop_weight(&graph, 0, false), Some((30, 300.0)));
    assert_eq!(get_loop_weight(&graph, 0, true), Some((25, 300.0)));
    assert_eq!(get_loop_weight(&graph, 1, false), None);
}

#[test_log::test]
fn disconnected_is_not_an_error() {
    let graph = disconnected_ch();
    assert_eq!(route_nodes(&graph, A, 6), None);

    let mut engine = SearchEngineData::default();
    let distance = network_distance(
        &mut engine,
        &graph,
        &phantom(&graph, A),
        &phantom(&graph, 6),
        None,
    );
    assert_eq!(distance, f64::MAX);
}

#[test_log::test]
fn upper_bound_prunes() {
    let graph = line_ch();
    let mut engine = SearchEngineData::default();
    engine.ensure_capacity(graph.number_of_nodes());
    insert_nodes_in_heaps(
        &mut engine.forward_heap_1,
        &mut engine.reverse_heap_1,
        &PhantomEndpoints::new(phantom(&graph, A), phantom(&graph, E)),
    );

    assert_eq!(search(&mut engine, &graph, ForceLoops::NONE, Some(40)), None);
}

#[test_log::test]
fn core_search_through_core() {
    let graph = core_ch();
    assert!(graph.has_core());

    let (weight, packed) = route_nodes(&graph, A, E).expect("core is connected");
    assert_eq!(weight, 40);
    assert_eq!(packed, vec![A, C, E]);
    assert_eq!(unpack_to_path(&graph, &packed).nodes, vec![A, B, C, D, E]);

    let (weight, packed) = route_nodes(&graph, B, D).expect("core is connected");
    assert_eq!(weight, 20);
    assert_eq!(packed, vec![B, C, D]);
}

#[test_log::test]
fn network_distance_follows_nodes() {
    let graph = line_ch();
    let mut engine = SearchEngineData::default();
    engine.ensure_capacity(graph.number_of_nodes());

    let distance = network_distance(
        &mut engine,
        &graph,
        &phantom(&graph, A),
        &phantom(&graph, E),
        None,
    );
    let hop = Haversine.distance(location(0, 0), location(1, 0));

    assert_relative_eq!(distance, 4.0 * hop, epsilon = 1e-3);
}

#[test_log::test]
fn grid_matches_dijkstra() {
    let size = 6;
    let graph = grid_ch(size);
    let mut engine = SearchEngineData::default();

    let neighbours = |node: &NodeId| {
        graph
            .adjacent_edges(*node)
            .filter(|edge| graph.edge_data(*edge).forward)
            .map(|edge| (graph.target(edge), graph.edge_data(edge).weight))
            .collect::<Vec<_>>()
    };

    for (source, target) in [(0, 35), (5, 30), (14, 21), (35, 0), (7, 7)] {
        let expected = dijkstra(&source, neighbours, |node| *node == target).map(|(_, cost)| cost);
        let found = route(
            &mut engine,
            &graph,
            phantom(&graph, source),
            phantom(&graph, target),
        )
        .map(|(weight, _)| weight);

        assert_eq!(found, expected, "{source} -> {target}");
    }
}

#[test_log::test]
fn repeated_searches_agree() {
    let graph = grid_ch(5);
    let mut engine = SearchEngineData::default();

    let first = route(&mut engine, &graph, phantom(&graph, 0), phantom(&graph, 24));
    let second = route(&mut engine, &graph, phantom(&graph, 0), phantom(&graph, 24));

    assert!(first.is_some());
    assert_eq!(first, second);
}

#[test_log::test]
fn annotations_are_cached() {
    let graph = contracted_line();
    let mut cache = UnpackingCache::new(16, graph.timestamp());

    let annotations = calculate_ebg_node_annotations(&graph, &[A, E], &mut cache);
    assert_eq!(annotations.map(|(duration, _)| duration), Some(40));
    assert_relative_eq!(annotations.map_or(0.0, |(_, distance)| distance), 400.0);

    assert!(cache.contains(&(A, E, 0)));
    assert!(cache.contains(&(A, C, 0)));
    assert!(cache.contains(&(C, E, 0)));

    let again = calculate_ebg_node_annotations(&graph, &[A, E], &mut cache);
    assert_eq!(annotations, again);

    cache.invalidate_if_stale(graph.timestamp() + 1);
    assert!(cache.is_empty());
}

#[test_log::test]
fn cache_evicts_least_recently_used() {
    let mut cache = UnpackingCache::new(2, 0);
    cache.insert((0, 1, 0), (1, 1.0));
    cache.insert((1, 2, 0), (2, 2.0));

    assert_eq!(cache.get(&(0, 1, 0)), Some((1, 1.0)));
    cache.insert((2, 3, 0), (3, 3.0));

    assert_eq!(cache.len(), 2);
    assert!(cache.contains(&(0, 1, 0)));
    assert!(!cache.contains(&(1, 2, 0)));
    assert!(cache.contains(&(2, 3, 0)));
}
