use approx::assert_relative_eq;
use geo::point;

use crate::engine::{Ch, Mld, SearchAlgorithm, SearchEngineData};
use crate::facade::{BaseFacade, EdgeFacade};
use crate::fixtures::*;
use crate::primitives::{NodeId, PhantomEndpointCandidates, PhantomNode, RouteResult, Weight};
use crate::routing::matrix::ManyToManyAlgorithm;
use crate::routing::*;

fn assert_line_route(route: &RouteResult) {
    assert!(route.is_valid());
    assert_eq!(route.weight(), 40);
    assert_eq!(route.duration(), 40);
    assert_relative_eq!(route.distance(), 400.0);
}

fn candidates<F: BaseFacade>(facade: &F) -> PhantomEndpointCandidates {
    PhantomEndpointCandidates::new(vec![phantom(facade, A)], vec![phantom(facade, E)])
}

#[test_log::test]
fn direct_line_on_both_backends() {
    let ch = line_ch();
    let mut engine = SearchEngineData::<Ch>::default();
    let route = direct_shortest_path_search(&mut engine, &ch, &candidates(&ch)).expect("valid request");
    assert_line_route(&route);
    assert_eq!(route.legs[0].nodes, vec![A, B, C, D, E]);
    assert!(!route.legs[0].source_traversed_in_reverse);
    assert!(!route.legs[0].target_traversed_in_reverse);

    let mld = line_mld();
    let mut engine = SearchEngineData::<Mld>::default();
    let route = direct_shortest_path_search(&mut engine, &mld, &candidates(&mld)).expect("valid request");
    assert_line_route(&route);
    assert_eq!(route.legs[0].nodes, vec![A, B, C, D, E]);
    assert_eq!(route.legs[0].edges.len(), 4);
}

#[test_log::test]
fn direct_picks_the_closest_candidates() {
    let graph = line_mld();
    let mut engine = SearchEngineData::<Mld>::default();
    let candidates = PhantomEndpointCandidates::new(
        vec![phantom(&graph, A), phantom(&graph, C)],
        vec![phantom(&graph, E), phantom(&graph, D)],
    );

    let route = direct_shortest_path_search(&mut engine, &graph, &candidates).expect("valid request");
    assert_eq!(route.weight(), 10);
    assert_eq!(route.legs[0].source_phantom, phantom(&graph, C));
    assert_eq!(route.legs[0].target_phantom, phantom(&graph, D));
}

#[test_log::test]
fn direct_through_a_core() {
    let graph = core_ch();
    let mut engine = SearchEngineData::<Ch>::default();
    let candidates = PhantomEndpointCandidates::new(vec![phantom(&graph, A)], vec![phantom(&graph, E)]);

    let route = direct_shortest_path_search(&mut engine, &graph, &candidates).expect("valid request");
    assert_eq!(route.weight(), 40);
    assert_eq!(route.legs[0].nodes, vec![A, B, C, D, E]);
}

#[test_log::test]
fn direct_without_route_is_empty() {
    let graph = disconnected_ch();
    let mut engine = SearchEngineData::<Ch>::default();
    let candidates = PhantomEndpointCandidates::new(vec![phantom(&graph, A)], vec![phantom(&graph, 6)]);

    let route = direct_shortest_path_search(&mut engine, &graph, &candidates).expect("valid request");
    assert!(!route.is_valid());
    assert!(route.legs.is_empty());
}

#[test_log::test]
fn direct_rejects_missing_candidates() {
    let graph = line_ch();
    let mut engine = SearchEngineData::<Ch>::default();
    let candidates = PhantomEndpointCandidates::new(vec![phantom(&graph, A)], vec![]);

    let result = direct_shortest_path_search(&mut engine, &graph, &candidates);
    assert_eq!(result, Err(SearchError::InvalidPhantom(1)));
}

#[test_log::test]
fn offsets_are_removed_from_the_source() {
    let graph = line_ch();
    let mut engine = SearchEngineData::<Ch>::default();
    let candidates = PhantomEndpointCandidates::new(
        vec![phantom_with_offset(&graph, A, 4)],
        vec![phantom_with_offset(&graph, E, 0)],
    );

    let route = direct_shortest_path_search(&mut engine, &graph, &candidates).expect("valid request");
    assert_eq!(route.weight(), 36);
    assert_eq!(route.duration(), 36);
    assert_relative_eq!(route.distance(), 360.0);
}

#[test_log::test]
fn waypoints_split_into_legs() {
    let graph = line_ch();
    let waypoints = [phantom(&graph, A), phantom(&graph, C), phantom(&graph, E)];

    for continue_straight in [Some(true), Some(false), None] {
        let mut engine = SearchEngineData::<Ch>::default();
        let route = shortest_path_search(&mut engine, &graph, &waypoints, continue_straight).expect("valid request");

        assert_line_route(&route);
        assert_eq!(route.legs.len(), 2);
        assert_eq!(route.legs[0].nodes, vec![A, B, C]);
        assert_eq!(route.legs[1].nodes, vec![C, D, E]);
        assert_eq!(route.legs[0].weight, 20);
        assert_eq!(route.legs[1].weight, 20);
    }
}

#[test_log::test]
fn waypoints_on_a_partitioned_graph() {
    let graph = line_mld();
    let mut engine = SearchEngineData::<Mld>::default();
    let waypoints = [phantom(&graph, E), phantom(&graph, B), phantom(&graph, D)];

    let route = shortest_path_search(&mut engine, &graph, &waypoints, None).expect("valid request");
    assert_eq!(route.legs.len(), 2);
    assert_eq!(route.weight(), 50);
    assert_eq!(route.legs[0].nodes, vec![E, D, C, B]);
    assert_eq!(route.legs[1].nodes, vec![B, C, D]);
}

#[test_log::test]
fn waypoints_agree_with_direct_search() {
    let graph = grid_mld(5);
    let mut engine = SearchEngineData::<Mld>::default();
    let (source, target) = (phantom(&graph, 0), phantom(&graph, 24));

    let direct = direct_shortest_path_search(
        &mut engine,
        &graph,
        &PhantomEndpointCandidates::new(vec![source], vec![target]),
    )
    .expect("valid request");
    let routed = shortest_path_search(&mut engine, &graph, &[source, target], None).expect("valid request");

    assert_eq!(direct.weight(), routed.weight());
    assert_eq!(direct.legs[0].nodes, routed.legs[0].nodes);
}

#[test_log::test]
fn unreachable_leg_empties_the_route() {
    let graph = disconnected_mld();
    let mut engine = SearchEngineData::<Mld>::default();
    let waypoints = [phantom(&graph, A), phantom(&graph, C), phantom(&graph, 6)];

    let route = shortest_path_search(&mut engine, &graph, &waypoints, None).expect("valid request");
    assert!(!route.is_valid());
}

#[test_log::test]
fn waypoint_errors() {
    let graph = line_ch();
    let mut engine = SearchEngineData::<Ch>::default();

    let result = shortest_path_search(&mut engine, &graph, &[phantom(&graph, A)], None);
    assert_eq!(result, Err(SearchError::NotEnoughWaypoints(1)));

    let result = shortest_path_search(
        &mut engine,
        &graph,
        &[phantom(&graph, A), PhantomNode::default()],
        None,
    );
    assert_eq!(result, Err(SearchError::InvalidPhantom(1)));
}

#[test_log::test]
fn extracted_leg_sums_its_edges() {
    let graph = line_ch();
    let unpacked = ch::unpack_to_path(&graph, &[B, C, D]);

    let leg = extract_route(&graph, &phantom(&graph, B), &phantom(&graph, D), unpacked).expect("path is on the phantoms");
    assert_eq!(leg.weight, 20);
    assert_eq!(leg.duration, 20);
    assert_relative_eq!(leg.distance, 200.0);
    assert_eq!(leg.edges.len(), 2);
}

#[test_log::test]
fn path_distance_follows_the_polyline() {
    let (source, target) = (point! { x: 0.0, y: 0.0 }, point! { x: 0.002, y: 0.0 });
    let direct = path_distance(source, [], target);
    let via = path_distance(source, [point! { x: 0.001, y: 0.0 }], target);

    assert_relative_eq!(direct, via, max_relative = 1e-9);
    assert!(direct > 200.0 && direct < 250.0);
}

fn direct_weight<A, F>(engine: &mut SearchEngineData<A>, facade: &F, source: PhantomNode, target: PhantomNode) -> Option<Weight>
where
    A: SearchAlgorithm<F>,
    F: EdgeFacade,
{
    let candidates = PhantomEndpointCandidates::new(vec![source], vec![target]);
    let route = direct_shortest_path_search(engine, facade, &candidates).expect("valid request");
    route.is_valid().then(|| route.weight())
}

fn placed_phantoms<F: BaseFacade>(facade: &F, placed: &[(NodeId, Weight)]) -> Vec<PhantomNode> {
    placed
        .iter()
        .map(|(node, offset)| phantom_with_offset(facade, *node, *offset))
        .collect()
}

/// The `0 -> 1` entry of every table shape equals the direct route.
fn assert_tables_match_direct<A, F>(facade: &F, phantoms: &[PhantomNode])
where
    A: SearchAlgorithm<F> + ManyToManyAlgorithm<F>,
    F: EdgeFacade,
{
    let mut engine = SearchEngineData::<A>::default();
    let expected = direct_weight(&mut engine, facade, phantoms[0], phantoms[1]);
    assert!(expected.is_some(), "grid is connected");

    // 1x1, 1xN, Nx1, NxM and a tall NxM, which is searched transposed.
    let requests: [(&[usize], &[usize]); 5] = [
        (&[0], &[1]),
        (&[0], &[1, 2, 3]),
        (&[0, 2, 3], &[1]),
        (&[0, 2], &[1, 3]),
        (&[0, 2, 3], &[1, 3]),
    ];

    for (sources, targets) in requests {
        let matrix = many_to_many_search(&mut engine, facade, phantoms, sources, targets).expect("valid request");
        assert_eq!(matrix.weight(0, 0), expected, "{sources:?} x {targets:?}");
    }
}

#[test_log::test]
fn tables_match_direct_search_behind_the_source() {
    let ch = grid_ch(5);
    let mld = grid_mld(5);

    // The target lies behind the source on the same segment, so every
    // route has to loop back onto the node.
    for node in 0..25 as NodeId {
        let placed = [(node, 7), (node, 3), ((node + 12) % 25, 0), (24 - node, 0)];

        assert_tables_match_direct::<Ch, _>(&ch, &placed_phantoms(&ch, &placed));
        assert_tables_match_direct::<Mld, _>(&mld, &placed_phantoms(&mld, &placed));
    }
}

#[test_log::test]
fn tables_match_direct_search_with_offsets() {
    let ch = grid_ch(5);
    let mld = grid_mld(5);
    let offsets = [(0, 0), (3, 7), (5, 0), (0, 5), (7, 3)];

    for (source, target) in [(6, 18), (18, 6), (0, 24), (12, 13)] {
        for (source_offset, target_offset) in offsets {
            let placed = [(source, source_offset), (target, target_offset), (4, 0), (20, 0)];

            assert_tables_match_direct::<Ch, _>(&ch, &placed_phantoms(&ch, &placed));
            assert_tables_match_direct::<Mld, _>(&mld, &placed_phantoms(&mld, &placed));
        }
    }
}

#[test_log::test]
fn tables_obey_the_triangle_inequality() {
    let ch = grid_ch(5);
    let mld = grid_mld(5);
    let placed = [(6, 7), (6, 3), (12, 0), (18, 5), (24, 2), (0, 4), (13, 9)];

    let mut ch_engine = SearchEngineData::<Ch>::default();
    let mut mld_engine = SearchEngineData::<Mld>::default();
    let on_ch = placed_phantoms(&ch, &placed);
    let on_mld = placed_phantoms(&mld, &placed);

    let from_ch = many_to_many_search(&mut ch_engine, &ch, &on_ch, &[], &[]).expect("valid request");
    let from_mld = many_to_many_search(&mut mld_engine, &mld, &on_mld, &[], &[]).expect("valid request");

    let n = placed.len();
    for from in 0..n {
        for to in 0..n {
            let weight = from_ch.weight(from, to).expect("grid is connected");
            assert_eq!(from_mld.weight(from, to), Some(weight), "{from} -> {to}");

            for via in 0..n {
                let first = from_ch.weight(from, via).expect("grid is connected");
                let second = from_ch.weight(via, to).expect("grid is connected");
                assert!(weight <= first + second, "{from} -> {via} -> {to}");
            }
        }
    }
}
