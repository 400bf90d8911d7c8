use approx::assert_relative_eq;
use pathfinding::prelude::dijkstra;

use crate::engine::{Ch, Mld, SearchEngineData};
use crate::facade::{BaseFacade, EdgeData, EdgeFacade};
use crate::fixtures::*;
use crate::primitives::{NodeId, PhantomNode, Weight, MAXIMAL_EDGE_DURATION};
use crate::routing::matrix::*;
use crate::routing::SearchError;

fn phantoms<F: BaseFacade>(facade: &F, nodes: &[NodeId]) -> Vec<PhantomNode> {
    nodes.iter().map(|node| phantom(facade, *node)).collect()
}

fn shortest<F: EdgeFacade>(facade: &F, source: NodeId, target: NodeId) -> Option<Weight> {
    let neighbours = |node: &NodeId| {
        facade
            .adjacent_edges(*node)
            .filter(|edge| facade.edge_data(*edge).forward())
            .map(|edge| (facade.target(edge), facade.edge_data(edge).weight()))
            .collect::<Vec<_>>()
    };
    dijkstra(&source, neighbours, |node| *node == target).map(|(_, cost)| cost)
}

#[test_log::test]
fn line_many_to_one() {
    let graph = line_ch();
    let mut engine = SearchEngineData::<Ch>::default();
    let phantoms = phantoms(&graph, &[A, E, C]);

    let matrix = many_to_many_search(&mut engine, &graph, &phantoms, &[0, 1], &[2]).expect("valid request");
    assert_eq!(matrix.number_of_sources(), 2);
    assert_eq!(matrix.number_of_targets(), 1);
    assert_eq!(matrix.duration(0, 0), Some(20));
    assert_eq!(matrix.duration(1, 0), Some(20));
    assert_relative_eq!(matrix.distance(0, 0).expect("reachable"), 200.0);
    assert_relative_eq!(matrix.distance(1, 0).expect("reachable"), 200.0);
}

#[test_log::test]
fn line_many_to_one_multi_level() {
    let graph = line_mld();
    let mut engine = SearchEngineData::<Mld>::default();
    let phantoms = phantoms(&graph, &[A, E, C]);

    let matrix = many_to_many_search(&mut engine, &graph, &phantoms, &[0, 1], &[2]).expect("valid request");
    assert_eq!(matrix.duration(0, 0), Some(20));
    assert_eq!(matrix.duration(1, 0), Some(20));
    assert_relative_eq!(matrix.distance(0, 0).expect("reachable"), 200.0);
    assert_relative_eq!(matrix.distance(1, 0).expect("reachable"), 200.0);
}

#[test_log::test]
fn line_end_to_end_distance() {
    let graph = line_ch();
    let mut engine = SearchEngineData::<Ch>::default();
    let phantoms = phantoms(&graph, &[A, E]);

    let matrix = many_to_many_search(&mut engine, &graph, &phantoms, &[0], &[1]).expect("valid request");
    assert_eq!(matrix.weight(0, 0), Some(40));
    assert_eq!(matrix.duration(0, 0), Some(40));
    assert_relative_eq!(matrix.distance(0, 0).expect("reachable"), 400.0);
}

#[test_log::test]
fn same_index_is_zero() {
    let graph = line_mld();
    let mut engine = SearchEngineData::<Mld>::default();
    let phantoms = phantoms(&graph, &[A, C]);

    let matrix = many_to_many_search(&mut engine, &graph, &phantoms, &[], &[]).expect("valid request");
    assert_eq!(matrix.duration(0, 0), Some(0));
    assert_eq!(matrix.duration(1, 1), Some(0));
    assert_eq!(matrix.distance(1, 1), Some(0.0));
    assert_eq!(matrix.duration(0, 1), Some(20));
    assert_eq!(matrix.duration(1, 0), Some(20));
}

#[test_log::test]
fn disconnected_entries_are_missing() {
    let graph = disconnected_ch();
    let mut engine = SearchEngineData::<Ch>::default();
    let phantoms = phantoms(&graph, &[A, 6]);

    let matrix = many_to_many_search(&mut engine, &graph, &phantoms, &[0], &[1]).expect("valid request");
    assert_eq!(matrix.duration(0, 0), None);
    assert_eq!(matrix.durations_with_sentinels(), vec![MAXIMAL_EDGE_DURATION]);

    let graph = disconnected_mld();
    let mut engine = SearchEngineData::<Mld>::default();
    let matrix = many_to_many_search(&mut engine, &graph, &phantoms, &[0, 1], &[1, 0]).expect("valid request");
    assert_eq!(matrix.duration(0, 0), None);
    assert_eq!(matrix.duration(1, 1), None);
    assert_eq!(matrix.duration(0, 1), Some(0));
}

#[test_log::test]
fn out_of_range_index_is_an_error() {
    let graph = line_ch();
    let mut engine = SearchEngineData::<Ch>::default();
    let phantoms = phantoms(&graph, &[A, E]);

    let result = many_to_many_search(&mut engine, &graph, &phantoms, &[0, 7], &[1]);
    assert_eq!(result, Err(SearchError::IndexOutOfRange { index: 7, len: 2 }));
}

#[test_log::test]
fn invalid_phantom_is_an_error() {
    let graph = line_ch();
    let mut engine = SearchEngineData::<Ch>::default();
    let phantoms = vec![phantom(&graph, A), PhantomNode::default()];

    let result = many_to_many_search(&mut engine, &graph, &phantoms, &[0], &[1]);
    assert_eq!(result, Err(SearchError::InvalidPhantom(1)));
}

#[test_log::test]
fn grid_tables_match_dijkstra() {
    let size = 5;
    let ch = grid_ch(size);
    let mld = grid_mld(size);
    let nodes = [0, 3, 7, 12, 19, 24];

    let mut ch_engine = SearchEngineData::<Ch>::default();
    let mut mld_engine = SearchEngineData::<Mld>::default();
    let phantoms = phantoms(&ch, &nodes);

    // One-to-many, many-to-one, wide and tall tables.
    let requests: [(&[usize], &[usize]); 4] = [
        (&[0], &[1, 2, 3, 4, 5]),
        (&[1, 2, 3, 4, 5], &[0]),
        (&[0, 1], &[2, 3, 4, 5]),
        (&[0, 1, 2, 3], &[4, 5]),
    ];

    for (sources, targets) in requests {
        let from_ch = many_to_many_search(&mut ch_engine, &ch, &phantoms, sources, targets).expect("valid request");
        let from_mld = many_to_many_search(&mut mld_engine, &mld, &phantoms, sources, targets).expect("valid request");

        for (row, source) in sources.iter().enumerate() {
            for (column, target) in targets.iter().enumerate() {
                let expected = shortest(&ch, nodes[*source], nodes[*target]);
                assert_eq!(from_ch.weight(row, column), expected, "ch {source} -> {target}");
                assert_eq!(from_mld.weight(row, column), expected, "mld {source} -> {target}");

                // Durations equal weights and distances are ten times both.
                let distance = from_mld.distance(row, column).expect("grid is connected");
                assert_relative_eq!(distance, expected.unwrap_or_default() as f64 * 10.0);
                assert_relative_eq!(
                    from_ch.distance(row, column).expect("grid is connected"),
                    distance
                );
            }
        }
    }
}

#[test_log::test]
fn transposing_swaps_entries() {
    let routes = [
        Some(MatrixRoute {
            weight: 1,
            duration: 2,
            distance: 3.0,
            middle: 0,
            looped: false,
        }),
        None,
    ];
    let matrix = Matrix::from_routes(1, 2, &routes);
    let transposed = matrix.transposed();

    assert_eq!(transposed.number_of_sources(), 2);
    assert_eq!(transposed.duration(0, 0), Some(2));
    assert_eq!(transposed.duration(1, 0), None);
    assert_eq!(transposed.duration(0, 1), None);
}

#[test_log::test]
fn buckets_are_found_by_node_and_column() {
    let bucket = |node: NodeId, column: usize| NodeBucket {
        node,
        parent: node,
        from_clique_arc: false,
        column,
        weight: 0,
        duration: 0,
        distance: 0.0,
    };
    let mut buckets = vec![bucket(3, 1), bucket(1, 0), bucket(3, 0), bucket(2, 4)];
    sort_buckets(&mut buckets);

    assert_eq!(buckets_at(&buckets, 3).len(), 2);
    assert!(buckets_at(&buckets, 4).is_empty());
    assert_eq!(bucket_of(&buckets, 3, 1).map(|bucket| bucket.column), Some(1));
    assert!(bucket_of(&buckets, 2, 0).is_none());
}
