use criterion::criterion_main;
use geo::{point, Distance as _, Haversine, Point};

use routers_engine::facade::{BaseFacade, ContractedGraph, ContractedGraphBuilder, MultiLevelGraph, MultiLevelGraphBuilder};
use routers_engine::matching::{map_matching, Trace};
use routers_engine::routing::{direct_shortest_path_search, many_to_many_search};
use routers_engine::{
    Ch, EngineConfig, Mld, NodeId, PhantomEndpointCandidates, PhantomNode, PhantomNodeWithDistance, SearchEngineData,
};

const SIZE: usize = 40;

fn node(x: usize, y: usize) -> NodeId {
    (y * SIZE + x) as NodeId
}

fn location(x: usize, y: usize) -> Point<f64> {
    point! { x: x as f64 * 0.001, y: y as f64 * 0.001 }
}

fn roads() -> impl Iterator<Item = (NodeId, NodeId, i32)> {
    (0..SIZE).flat_map(|y| (0..SIZE).map(move |x| (x, y))).flat_map(|(x, y)| {
        let weight = 10 + ((x * 7 + y * 3) % 5) as i32;
        let right = (x + 1 < SIZE).then(|| (node(x, y), node(x + 1, y), weight));
        let up = (y + 1 < SIZE).then(|| (node(x, y), node(x, y + 1), weight + 1));
        right.into_iter().chain(up)
    })
}

fn grid_ch() -> ContractedGraph {
    let mut builder = ContractedGraphBuilder::new(SIZE * SIZE);
    for (x, y) in (0..SIZE).flat_map(|y| (0..SIZE).map(move |x| (x, y))) {
        builder = builder.coordinate(node(x, y), location(x, y)).expect("Node must be in range");
    }
    for (from, to, weight) in roads() {
        builder = builder
            .road(from, to, weight, weight, weight as f64 * 10.0)
            .expect("Road must be valid");
    }
    builder.build()
}

fn grid_mld() -> MultiLevelGraph {
    let mut builder = MultiLevelGraphBuilder::new(SIZE * SIZE);
    for (x, y) in (0..SIZE).flat_map(|y| (0..SIZE).map(move |x| (x, y))) {
        builder = builder.coordinate(node(x, y), location(x, y)).expect("Node must be in range");
    }
    for (from, to, weight) in roads() {
        builder = builder
            .road(from, to, weight, weight, weight as f64 * 10.0)
            .expect("Road must be valid");
    }

    let cell = |index: usize, width: usize| {
        let (x, y) = (index % SIZE, index / SIZE);
        ((y / width) * SIZE.div_ceil(width) + x / width) as u32
    };
    let levels = [5, 10, 20]
        .map(|width| (0..SIZE * SIZE).map(|index| cell(index, width)).collect())
        .to_vec();

    builder.partition(levels).build().expect("Partition must be nested")
}

fn phantom<F: BaseFacade>(facade: &F, node: NodeId) -> PhantomNode {
    PhantomNode::at_node(node, facade.coordinate(node))
}

fn corner_to_corner<F: BaseFacade>(facade: &F) -> PhantomEndpointCandidates {
    PhantomEndpointCandidates::new(
        vec![phantom(facade, node(0, 0))],
        vec![phantom(facade, node(SIZE - 1, SIZE - 1))],
    )
}

fn search_benchmark(c: &mut criterion::Criterion) {
    let mut group = c.benchmark_group("search");
    group.significance_level(0.1).sample_size(30);

    let ch = grid_ch();
    let mld = grid_mld();

    group.bench_function("direct: ch", |b| {
        let mut engine = SearchEngineData::<Ch>::default();
        let candidates = corner_to_corner(&ch);
        b.iter(|| {
            let route = direct_shortest_path_search(&mut engine, &ch, &candidates).expect("Request must be valid");
            assert!(route.is_valid());
        })
    });

    group.bench_function("direct: mld", |b| {
        let mut engine = SearchEngineData::<Mld>::default();
        let candidates = corner_to_corner(&mld);
        b.iter(|| {
            let route = direct_shortest_path_search(&mut engine, &mld, &candidates).expect("Request must be valid");
            assert!(route.is_valid());
        })
    });

    let diagonal = (0..SIZE).step_by(4).map(|i| phantom(&mld, node(i, i))).collect::<Vec<_>>();
    group.bench_function("matrix: mld", |b| {
        let mut engine = SearchEngineData::<Mld>::default();
        b.iter(|| {
            let matrix = many_to_many_search(&mut engine, &mld, &diagonal, &[], &[]).expect("Request must be valid");
            assert!(matrix.duration(0, diagonal.len() - 1).is_some());
        })
    });

    group.finish();
}

fn match_benchmark(c: &mut criterion::Criterion) {
    let mut group = c.benchmark_group("match");
    group.significance_level(0.1).sample_size(30);

    let ch = grid_ch();
    let config = EngineConfig::default().matching;

    // A trace along the bottom row, every point offset from its node.
    let coordinates = (0..SIZE)
        .map(|x| {
            let on_node = location(x, 0);
            point! { x: on_node.x(), y: on_node.y() + 0.00002 }
        })
        .collect::<Vec<_>>();
    let candidates = (0..SIZE)
        .map(|x| {
            [node(x, 0), node(x, 1)]
                .map(|node| {
                    let phantom_node = phantom(&ch, node);
                    PhantomNodeWithDistance {
                        phantom_node,
                        distance: Haversine.distance(phantom_node.location, coordinates[x]),
                    }
                })
                .to_vec()
        })
        .collect::<Vec<_>>();

    group.bench_function("match: grid row", |b| {
        let mut engine = SearchEngineData::<Ch>::default();
        let trace = Trace::new(&candidates, &coordinates);
        b.iter(|| {
            let matchings = map_matching(&mut engine, &ch, &trace, true, &config).expect("Trace must be valid");
            assert_eq!(matchings.len(), 1);
        })
    });

    group.finish();
}

criterion::criterion_group!(targeted_benches, search_benchmark, match_benchmark);
criterion_main!(targeted_benches);
