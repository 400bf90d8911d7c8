//! Many-to-many search on a multi-level graph.
//!
//! Distances are accumulated in the heap payload along with durations,
//! so no path has to be unpacked.

use log::trace;
use rustc_hash::FxHashMap;

use crate::engine::{HeapData, Mld, MldManyToManyData, SearchEngineData};
use crate::facade::{EdgeData, MldFacade};
use crate::heap::{HeapNode, MapStorage, QueryHeap};
use crate::primitives::{Direction, Distance, Duration, NodeId, PhantomNode, Weight};
use crate::routing::matrix::{
    buckets_at, improve, sort_buckets, ManyToManyAlgorithm, Matrix, MatrixRoute, NodeBucket,
};
use crate::routing::mld::{CappedLevel, PhantomGroup, QueryLevel};
use crate::routing::{insert_nodes_in_heap, traversable};

type ManyToManyHeap = QueryHeap<MldManyToManyData, MapStorage>;

#[inline]
fn improves(weight: Weight, data: &MldManyToManyData, known: &HeapNode<MldManyToManyData>) -> bool {
    (weight, data.duration)
        .cmp(&(known.weight, known.data.duration))
        .then_with(|| data.distance.total_cmp(&known.data.distance))
        .then_with(|| data.parent.cmp(&known.data.parent))
        .is_lt()
}

fn relax_outgoing_edges<F, L>(
    facade: &F,
    direction: Direction,
    settled: &HeapNode<MldManyToManyData>,
    heap: &mut ManyToManyHeap,
    endpoints: &L,
) where
    F: MldFacade + ?Sized,
    L: QueryLevel + ?Sized,
{
    let partition = facade.partition();
    let node = settled.node;
    let Some(level) = endpoints.level(partition, node) else {
        return;
    };

    let mut relax = |to: NodeId, weight: Weight, duration: Duration, distance: Distance, from_clique_arc: bool| {
        let to_weight = settled.weight + weight;
        let to_data = MldManyToManyData {
            parent: node,
            from_clique_arc,
            duration: settled.data.duration + duration,
            distance: settled.data.distance + distance,
        };

        if !heap.was_inserted(to) {
            heap.insert(to, to_weight, to_data);
        } else if !heap.was_removed(to)
            && heap
                .get_heap_node_if_was_inserted(to)
                .is_some_and(|known| improves(to_weight, &to_data, known))
        {
            heap.decrease_key(to, to_weight, to_data);
        }
    };

    if level >= 1 && !settled.data.from_clique_arc {
        let cell = facade
            .cell_storage()
            .cell(facade.cell_metric(), level, partition.cell(level, node));

        if let Some(cell) = cell {
            match direction {
                Direction::Forward => {
                    let shortcuts = cell
                        .destination_nodes()
                        .iter()
                        .zip(cell.out_weights(node))
                        .zip(cell.out_durations(node))
                        .zip(cell.out_distances(node));
                    for (((to, weight), duration), distance) in shortcuts {
                        if let (Some(weight), true) = (weight, *to != node) {
                            let (duration, distance) = (duration.unwrap_or_default(), distance.unwrap_or_default());
                            relax(*to, *weight, duration, distance, true);
                        }
                    }
                }
                Direction::Reverse => {
                    let shortcuts = cell
                        .source_nodes()
                        .iter()
                        .zip(cell.in_weights(node))
                        .zip(cell.in_durations(node))
                        .zip(cell.in_distances(node));
                    for (((to, weight), duration), distance) in shortcuts {
                        if let (Some(weight), true) = (weight, *to != node) {
                            let (duration, distance) = (duration.unwrap_or_default(), distance.unwrap_or_default());
                            relax(*to, weight, duration, distance, true);
                        }
                    }
                }
            }
        }
    }

    for edge in facade.border_edges(level, node) {
        let data = facade.edge_data(edge);
        if !traversable(direction, data) {
            continue;
        }

        let to = facade.target(edge);
        if facade.exclude_node(to) {
            continue;
        }
        relax(to, data.weight(), data.duration(), data.distance(), false);
    }
}

/// A phantom segment waiting to be reached by a one-to-many search.
#[derive(Debug, Clone, Copy)]
struct PendingTarget {
    column: usize,
    weight: Weight,
    duration: Duration,
    distance: Distance,
}

type PendingTargets = FxHashMap<NodeId, Vec<PendingTarget>>;

/// Pairs `reached` with every phantom waiting at its node. Pairings with a
/// negative weight stay pending, a later loop back to the node may close them.
fn reach_targets(
    pending: &mut PendingTargets,
    routes: &mut [Option<MatrixRoute>],
    reached: &HeapNode<MldManyToManyData>,
) {
    let Some(targets) = pending.get_mut(&reached.node) else {
        return;
    };

    targets.retain(|target| {
        let weight = reached.weight + target.weight;
        if weight < 0 {
            return true;
        }

        let route = MatrixRoute {
            weight,
            duration: reached.data.duration + target.duration,
            distance: reached.data.distance + target.distance,
            middle: reached.node,
            looped: false,
        };
        improve(&mut routes[target.column], route);
        false
    });

    if targets.is_empty() {
        pending.remove(&reached.node);
    }
}

/// A single search from `phantoms[probe]` in `direction`, stopping once
/// every phantom in `columns` has been reached.
///
/// Returns one route per column. For a reverse search the probe is the
/// target and the columns are the sources.
///
/// Seed nodes are relaxed straight away instead of being settled, so a
/// target behind the probe on its own segment is still found through a
/// loop back onto the seed node.
fn one_to_many_search<F>(
    heap: &mut ManyToManyHeap,
    facade: &F,
    phantoms: &[PhantomNode],
    probe: usize,
    columns: &[usize],
    direction: Direction,
) -> Vec<Option<MatrixRoute>>
where
    F: MldFacade + ?Sized,
{
    let mut pending = PendingTargets::default();
    for (column, index) in columns.iter().enumerate() {
        for seed in phantoms[*index].signed_seeds(direction.opposite()) {
            pending.entry(seed.node).or_default().push(PendingTarget {
                column,
                weight: seed.weight,
                duration: seed.duration,
                distance: seed.distance,
            });
        }
    }

    let level = PhantomGroup {
        phantoms,
        index: probe,
        indices: columns,
    };
    let mut routes = vec![None; columns.len()];

    heap.clear();
    let seeds = phantoms[probe]
        .signed_seeds(direction)
        .map(|seed| HeapNode {
            node: seed.node,
            weight: seed.weight,
            data: MldManyToManyData::from_seed(&seed),
        })
        .collect::<Vec<_>>();

    for seed in &seeds {
        reach_targets(&mut pending, &mut routes, seed);
    }
    for seed in &seeds {
        relax_outgoing_edges(facade, direction, seed, heap, &level);
    }

    while !pending.is_empty() {
        let Some(settled) = heap.delete_min_get_heap_node() else {
            break;
        };

        reach_targets(&mut pending, &mut routes, &settled);
        relax_outgoing_edges(facade, direction, &settled, heap, &level);
    }

    routes
}

/// Bucket search with `rows` probing in `direction` and `columns`
/// leaving buckets from searches in the opposite direction. Returns a
/// row-major `rows x columns` table.
fn bucket_search<F>(
    heap: &mut ManyToManyHeap,
    facade: &F,
    phantoms: &[PhantomNode],
    rows: &[usize],
    columns: &[usize],
    direction: Direction,
) -> Vec<Option<MatrixRoute>>
where
    F: MldFacade + ?Sized,
{
    let maximal_level = facade.partition().number_of_levels().saturating_sub(1);
    let mut buckets = Vec::new();

    for (column, index) in columns.iter().enumerate() {
        let phantom = &phantoms[*index];
        let level = CappedLevel {
            phantom,
            maximal_level,
        };

        heap.clear();
        insert_nodes_in_heap(heap, phantom, direction.opposite());

        while let Some(settled) = heap.delete_min_get_heap_node() {
            buckets.push(NodeBucket {
                node: settled.node,
                parent: settled.data.parent,
                from_clique_arc: settled.data.from_clique_arc,
                column,
                weight: settled.weight,
                duration: settled.data.duration,
                distance: settled.data.distance,
            });
            relax_outgoing_edges(facade, direction.opposite(), &settled, heap, &level);
        }
    }

    sort_buckets(&mut buckets);
    trace!("Bucket searches left {} buckets", buckets.len());

    let mut routes = vec![None; rows.len() * columns.len()];
    for (row, index) in rows.iter().enumerate() {
        let phantom = &phantoms[*index];
        let row_routes = &mut routes[row * columns.len()..(row + 1) * columns.len()];

        heap.clear();
        insert_nodes_in_heap(heap, phantom, direction);

        while let Some(settled) = heap.delete_min_get_heap_node() {
            for bucket in buckets_at(&buckets, settled.node) {
                let weight = settled.weight + bucket.weight;
                if weight < 0 {
                    continue;
                }

                let route = MatrixRoute {
                    weight,
                    duration: settled.data.duration + bucket.duration,
                    distance: settled.data.distance + bucket.distance,
                    middle: settled.node,
                    looped: false,
                };
                improve(&mut row_routes[bucket.column], route);
            }

            relax_outgoing_edges(facade, direction, &settled, heap, phantom);
        }
    }

    routes
}

impl<F> ManyToManyAlgorithm<F> for Mld
where
    F: MldFacade + ?Sized,
{
    /// Runs a single search when either side has one phantom. Otherwise
    /// the bucket searches start from the smaller side.
    fn many_to_many(
        engine: &mut SearchEngineData<Self>,
        facade: &F,
        phantoms: &[PhantomNode],
        sources: &[usize],
        targets: &[usize],
    ) -> Matrix {
        let heap = &mut engine.many_to_many_heap;

        match (sources, targets) {
            ([source], _) => {
                let routes = one_to_many_search(heap, facade, phantoms, *source, targets, Direction::Forward);
                Matrix::from_routes(1, targets.len(), &routes)
            }
            (_, [target]) => {
                let routes = one_to_many_search(heap, facade, phantoms, *target, sources, Direction::Reverse);
                Matrix::from_routes(sources.len(), 1, &routes)
            }
            _ if targets.len() < sources.len() => {
                let routes = bucket_search(heap, facade, phantoms, targets, sources, Direction::Reverse);
                Matrix::from_routes(targets.len(), sources.len(), &routes).transposed()
            }
            _ => {
                let routes = bucket_search(heap, facade, phantoms, sources, targets, Direction::Forward);
                Matrix::from_routes(sources.len(), targets.len(), &routes)
            }
        }
    }
}
