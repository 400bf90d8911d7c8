//! Bucket based many-to-many search on a contraction hierarchy.
//!
//! The reverse searches from the targets are independent and run in
//! parallel, each on a heap of its own. The forward searches from the
//! sources share the workspace heap and run one after the other, so
//! that every source row can be unpacked from the heap it was found on.

use log::{trace, warn};
use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};

use crate::engine::{Ch, ChManyToManyData, SearchEngineData};
use crate::facade::ChFacade;
use crate::heap::{HeapNode, MapStorage, QueryHeap};
use crate::primitives::{Direction, Distance, NodeId, PackedPath, PhantomNode};
use crate::routing::ch::{
    calculate_ebg_node_annotations, get_loop_weight, retrieve_packed_path_from_single_heap,
    stall_at_node, UnpackingCache,
};
use crate::routing::matrix::{
    bucket_of, buckets_at, improve, sort_buckets, ManyToManyAlgorithm, Matrix, MatrixRoute,
    NodeBucket,
};
use crate::routing::{insert_nodes_in_heap, traversable};

type ManyToManyHeap = QueryHeap<ChManyToManyData, MapStorage>;

fn relax_outgoing_edges<F>(
    facade: &F,
    direction: Direction,
    settled: &HeapNode<ChManyToManyData>,
    heap: &mut ManyToManyHeap,
) where
    F: ChFacade + ?Sized,
{
    if stall_at_node(facade, direction, settled.node, settled.weight, heap) {
        return;
    }

    for edge in facade.adjacent_edges(settled.node) {
        let data = facade.edge_data(edge);
        if !traversable(direction, data) {
            continue;
        }

        let to = facade.target(edge);
        let to_weight = settled.weight + data.weight;
        let to_duration = settled.data.duration + data.duration;
        let to_data = ChManyToManyData {
            parent: settled.node,
            duration: to_duration,
        };

        if !heap.was_inserted(to) {
            heap.insert(to, to_weight, to_data);
        } else if !heap.was_removed(to)
            && heap
                .get_heap_node_if_was_inserted(to)
                .is_some_and(|known| (to_weight, to_duration) < (known.weight, known.data.duration))
        {
            heap.decrease_key(to, to_weight, to_data);
        }
    }
}

/// Exhausts a reverse search from `target`, returning every settled node
/// as a bucket of `column`.
fn backward_search<F>(facade: &F, column: usize, target: &PhantomNode) -> Vec<NodeBucket>
where
    F: ChFacade + ?Sized,
{
    let mut heap = ManyToManyHeap::new(facade.number_of_nodes());
    insert_nodes_in_heap(&mut heap, target, Direction::Reverse);

    let mut buckets = Vec::new();
    while let Some(settled) = heap.delete_min_get_heap_node() {
        buckets.push(NodeBucket {
            node: settled.node,
            parent: settled.data.parent,
            from_clique_arc: false,
            column,
            weight: settled.weight,
            duration: settled.data.duration,
            distance: 0.0,
        });
        relax_outgoing_edges(facade, Direction::Reverse, &settled, &mut heap);
    }
    buckets
}

/// Settles the forward search of one source, scanning the buckets of
/// every settled node. A negative combined weight means the source lies
/// behind the target on the same segment; the route is then only valid
/// by way of a self-loop at the meeting node.
fn forward_search<F>(
    facade: &F,
    heap: &mut ManyToManyHeap,
    buckets: &[NodeBucket],
    row: &mut [Option<MatrixRoute>],
) where
    F: ChFacade + ?Sized,
{
    while let Some(settled) = heap.delete_min_get_heap_node() {
        for bucket in buckets_at(buckets, settled.node) {
            let weight = settled.weight + bucket.weight;
            let duration = settled.data.duration + bucket.duration;

            let route = if weight < 0 {
                let Some((loop_weight, _)) = get_loop_weight(facade, settled.node, false)
                    .filter(|(loop_weight, _)| weight + loop_weight >= 0)
                else {
                    continue;
                };
                let loop_duration = get_loop_weight(facade, settled.node, true)
                    .map_or(0, |(loop_duration, _)| loop_duration);

                MatrixRoute {
                    weight: weight + loop_weight,
                    duration: duration + loop_duration,
                    distance: 0.0,
                    middle: settled.node,
                    looped: true,
                }
            } else {
                MatrixRoute {
                    weight,
                    duration,
                    distance: 0.0,
                    middle: settled.node,
                    looped: false,
                }
            };

            improve(&mut row[bucket.column], route);
        }

        relax_outgoing_edges(facade, Direction::Forward, &settled, heap);
    }
}

/// Source to target packed path of a matrix route: the forward tree from
/// the source to the middle, then the bucket parents of the target's
/// column.
fn retrieve_packed_path(
    heap: &ManyToManyHeap,
    buckets: &[NodeBucket],
    route: &MatrixRoute,
    column: usize,
) -> PackedPath {
    let mut packed = PackedPath::new();
    retrieve_packed_path_from_single_heap(heap, route.middle, &mut packed);
    packed.reverse();
    packed.push(route.middle);
    if route.looped {
        packed.push(route.middle);
    }

    let mut current = route.middle;
    while let Some(bucket) = bucket_of(buckets, current, column) {
        if bucket.parent == current {
            break;
        }
        packed.push(bucket.parent);
        current = bucket.parent;
    }
    packed
}

/// Network distance of a packed route between two phantoms: the edge
/// distances less the part of the source segment behind the source, plus
/// the part of the target segment before the target.
fn route_distance<F>(
    facade: &F,
    packed: &[NodeId],
    source: &PhantomNode,
    target: &PhantomNode,
    cache: &mut UnpackingCache,
) -> Option<Distance>
where
    F: ChFacade + ?Sized,
{
    let (first, last) = (packed.first()?, packed.last()?);
    let (_, annotation) = calculate_ebg_node_annotations(facade, packed, cache)?;

    let source_offset = if source.is_valid_forward_source() && source.forward_segment_id.id == *first {
        source.forward_distance
    } else if source.is_valid_reverse_source() && source.reverse_segment_id.id == *first {
        source.reverse_distance
    } else {
        0.0
    };
    let target_offset = if target.is_valid_forward_target() && target.forward_segment_id.id == *last {
        target.forward_distance
    } else if target.is_valid_reverse_target() && target.reverse_segment_id.id == *last {
        target.reverse_distance
    } else {
        0.0
    };

    Some(annotation - source_offset + target_offset)
}

impl<F> ManyToManyAlgorithm<F> for Ch
where
    F: ChFacade + Sync + ?Sized,
{
    fn many_to_many(
        engine: &mut SearchEngineData<Self>,
        facade: &F,
        phantoms: &[PhantomNode],
        sources: &[usize],
        targets: &[usize],
    ) -> Matrix {
        let mut buckets: Vec<NodeBucket> = targets
            .par_iter()
            .enumerate()
            .flat_map_iter(|(column, target)| backward_search(facade, column, &phantoms[*target]))
            .collect();
        sort_buckets(&mut buckets);
        trace!("Backward searches left {} buckets", buckets.len());

        let SearchEngineData {
            many_to_many_heap: heap,
            unpacking_cache: cache,
            ..
        } = engine;
        cache.invalidate_if_stale(facade.timestamp());

        let mut routes = vec![None; sources.len() * targets.len()];
        for (row, source) in sources.iter().enumerate() {
            let source_phantom = &phantoms[*source];
            let row_routes = &mut routes[row * targets.len()..(row + 1) * targets.len()];

            heap.clear();
            insert_nodes_in_heap(heap, source_phantom, Direction::Forward);
            forward_search(facade, heap, &buckets, row_routes);

            for (column, slot) in row_routes.iter_mut().enumerate() {
                let Some(route) = slot.as_mut() else {
                    continue;
                };

                let packed = retrieve_packed_path(heap, &buckets, route, column);
                match route_distance(facade, &packed, source_phantom, &phantoms[targets[column]], cache) {
                    Some(distance) => route.distance = distance,
                    None => {
                        warn!("Route {source} -> {} could not be annotated", targets[column]);
                        *slot = None;
                    }
                }
            }
        }

        Matrix::from_routes(sources.len(), targets.len(), &routes)
    }
}
