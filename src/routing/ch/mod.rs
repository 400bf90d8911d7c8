//! Bidirectional search over a contraction hierarchy.
//!
//! Both searches only walk upwards in the hierarchy: the forward search
//! follows edges flagged `forward`, the reverse search edges flagged
//! `backward`. They meet at the highest ranked node of the shortest path.
//! Nodes reached on a suboptimal branch are stalled (not expanded) as
//! soon as an incoming edge proves a shorter path exists.

use log::{debug, trace};

use crate::engine::{Ch, ChQueryData, ForceLoops, HeapData, SearchAlgorithm, SearchEngineData};
use crate::facade::ChFacade;
use crate::heap::{IndexStorage, QueryHeap};
use crate::primitives::{
    Direction, Distance, NodeId, PackedPath, PhantomEndpoints, PhantomNode, UnpackedPath, Weight,
};
use crate::routing::mld::QueryLevel;
use crate::routing::{insert_nodes_in_heaps, path_distance, traversable, Meeting};

#[doc(hidden)]
pub mod cache;
#[doc(hidden)]
pub mod core_search;
#[doc(hidden)]
pub mod unpack;

#[doc(inline)]
pub use cache::{calculate_ebg_node_annotations, UnpackingCache};
#[doc(inline)]
pub use unpack::{unpack_edge, unpack_path, unpack_to_path};

#[cfg(test)]
mod test;

#[inline]
fn parent_of<D: HeapData, S: IndexStorage>(heap: &QueryHeap<D, S>, node: NodeId) -> Option<NodeId> {
    heap.get_data(node).map(HeapData::parent)
}

/// True when a neighbour already settled by this search reaches `node`
/// for less than `weight`, so expanding `node` cannot be optimal.
pub fn stall_at_node<F, D, S>(
    facade: &F,
    direction: Direction,
    node: NodeId,
    weight: Weight,
    heap: &QueryHeap<D, S>,
) -> bool
where
    F: ChFacade + ?Sized,
    S: IndexStorage,
{
    facade.adjacent_edges(node).any(|edge| {
        let data = facade.edge_data(edge);
        traversable(direction.opposite(), data)
            && heap
                .get_key(facade.target(edge))
                .is_some_and(|key| key + data.weight < weight)
    })
}

pub fn relax_outgoing_edges<F>(
    facade: &F,
    direction: Direction,
    node: NodeId,
    weight: Weight,
    heap: &mut QueryHeap<ChQueryData>,
) where
    F: ChFacade + ?Sized,
{
    for edge in facade.adjacent_edges(node) {
        let data = facade.edge_data(edge);
        if !traversable(direction, data) {
            continue;
        }

        debug_assert!(data.weight > 0, "edge weight must be positive");
        let to = facade.target(edge);
        let to_weight = weight + data.weight;

        match heap.get_key(to) {
            None => heap.insert(to, to_weight, ChQueryData { parent: node }),
            Some(key) if to_weight < key => {
                heap.decrease_key(to, to_weight, ChQueryData { parent: node })
            }
            Some(_) => {}
        }
    }
}

/// Settles the minimum of `heap` and relaxes its edges.
///
/// A node which is also reached by the `opposite` search is a meeting
/// candidate. When a loop is forced at a seed node, or the offsets of
/// two seeds on the same segment make the combined weight negative, the
/// meeting is only accepted by way of a self-loop at that node.
///
/// `min_edge_offset` is the smallest (non-positive) seed key of the
/// forward search; it keeps the termination test valid with negative
/// seeds.
#[allow(clippy::too_many_arguments)]
pub fn routing_step<F>(
    facade: &F,
    direction: Direction,
    heap: &mut QueryHeap<ChQueryData>,
    opposite: &QueryHeap<ChQueryData>,
    meeting: &mut Meeting,
    min_edge_offset: Weight,
    force_loops: ForceLoops,
    stalling: bool,
) where
    F: ChFacade + ?Sized,
{
    let Some(node) = heap.delete_min() else {
        return;
    };
    let Some(weight) = heap.get_key(node) else {
        return;
    };

    if let Some(opposite_weight) = opposite.get_key(node) {
        let new_weight = weight + opposite_weight;
        if new_weight < meeting.weight {
            let (forward_parent, reverse_parent) = match direction {
                Direction::Forward => (parent_of(heap, node), parent_of(opposite, node)),
                Direction::Reverse => (parent_of(opposite, node), parent_of(heap, node)),
            };
            let forced = (force_loops.forward.is_some() && forward_parent == Some(node))
                || (force_loops.reverse.is_some() && reverse_parent == Some(node));

            if forced || new_weight < 0 {
                for edge in facade.adjacent_edges(node) {
                    let data = facade.edge_data(edge);
                    if traversable(direction, data) && facade.target(edge) == node {
                        let loop_weight = new_weight + data.weight;
                        if loop_weight >= 0 && loop_weight < meeting.weight {
                            meeting.improve(node, loop_weight);
                        }
                    }
                }
            } else {
                meeting.improve(node, new_weight);
            }
        }
    }

    debug_assert!(min_edge_offset <= 0);
    if weight + min_edge_offset > meeting.weight {
        heap.delete_all();
        return;
    }

    if stalling && stall_at_node(facade, direction, node, weight, heap) {
        return;
    }

    relax_outgoing_edges(facade, direction, node, weight, heap);
}

/// Smallest forward self-loop at `node`, by duration or weight, with its
/// distance.
pub fn get_loop_weight<F>(facade: &F, node: NodeId, use_duration: bool) -> Option<(Weight, Distance)>
where
    F: ChFacade + ?Sized,
{
    facade
        .adjacent_edges(node)
        .filter(|edge| facade.target(*edge) == node)
        .map(|edge| facade.edge_data(edge))
        .filter(|data| data.forward)
        .map(|data| {
            let value = if use_duration { data.duration } else { data.weight };
            (value, data.distance)
        })
        .min_by_key(|(value, _)| *value)
}

/// Walks the parents of `middle` in `heap`, appending them to `path`.
///
/// Seeds are their own parent. Entry nodes of a core search point to a
/// parent which is not in the core heap; both end the walk.
pub fn retrieve_packed_path_from_single_heap<D, S>(
    heap: &QueryHeap<D, S>,
    middle: NodeId,
    path: &mut PackedPath,
) where
    D: HeapData,
    S: IndexStorage,
{
    let mut current = middle;
    while let Some(parent) = parent_of(heap, current) {
        if parent == current || !heap.was_inserted(parent) {
            break;
        }
        current = parent;
        path.push(current);
    }
}

/// Source to target node sequence through `middle`.
pub fn retrieve_packed_path_from_heap<D, S>(
    forward_heap: &QueryHeap<D, S>,
    reverse_heap: &QueryHeap<D, S>,
    middle: NodeId,
) -> PackedPath
where
    D: HeapData,
    S: IndexStorage,
{
    let mut path = PackedPath::new();
    retrieve_packed_path_from_single_heap(forward_heap, middle, &mut path);
    path.reverse();
    path.push(middle);
    retrieve_packed_path_from_single_heap(reverse_heap, middle, &mut path);
    path
}

/// The packed path of a finished search meeting at `middle`, or the
/// `[middle, middle]` self-loop when the loop weight made up the result.
pub(crate) fn packed_path_at(
    forward_heap: &QueryHeap<ChQueryData>,
    reverse_heap: &QueryHeap<ChQueryData>,
    middle: NodeId,
    weight: Weight,
) -> PackedPath {
    let through = forward_heap
        .get_key(middle)
        .zip(reverse_heap.get_key(middle))
        .map(|(forward, reverse)| forward + reverse);

    if through == Some(weight) {
        retrieve_packed_path_from_heap(forward_heap, reverse_heap, middle)
    } else {
        vec![middle, middle]
    }
}

/// Bidirectional search over pre-seeded heaps.
///
/// Returns `None` when either heap is empty or the searches do not meet
/// below `upper_bound`.
pub fn search_heaps<F>(
    facade: &F,
    forward_heap: &mut QueryHeap<ChQueryData>,
    reverse_heap: &mut QueryHeap<ChQueryData>,
    force_loops: ForceLoops,
    upper_bound: Option<Weight>,
) -> Option<(Weight, PackedPath)>
where
    F: ChFacade + ?Sized,
{
    let min_edge_offset = forward_heap.min_key()?.min(0);
    reverse_heap.min_key()?;

    let mut meeting = Meeting::bounded_by(upper_bound);

    while !forward_heap.is_empty() || !reverse_heap.is_empty() {
        if !forward_heap.is_empty() {
            routing_step(
                facade,
                Direction::Forward,
                forward_heap,
                reverse_heap,
                &mut meeting,
                min_edge_offset,
                force_loops,
                true,
            );
        }
        if !reverse_heap.is_empty() {
            routing_step(
                facade,
                Direction::Reverse,
                reverse_heap,
                forward_heap,
                &mut meeting,
                min_edge_offset,
                force_loops,
                true,
            );
        }
    }

    let middle = meeting.middle?;
    trace!("Searches met at {middle} with weight {}", meeting.weight);

    let packed = packed_path_at(forward_heap, reverse_heap, middle, meeting.weight);
    Some((meeting.weight, packed))
}

/// Searches the seeded `forward_heap_1` and `reverse_heap_1` of the
/// workspace, switching to the two-phase core search when the facade has
/// an uncontracted core.
pub fn search<F>(
    engine: &mut SearchEngineData<Ch>,
    facade: &F,
    force_loops: ForceLoops,
    upper_bound: Option<Weight>,
) -> Option<(Weight, PackedPath)>
where
    F: ChFacade + ?Sized,
{
    if facade.has_core() {
        return core_search::search(engine, facade, force_loops, upper_bound);
    }

    let SearchEngineData {
        forward_heap_1,
        reverse_heap_1,
        ..
    } = engine;
    search_heaps(facade, forward_heap_1, reverse_heap_1, force_loops, upper_bound)
}

/// Route length in metres between two phantoms, following the unpacked
/// path's node coordinates.
pub fn network_distance<F>(
    engine: &mut SearchEngineData<Ch>,
    facade: &F,
    source: &PhantomNode,
    target: &PhantomNode,
    upper_bound: Option<Weight>,
) -> f64
where
    F: ChFacade + ?Sized,
{
    engine.forward_heap_1.clear();
    engine.reverse_heap_1.clear();

    let endpoints = PhantomEndpoints::new(*source, *target);
    insert_nodes_in_heaps(&mut engine.forward_heap_1, &mut engine.reverse_heap_1, &endpoints);

    let Some((_, packed)) = search(engine, facade, ForceLoops::NONE, upper_bound) else {
        return f64::MAX;
    };

    let unpacked = unpack_to_path(facade, &packed);
    if unpacked.is_empty() {
        debug!("Route between phantoms could not be unpacked");
        return f64::MAX;
    }

    path_distance(
        source.location,
        unpacked.nodes.iter().map(|node| facade.coordinate(*node)),
        target.location,
    )
}

impl<F> SearchAlgorithm<F> for Ch
where
    F: ChFacade + ?Sized,
{
    fn search<L: QueryLevel + ?Sized>(
        engine: &mut SearchEngineData<Self>,
        facade: &F,
        force_loops: ForceLoops,
        _: &L,
        upper_bound: Option<Weight>,
    ) -> Option<(Weight, PackedPath)> {
        search(engine, facade, force_loops, upper_bound)
    }

    fn unpack_path(facade: &F, packed_path: &[NodeId]) -> UnpackedPath {
        unpack_to_path(facade, packed_path)
    }

    fn network_distance(
        engine: &mut SearchEngineData<Self>,
        facade: &F,
        source: &PhantomNode,
        target: &PhantomNode,
        upper_bound: Option<Weight>,
    ) -> f64 {
        network_distance(engine, facade, source, target, upper_bound)
    }
}
