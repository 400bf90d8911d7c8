//! Bidirectional multi-level Dijkstra.
//!
//! Each settled node is expanded on its query level: cell shortcuts
//! jump from a border node across its cell, border edges leave the cell.
//! A path reached through shortcuts is unpacked by searching again
//! inside each shortcut's cell, one level lower, until only base edges
//! remain.

use log::{error, trace};

use crate::engine::{
    ForceLoops, Mld, MldHeapData, MldQueryData, SearchAlgorithm, SearchEngineData,
};
use crate::facade::{EdgeData, MldFacade};
use crate::heap::{HeapNode, IndexStorage, QueryHeap};
use crate::primitives::{
    Direction, NodeId, PackedPath, PhantomEndpoints, PhantomNode, UnpackedPath, Weight,
};
use crate::routing::{insert_nodes_in_heaps, traversable, Meeting};

#[doc(hidden)]
pub mod level;

#[doc(inline)]
pub use level::{CappedLevel, CellRestriction, PhantomGroup, QueryLevel};


/// A hop of a search result: `(from, to, through a cell shortcut)`.
pub type PackedEdge = (NodeId, NodeId, bool);

/// Relaxes the cell shortcuts and border edges of a settled node.
///
/// Shortcuts are skipped for nodes which were themselves reached by a
/// shortcut, as two shortcuts of the same cell never chain.
pub fn relax_outgoing_edges<F, D, S, L>(
    facade: &F,
    direction: Direction,
    heap: &mut QueryHeap<D, S>,
    settled: &HeapNode<D>,
    endpoints: &L,
) where
    F: MldFacade + ?Sized,
    D: MldHeapData,
    S: IndexStorage,
    L: QueryLevel + ?Sized,
{
    let partition = facade.partition();
    let node = settled.node;
    let Some(level) = endpoints.level(partition, node) else {
        return;
    };

    if level >= 1 && !settled.data.from_clique_arc() {
        let cell = facade
            .cell_storage()
            .cell(facade.cell_metric(), level, partition.cell(level, node));

        if let Some(cell) = cell {
            let mut relax = |to: NodeId, shortcut: Option<Weight>, distance: Option<f64>| {
                let Some(shortcut) = shortcut else {
                    return;
                };
                if to == node {
                    return;
                }
                let distance = if D::TRACKS_DISTANCE {
                    settled.data.distance() + distance.unwrap_or_default()
                } else {
                    0.0
                };
                heap.insert_or_update(to, settled.weight + shortcut, D::new(node, true, distance));
            };

            match direction {
                Direction::Forward => {
                    let shortcuts = cell
                        .destination_nodes()
                        .iter()
                        .zip(cell.out_weights(node))
                        .zip(cell.out_distances(node));
                    for ((to, weight), distance) in shortcuts {
                        relax(*to, *weight, *distance);
                    }
                }
                Direction::Reverse => {
                    let shortcuts = cell
                        .source_nodes()
                        .iter()
                        .zip(cell.in_weights(node))
                        .zip(cell.in_distances(node));
                    for ((to, weight), distance) in shortcuts {
                        relax(*to, weight, distance);
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
        if facade.exclude_node(to) || !endpoints.allows(partition.cell(level + 1, to)) {
            continue;
        }

        let distance = settled.data.distance() + data.distance();
        heap.insert_or_update(
            to,
            settled.weight + data.weight(),
            D::new(node, false, distance),
        );
    }
}

/// Settles the minimum of `heap`, records a meeting with the `opposite`
/// search and relaxes the node.
pub fn routing_step<F, D, S, L>(
    facade: &F,
    direction: Direction,
    heap: &mut QueryHeap<D, S>,
    opposite: &QueryHeap<D, S>,
    meeting: &mut Meeting,
    force_loops: ForceLoops,
    endpoints: &L,
) where
    F: MldFacade + ?Sized,
    D: MldHeapData,
    S: IndexStorage,
    L: QueryLevel + ?Sized,
{
    let Some(settled) = heap.delete_min_get_heap_node() else {
        return;
    };

    if let Some(reached) = opposite.get_heap_node_if_was_inserted(settled.node) {
        let path_weight = settled.weight + reached.weight;
        let forced = force_loops.forces(settled.data.parent(), reached.data.parent());

        if !forced && path_weight >= 0 && path_weight < meeting.weight {
            meeting.improve(settled.node, path_weight);
        }
    }

    relax_outgoing_edges(facade, direction, heap, &settled, endpoints);
}

/// Alternates both searches until their minima add up to the best
/// meeting. Returns the meeting node and weight, `None` when the heaps
/// are unseeded or the searches do not meet below `upper_bound`.
pub fn run_search<F, D, S, L>(
    facade: &F,
    forward_heap: &mut QueryHeap<D, S>,
    reverse_heap: &mut QueryHeap<D, S>,
    force_loops: ForceLoops,
    upper_bound: Option<Weight>,
    endpoints: &L,
) -> Option<(NodeId, Weight)>
where
    F: MldFacade + ?Sized,
    D: MldHeapData,
    S: IndexStorage,
    L: QueryLevel + ?Sized,
{
    let mut forward_min = forward_heap.min_key()?;
    let mut reverse_min = reverse_heap.min_key()?;

    let mut meeting = Meeting::bounded_by(upper_bound);

    // An exhausted side keeps its last minimum while the other one
    // settles what is left.
    while (!forward_heap.is_empty() || !reverse_heap.is_empty())
        && forward_min.saturating_add(reverse_min) < meeting.weight
    {
        routing_step(
            facade,
            Direction::Forward,
            forward_heap,
            reverse_heap,
            &mut meeting,
            force_loops,
            endpoints,
        );
        if let Some(key) = forward_heap.min_key() {
            forward_min = key;
        }

        routing_step(
            facade,
            Direction::Reverse,
            reverse_heap,
            forward_heap,
            &mut meeting,
            force_loops,
            endpoints,
        );
        if let Some(key) = reverse_heap.min_key() {
            reverse_min = key;
        }
    }

    let middle = meeting.middle?;
    Some((middle, meeting.weight))
}

/// Appends the hops from `middle` back to its seed in `heap`, oriented
/// in travel direction of a search running in `direction`.
pub fn retrieve_packed_path_from_single_heap<D, S>(
    heap: &QueryHeap<D, S>,
    middle: NodeId,
    direction: Direction,
    path: &mut Vec<PackedEdge>,
) where
    D: MldHeapData,
    S: IndexStorage,
{
    let mut current = middle;
    while let Some(data) = heap.get_data(current) {
        let parent = data.parent();
        if parent == current {
            break;
        }

        path.push(match direction {
            Direction::Forward => (parent, current, data.from_clique_arc()),
            Direction::Reverse => (current, parent, data.from_clique_arc()),
        });
        current = parent;
    }
}

/// Source to target hops through `middle`.
pub fn retrieve_packed_path_from_heap<D, S>(
    forward_heap: &QueryHeap<D, S>,
    reverse_heap: &QueryHeap<D, S>,
    middle: NodeId,
) -> Vec<PackedEdge>
where
    D: MldHeapData,
    S: IndexStorage,
{
    let mut path = Vec::new();
    retrieve_packed_path_from_single_heap(forward_heap, middle, Direction::Forward, &mut path);
    path.reverse();
    retrieve_packed_path_from_single_heap(reverse_heap, middle, Direction::Reverse, &mut path);
    path
}

/// Bidirectional search over pre-seeded heaps, returning the best weight
/// and the path over base edges.
///
/// Cell shortcuts of the result are unpacked by a search restricted to
/// the shortcut's cell one level below, reusing both heaps. The recursion
/// depth is bounded by the number of partition levels.
pub fn search_heaps<F, L>(
    facade: &F,
    forward_heap: &mut QueryHeap<MldQueryData>,
    reverse_heap: &mut QueryHeap<MldQueryData>,
    force_loops: ForceLoops,
    upper_bound: Option<Weight>,
    endpoints: &L,
) -> Option<(Weight, UnpackedPath)>
where
    F: MldFacade + ?Sized,
    L: QueryLevel + ?Sized,
{
    let (middle, weight) = run_search(
        facade,
        forward_heap,
        reverse_heap,
        force_loops,
        upper_bound,
        endpoints,
    )?;

    let packed = retrieve_packed_path_from_heap(forward_heap, reverse_heap, middle);
    let source = packed.first().map_or(middle, |(from, ..)| *from);
    let unpacked = unpack_packed_path(
        facade,
        forward_heap,
        reverse_heap,
        source,
        &packed,
        force_loops,
        endpoints,
    )?;

    Some((weight, unpacked))
}

/// Expands the hops of `packed`, starting at `source`, into base edges.
///
/// Each cell shortcut is replaced by the result of a search confined to
/// its cell one level below the level it was taken on in `endpoints`.
/// Both heaps are cleared and reused by the sub-searches.
pub fn unpack_packed_path<F, L>(
    facade: &F,
    forward_heap: &mut QueryHeap<MldQueryData>,
    reverse_heap: &mut QueryHeap<MldQueryData>,
    source: NodeId,
    packed: &[PackedEdge],
    force_loops: ForceLoops,
    endpoints: &L,
) -> Option<UnpackedPath>
where
    F: MldFacade + ?Sized,
    L: QueryLevel + ?Sized,
{
    let partition = facade.partition();
    let mut unpacked = UnpackedPath::single(source);

    for &(from, to, through_cell) in packed {
        if !through_cell {
            let Some(edge) = facade.find_edge(from, to) else {
                error!("No base edge between {from} and {to} while unpacking");
                debug_assert!(false, "base edge {from} -> {to} is missing");
                return None;
            };
            unpacked.nodes.push(to);
            unpacked.edges.push(edge);
            continue;
        }

        let level = endpoints.level(partition, from)?;
        debug_assert!(level >= 1, "cell shortcut settled on the base level");

        let restriction = CellRestriction {
            level: level.saturating_sub(1),
            parent_cell: partition.cell(level, from),
        };
        trace!("Unpacking shortcut {from} -> {to} on level {level}");

        forward_heap.clear();
        reverse_heap.clear();
        forward_heap.insert(from, 0, MldQueryData { parent: from, from_clique_arc: false });
        reverse_heap.insert(to, 0, MldQueryData { parent: to, from_clique_arc: false });

        let Some((_, inner)) = search_heaps(
            facade,
            forward_heap,
            reverse_heap,
            force_loops,
            None,
            &restriction,
        ) else {
            error!("Cell shortcut {from} -> {to} could not be unpacked");
            return None;
        };
        unpacked.splice(inner);
    }

    Some(unpacked)
}

/// Searches the seeded `forward_heap_1` and `reverse_heap_1` of the
/// workspace.
pub fn search<F, L>(
    engine: &mut SearchEngineData<Mld>,
    facade: &F,
    force_loops: ForceLoops,
    endpoints: &L,
    upper_bound: Option<Weight>,
) -> Option<(Weight, UnpackedPath)>
where
    F: MldFacade + ?Sized,
    L: QueryLevel + ?Sized,
{
    let SearchEngineData {
        forward_heap_1,
        reverse_heap_1,
        ..
    } = engine;
    search_heaps(
        facade,
        forward_heap_1,
        reverse_heap_1,
        force_loops,
        upper_bound,
        endpoints,
    )
}

/// Looks up the base edge of every hop of a node sequence.
pub fn unpack_to_path<F>(facade: &F, nodes: &[NodeId]) -> UnpackedPath
where
    F: MldFacade + ?Sized,
{
    let Some(first) = nodes.first() else {
        return UnpackedPath::default();
    };

    let mut unpacked = UnpackedPath::single(*first);
    for hop in nodes.windows(2) {
        let Some(edge) = facade.find_edge(hop[0], hop[1]) else {
            error!("No base edge between {} and {}", hop[0], hop[1]);
            return UnpackedPath::default();
        };
        unpacked.nodes.push(hop[1]);
        unpacked.edges.push(edge);
    }
    unpacked
}

/// Network distance (m) between two phantoms, accumulated from edge and
/// shortcut distances on the map matching heaps.
pub fn network_distance<F>(
    engine: &mut SearchEngineData<Mld>,
    facade: &F,
    source: &PhantomNode,
    target: &PhantomNode,
    upper_bound: Option<Weight>,
) -> f64
where
    F: MldFacade + ?Sized,
{
    let SearchEngineData {
        map_matching_forward_heap: forward,
        map_matching_reverse_heap: reverse,
        ..
    } = engine;
    forward.clear();
    reverse.clear();

    let endpoints = PhantomEndpoints::new(*source, *target);
    insert_nodes_in_heaps(forward, reverse, &endpoints);

    let Some((middle, _)) = run_search(
        facade,
        forward,
        reverse,
        ForceLoops::NONE,
        upper_bound,
        &endpoints,
    ) else {
        return f64::MAX;
    };

    match (forward.get_data(middle), reverse.get_data(middle)) {
        (Some(forward), Some(reverse)) => forward.distance + reverse.distance,
        _ => f64::MAX,
    }
}

impl<F> SearchAlgorithm<F> for Mld
where
    F: MldFacade + ?Sized,
{
    /// The returned node sequence is already expanded to base edges.
    fn search<L: QueryLevel + ?Sized>(
        engine: &mut SearchEngineData<Self>,
        facade: &F,
        force_loops: ForceLoops,
        endpoints: &L,
        upper_bound: Option<Weight>,
    ) -> Option<(Weight, PackedPath)> {
        search(engine, facade, force_loops, endpoints, upper_bound)
            .map(|(weight, unpacked)| (weight, unpacked.nodes))
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
