//! Two-phase search over a hierarchy with an uncontracted core.
//!
//! The first phase runs the stalled upward search until every frontier
//! reaches the core. Core nodes are not expanded but collected as entry
//! points, which seed the second pair of heaps. The second phase is a
//! plain bidirectional Dijkstra inside the core, without stalling since
//! core nodes carry no hierarchy.

use log::trace;

use crate::engine::{Ch, ChQueryData, ForceLoops, SearchEngineData};
use crate::facade::ChFacade;
use crate::heap::{HeapNode, QueryHeap};
use crate::primitives::{Direction, PackedPath, Weight};
use crate::routing::ch::{
    packed_path_at, retrieve_packed_path_from_heap, retrieve_packed_path_from_single_heap,
    routing_step,
};
use crate::routing::Meeting;

/// Runs the first phase on one side: a core node at the top of `heap` is
/// popped into `entry_points`, anything else is settled normally.
#[allow(clippy::too_many_arguments)]
fn step_outside_core<F>(
    facade: &F,
    direction: Direction,
    heap: &mut QueryHeap<ChQueryData>,
    opposite: &QueryHeap<ChQueryData>,
    entry_points: &mut Vec<HeapNode<ChQueryData>>,
    meeting: &mut Meeting,
    min_edge_offset: Weight,
    force_loops: ForceLoops,
) where
    F: ChFacade + ?Sized,
{
    match heap.min() {
        Some(node) if facade.is_core_node(node) => {
            if let Some(entry) = heap.delete_min_get_heap_node() {
                entry_points.push(entry);
            }
        }
        Some(_) => routing_step(
            facade,
            direction,
            heap,
            opposite,
            meeting,
            min_edge_offset,
            force_loops,
            true,
        ),
        None => {}
    }
}

fn seed_core_heap(heap: &mut QueryHeap<ChQueryData>, entry_points: Vec<HeapNode<ChQueryData>>) {
    heap.clear();
    for entry in entry_points {
        heap.insert(entry.node, entry.weight, entry.data);
    }
}

pub fn search<F>(
    engine: &mut SearchEngineData<Ch>,
    facade: &F,
    force_loops: ForceLoops,
    upper_bound: Option<Weight>,
) -> Option<(Weight, PackedPath)>
where
    F: ChFacade + ?Sized,
{
    let SearchEngineData {
        forward_heap_1: forward_heap,
        reverse_heap_1: reverse_heap,
        forward_heap_2: forward_core_heap,
        reverse_heap_2: reverse_core_heap,
        ..
    } = engine;

    let min_edge_offset = forward_heap.min_key()?.min(0);
    reverse_heap.min_key()?;

    let mut meeting = Meeting::bounded_by(upper_bound);
    let mut forward_entry_points = Vec::new();
    let mut reverse_entry_points = Vec::new();

    while !forward_heap.is_empty() || !reverse_heap.is_empty() {
        step_outside_core(
            facade,
            Direction::Forward,
            forward_heap,
            reverse_heap,
            &mut forward_entry_points,
            &mut meeting,
            min_edge_offset,
            force_loops,
        );
        step_outside_core(
            facade,
            Direction::Reverse,
            reverse_heap,
            forward_heap,
            &mut reverse_entry_points,
            &mut meeting,
            min_edge_offset,
            force_loops,
        );
    }

    trace!(
        "Core entered at {} forward and {} reverse nodes",
        forward_entry_points.len(),
        reverse_entry_points.len()
    );

    seed_core_heap(forward_core_heap, forward_entry_points);
    seed_core_heap(reverse_core_heap, reverse_entry_points);

    let min_core_edge_offset = forward_core_heap
        .min_key()
        .into_iter()
        .chain(reverse_core_heap.min_key().filter(|key| *key < 0))
        .fold(0, Weight::min);

    // Meetings outside the core are retrieved from the first pair of heaps.
    let outside_meeting = meeting;
    while let (Some(forward_min), Some(reverse_min)) =
        (forward_core_heap.min_key(), reverse_core_heap.min_key())
    {
        if meeting.weight <= forward_min + reverse_min {
            break;
        }

        routing_step(
            facade,
            Direction::Forward,
            forward_core_heap,
            reverse_core_heap,
            &mut meeting,
            min_core_edge_offset,
            force_loops,
            false,
        );
        routing_step(
            facade,
            Direction::Reverse,
            reverse_core_heap,
            forward_core_heap,
            &mut meeting,
            min_core_edge_offset,
            force_loops,
            false,
        );
    }

    let middle = meeting.middle?;

    if meeting == outside_meeting {
        let packed = packed_path_at(forward_heap, reverse_heap, middle, meeting.weight);
        return Some((meeting.weight, packed));
    }

    let through_core = forward_core_heap
        .get_key(middle)
        .zip(reverse_core_heap.get_key(middle))
        .map(|(forward, reverse)| forward + reverse);
    if through_core != Some(meeting.weight) {
        return Some((meeting.weight, vec![middle, middle]));
    }

    let core_packed = retrieve_packed_path_from_heap(forward_core_heap, reverse_core_heap, middle);
    let (Some(first), Some(last)) = (core_packed.first().copied(), core_packed.last().copied()) else {
        return None;
    };

    let mut packed = PackedPath::new();
    retrieve_packed_path_from_single_heap(forward_heap, first, &mut packed);
    packed.reverse();
    packed.extend(core_packed);
    retrieve_packed_path_from_single_heap(reverse_heap, last, &mut packed);

    Some((meeting.weight, packed))
}
