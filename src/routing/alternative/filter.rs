//! Candidate filters of the alternative route search.
//!
//! Every filter keeps the relative order of the candidates it does not
//! drop. Filters over paths take the shortest path as their first entry
//! and never remove it.

use log::trace;
use rustc_hash::FxHashSet;

use crate::engine::HeapData;
use crate::facade::{BaseFacade, MultiLevelPartition};
use crate::heap::QueryHeap;
use crate::primitives::{NodeId, RouteResult, UnpackedPath, Weight};
use crate::routing::alternative::Parameters;
use crate::routing::mld::PackedEdge;

/// A meeting of both search spaces and the weight of the path through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightedVia {
    pub node: NodeId,
    pub weight: Weight,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackedCandidate {
    pub via: WeightedVia,
    pub path: Vec<PackedEdge>,
}

impl PackedCandidate {
    /// Every node of the path, source first.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        let first = self.path.first().map(|(from, ..)| *from);
        first
            .into_iter()
            .chain(self.path.iter().map(|(_, to, _)| *to))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnpackedCandidate {
    pub via: WeightedVia,
    /// Share of the path's duration on previously accepted paths.
    pub sharing: f64,
    pub path: UnpackedPath,
}

/// Keeps the cheapest candidate of every node.
pub fn unique_nodes(vias: &mut Vec<WeightedVia>) {
    vias.sort_unstable_by_key(|via| (via.node, via.weight));
    vias.dedup_by_key(|via| via.node);
}

/// Placeholder for dropping vias on minor roads. The graph carries no
/// road classes, so every via is kept.
pub fn road_importance<F: BaseFacade + ?Sized>(_vias: &mut Vec<WeightedVia>, _facade: &F) {}

/// Drops vias whose path is more than `at_most_longer_by` longer than
/// the shortest path.
pub fn stretch(vias: &mut Vec<WeightedVia>, shortest: Weight, parameters: &Parameters) {
    let limit = (1.0 + parameters.at_most_longer_by) * shortest as f64;
    vias.retain(|via| via.weight as f64 <= limit);
}

/// Drops vias lying on the shortest path, which would only reproduce it.
pub fn via_not_on_path(vias: &mut Vec<WeightedVia>, shortest: &PackedCandidate) {
    let nodes = shortest.nodes().collect::<FxHashSet<_>>();
    vias.retain(|via| via.node != shortest.via.node && !nodes.contains(&via.node));
}

/// `node` lies on a plateau if the search from the other side reaches
/// `node`'s parent in `first` through `node` itself.
fn has_plateaux_at_node<D: HeapData>(node: NodeId, first: &QueryHeap<D>, second: &QueryHeap<D>) -> bool {
    first
        .get_data(node)
        .and_then(|data| second.get_data(data.parent()))
        .is_some_and(|data| data.parent() == node)
}

/// Last node of the plateau around `node`, following the parents of `first`.
fn plateaux_end<D: HeapData>(mut node: NodeId, first: &QueryHeap<D>, second: &QueryHeap<D>) -> NodeId {
    while let Some(parent) = first.get_data(node).map(HeapData::parent) {
        if parent == node || !has_plateaux_at_node(node, first, second) {
            break;
        }
        node = parent;
    }
    node
}

/// Whether the part of `candidate` around its via is a shortest path for
/// at least `at_least_optimal_around_via_by` of its detour from `shortest`.
///
/// The plateau is the stretch on which both search trees run along the
/// candidate. The detour spans from the last node shared with the
/// shortest path before the via to the first one after it.
pub fn is_locally_optimal<D: HeapData>(
    candidate: &PackedCandidate,
    shortest: &PackedCandidate,
    forward_heap: &QueryHeap<D>,
    reverse_heap: &QueryHeap<D>,
    parameters: &Parameters,
) -> bool {
    if candidate.path.is_empty() {
        return true;
    }

    let via = candidate.via.node;
    let first_on_plateaux = plateaux_end(via, forward_heap, reverse_heap);
    let last_on_plateaux = plateaux_end(via, reverse_heap, forward_heap);

    let common_prefix = candidate
        .path
        .iter()
        .zip(&shortest.path)
        .take_while(|(left, right)| left == right)
        .count();
    let common_suffix = candidate
        .path
        .iter()
        .rev()
        .zip(shortest.path.iter().rev())
        .take_while(|(left, right)| left == right)
        .count();

    // A candidate without a deviation from the shortest path has no detour.
    let (Some(deviation), Some(rejoin)) = (
        candidate.path.get(common_prefix).map(|(from, ..)| *from),
        candidate
            .path
            .len()
            .checked_sub(common_suffix + 1)
            .and_then(|index| candidate.path.get(index))
            .map(|(_, to, _)| *to),
    ) else {
        return false;
    };

    let keys = (
        forward_heap.get_key(first_on_plateaux),
        forward_heap.get_key(last_on_plateaux),
        forward_heap.get_key(via),
        forward_heap.get_key(deviation),
        reverse_heap.get_key(via),
        reverse_heap.get_key(rejoin),
    );
    let (Some(first), Some(last), Some(to_via), Some(to_deviation), Some(from_via), Some(from_rejoin)) = keys else {
        return false;
    };

    let plateaux_length = last - first;
    let detour_length = to_via - to_deviation + from_via - from_rejoin;
    trace!("Via {via}: plateau {plateaux_length}, detour {detour_length}");

    plateaux_length as f64 >= parameters.at_least_optimal_around_via_by * detour_length as f64
}

/// Drops paths whose level one cells were mostly visited by the shortest
/// path or by a path accepted before them.
pub fn cell_sharing(
    paths: &mut Vec<PackedCandidate>,
    partition: &MultiLevelPartition,
    parameters: &Parameters,
) {
    if parameters.cells_at_most_same_by >= 1.0 || paths.len() < 2 || partition.number_of_levels() < 2 {
        return;
    }
    if paths[0].path.is_empty() {
        return;
    }

    let cell = |node: NodeId| partition.cell(1, node);
    let mut cells = paths[0].nodes().map(cell).collect::<FxHashSet<_>>();

    let mut alternatives = paths.split_off(1);
    alternatives.retain(|candidate| {
        if candidate.path.is_empty() {
            return true;
        }

        let different = candidate
            .path
            .iter()
            .filter(|(from, to, _)| !cells.contains(&cell(*from)) && !cells.contains(&cell(*to)))
            .count();
        let sharing = 1.0 - different as f64 / (candidate.path.len() + 1) as f64;

        if sharing > parameters.cells_at_most_same_by {
            return false;
        }
        cells.extend(candidate.nodes().map(cell));
        true
    });
    paths.extend(alternatives);
}

/// Drops paths spending more than `at_most_same_by` of their node
/// durations on the shortest path or on a path accepted before them,
/// then ranks the rest by that share.
pub fn sharing<F: BaseFacade + ?Sized>(
    paths: &mut Vec<UnpackedCandidate>,
    facade: &F,
    parameters: &Parameters,
) {
    if paths.len() < 2 || paths[0].path.edges.is_empty() {
        return;
    }

    let mut nodes = paths[0].path.nodes.iter().copied().collect::<FxHashSet<_>>();

    let mut alternatives = paths.split_off(1);
    alternatives.retain_mut(|candidate| {
        if candidate.path.edges.is_empty() {
            return true;
        }

        let (shared, total) = candidate
            .path
            .nodes
            .iter()
            .fold((0, 0), |(shared, total), node| {
                let duration = facade.node_duration(*node);
                let shared = if nodes.contains(node) { shared + duration } else { shared };
                (shared, total + duration)
            });
        candidate.sharing = if total > 0 {
            shared as f64 / total as f64
        } else {
            0.0
        };

        if candidate.sharing > parameters.at_most_same_by {
            return false;
        }
        nodes.extend(candidate.path.nodes.iter().copied());
        true
    });

    alternatives.sort_by(|left, right| left.sharing.total_cmp(&right.sharing));
    paths.extend(alternatives);
}

/// Drops routes whose duration exceeds the shortest route's by more than
/// `at_most_longer_by`.
pub fn duration_stretch(routes: &mut Vec<RouteResult>, parameters: &Parameters) {
    let Some(shortest) = routes.first().map(RouteResult::duration) else {
        return;
    };

    let limit = (1.0 + parameters.at_most_longer_by) * shortest as f64;
    let mut alternatives = routes.split_off(1);
    alternatives.retain(|route| route.duration() as f64 <= limit);
    routes.extend(alternatives);
}
