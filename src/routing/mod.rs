//! Searches over the graph facades.
//!
//! The point-to-point primitives live in [`ch`] and [`mld`]; every other
//! query (matrices, alternatives, multi-leg routes and map matching) is
//! composed from them and seeded through the helpers of this module.

use geo::{Distance as _, Haversine, Point};
use thiserror::Error;

use crate::engine::HeapData;
use crate::facade::EdgeData;
use crate::heap::{IndexStorage, QueryHeap};
use crate::primitives::{
    Direction, NodeId, PhantomEndpointCandidates, PhantomEndpoints, PhantomNode, Weight,
    INVALID_EDGE_WEIGHT,
};

pub mod alternative;
pub mod annotate;
pub mod ch;
pub mod direct;
pub mod matrix;
pub mod mld;
pub mod shortest_path;

#[doc(inline)]
pub use alternative::alternative_path_search;
#[doc(inline)]
pub use annotate::extract_route;
#[doc(inline)]
pub use direct::direct_shortest_path_search;
#[doc(inline)]
pub use matrix::{many_to_many_search, Matrix};
#[doc(inline)]
pub use shortest_path::shortest_path_search;

#[cfg(test)]
mod test;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("at least two waypoints are required, got {0}")]
    NotEnoughWaypoints(usize),

    #[error("waypoint {0} has no usable snapping candidate")]
    InvalidPhantom(usize),

    #[error("at least one alternative must be requested")]
    NoAlternativesRequested,

    #[error("index {index} is out of range for {len} phantoms")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Best meeting point of a forward and a reverse search found so far.
///
/// `weight` doubles as the pruning bound of the search: it starts at the
/// caller's upper bound and only decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Meeting {
    pub middle: Option<NodeId>,
    pub weight: Weight,
}

impl Meeting {
    pub fn bounded_by(upper_bound: Option<Weight>) -> Self {
        Self {
            middle: None,
            weight: upper_bound.unwrap_or(INVALID_EDGE_WEIGHT),
        }
    }

    #[inline]
    pub fn improve(&mut self, middle: NodeId, weight: Weight) {
        self.middle = Some(middle);
        self.weight = weight;
    }
}

/// Whether an edge can be followed by a search running in `direction`.
#[inline]
pub fn traversable<E: EdgeData>(direction: Direction, data: &E) -> bool {
    match direction {
        Direction::Forward => data.forward(),
        Direction::Reverse => data.backward(),
    }
}

/// Seeds `heap` with the enabled segments of `phantom`. Segments shared
/// with an earlier seed keep the smaller key.
pub fn insert_nodes_in_heap<D, S>(heap: &mut QueryHeap<D, S>, phantom: &PhantomNode, direction: Direction)
where
    D: HeapData,
    S: IndexStorage,
{
    debug_assert!(phantom.is_valid());

    for seed in phantom.signed_seeds(direction) {
        match heap.get_key(seed.node) {
            None => heap.insert(seed.node, seed.weight, D::from_seed(&seed)),
            Some(key) if seed.weight < key => heap.decrease_key(seed.node, seed.weight, D::from_seed(&seed)),
            Some(_) => {}
        }
    }
}

/// Seeds a forward heap from the source and a reverse heap from the target.
pub fn insert_nodes_in_heaps<D, S>(
    forward_heap: &mut QueryHeap<D, S>,
    reverse_heap: &mut QueryHeap<D, S>,
    endpoints: &PhantomEndpoints,
) where
    D: HeapData,
    S: IndexStorage,
{
    insert_nodes_in_heap(forward_heap, &endpoints.source, Direction::Forward);
    insert_nodes_in_heap(reverse_heap, &endpoints.target, Direction::Reverse);
}

/// Seeds both heaps from every snapping candidate of the endpoints.
pub fn insert_candidates_in_heaps<D, S>(
    forward_heap: &mut QueryHeap<D, S>,
    reverse_heap: &mut QueryHeap<D, S>,
    candidates: &PhantomEndpointCandidates,
) where
    D: HeapData,
    S: IndexStorage,
{
    for source in &candidates.source_phantoms {
        insert_nodes_in_heap(forward_heap, source, Direction::Forward);
    }
    for target in &candidates.target_phantoms {
        insert_nodes_in_heap(reverse_heap, target, Direction::Reverse);
    }
}

/// Great-circle length (m) of the polyline `source`, `points`, `target`.
pub fn path_distance(
    source: Point<f64>,
    points: impl IntoIterator<Item = Point<f64>>,
    target: Point<f64>,
) -> f64 {
    let (last, total) = points
        .into_iter()
        .fold((source, 0.0), |(previous, total), point| {
            (point, total + Haversine.distance(previous, point))
        });

    total + Haversine.distance(last, target)
}
