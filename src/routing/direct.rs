//! Single-leg shortest path between two sets of snapping candidates.
//!
//! Unlike [`crate::routing::shortest_path_search`] this runs a single
//! bidirectional search seeded from every candidate at once, and picks
//! the best combination of source and target.

use log::debug;
use measure_time::debug_time;

use crate::engine::{ForceLoops, SearchAlgorithm, SearchEngineData};
use crate::facade::EdgeFacade;
use crate::primitives::{Direction, NodeId, PhantomEndpointCandidates, PhantomNode, RouteResult};
use crate::routing::annotate::extract_route;
use crate::routing::{insert_candidates_in_heaps, SearchError};

/// The candidate whose seed on `node` ended up in the heap of
/// `direction`. Seeds sharing a node keep the smaller key, so a source
/// is the candidate furthest along the segment and a target the one
/// closest to its start.
pub fn seeded_candidate<'a>(
    candidates: &'a [PhantomNode],
    node: NodeId,
    direction: Direction,
) -> Option<&'a PhantomNode> {
    candidates
        .iter()
        .filter_map(|phantom| {
            phantom
                .signed_seeds(direction)
                .find(|seed| seed.node == node)
                .map(|seed| (seed.weight, phantom))
        })
        .min_by_key(|(weight, _)| *weight)
        .map(|(_, phantom)| phantom)
}

/// Shortest route between any source and any target candidate.
///
/// Returns an empty [`RouteResult`] when no candidate pair is connected.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all, level = "info"))]
pub fn direct_shortest_path_search<A, F>(
    engine: &mut SearchEngineData<A>,
    facade: &F,
    candidates: &PhantomEndpointCandidates,
) -> Result<RouteResult, SearchError>
where
    A: SearchAlgorithm<F>,
    F: EdgeFacade + ?Sized,
{
    let sources = &candidates.source_phantoms;
    let targets = &candidates.target_phantoms;
    if sources.is_empty() || !sources.iter().all(PhantomNode::is_valid) {
        return Err(SearchError::InvalidPhantom(0));
    }
    if targets.is_empty() || !targets.iter().all(PhantomNode::is_valid) {
        return Err(SearchError::InvalidPhantom(1));
    }

    debug_time!("direct shortest path");
    engine.ensure_capacity(facade.number_of_nodes());
    insert_candidates_in_heaps(&mut engine.forward_heap_1, &mut engine.reverse_heap_1, candidates);

    let Some((weight, packed)) = A::search(engine, facade, ForceLoops::NONE, candidates, None) else {
        debug!("No route between {} source and {} target candidates", sources.len(), targets.len());
        return Ok(RouteResult::default());
    };

    let (Some(first), Some(last)) = (packed.first(), packed.last()) else {
        return Ok(RouteResult::default());
    };
    let (Some(source), Some(target)) = (
        seeded_candidate(sources, *first, Direction::Forward),
        seeded_candidate(targets, *last, Direction::Reverse),
    ) else {
        return Ok(RouteResult::default());
    };

    let unpacked = A::unpack_path(facade, &packed);
    let leg = extract_route(facade, source, target, unpacked);
    debug_assert!(leg.as_ref().is_none_or(|leg| leg.weight == weight));

    Ok(RouteResult {
        legs: leg.into_iter().collect(),
    })
}
