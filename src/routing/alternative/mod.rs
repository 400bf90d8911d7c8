//! Alternative routes over a multi-level graph.
//!
//! Both searches keep running past their first meeting until their
//! frontiers overlap by a factor of the shortest path weight. Every node
//! settled by one search and reached by the other is a via candidate for
//! a path `source -> via -> target`. Candidates are filtered cheaply on
//! their packed paths while the heaps are still intact, then unpacked
//! and ranked by how little they share with the routes accepted before
//! them.

use log::{debug, error, trace};
use measure_time::debug_time;

use crate::config::AlternativeConfig;
use crate::engine::{ForceLoops, Mld, SearchEngineData};
use crate::facade::MldFacade;
use crate::primitives::{
    Direction, PhantomEndpointCandidates, PhantomNode, RouteResult, Weight,
};
use crate::routing::annotate::extract_route;
use crate::routing::direct::seeded_candidate;
use crate::routing::mld::{retrieve_packed_path_from_heap, routing_step, unpack_packed_path};
use crate::routing::{insert_candidates_in_heaps, Meeting, SearchError};

pub mod filter;
pub mod params;

#[doc(inline)]
pub use filter::{PackedCandidate, UnpackedCandidate, WeightedVia};
#[doc(inline)]
pub use params::{longer_by_factor_based_on_duration, Parameters};


/// Durations are kept in deciseconds.
const DECISECONDS_PER_SECOND: f64 = 10.0;

/// Steps both searches of `engine` alternately and collects the meetings
/// found until the sum of their minima passes the overlap bound. The
/// bound is unlimited until the first meeting. Candidates come in no
/// particular order and may repeat a node.
fn candidate_vias<F>(
    engine: &mut SearchEngineData<Mld>,
    facade: &F,
    candidates: &PhantomEndpointCandidates,
    parameters: &Parameters,
) -> Vec<WeightedVia>
where
    F: MldFacade + ?Sized,
{
    let SearchEngineData {
        forward_heap_1: forward_heap,
        reverse_heap_1: reverse_heap,
        ..
    } = engine;

    insert_candidates_in_heaps(forward_heap, reverse_heap, candidates);
    let (Some(mut forward_min), Some(mut reverse_min)) = (forward_heap.min_key(), reverse_heap.min_key())
    else {
        return Vec::new();
    };

    let mut vias = Vec::new();
    let mut shortest: Option<Weight> = None;
    let mut meeting = Meeting::bounded_by(None);

    while !forward_heap.is_empty() || !reverse_heap.is_empty() {
        if let Some(weight) = shortest {
            meeting.weight = (weight as f64 * parameters.search_space_overlap_factor) as Weight;
        }
        if forward_min.saturating_add(reverse_min) >= meeting.weight {
            break;
        }

        for direction in [Direction::Forward, Direction::Reverse] {
            let (heap, opposite, minimum) = match direction {
                Direction::Forward => (&mut *forward_heap, &*reverse_heap, &mut forward_min),
                Direction::Reverse => (&mut *reverse_heap, &*forward_heap, &mut reverse_min),
            };
            if heap.is_empty() {
                continue;
            }

            // Only the via is reset, the bound stays with the best meeting.
            meeting.middle = None;
            routing_step(
                facade,
                direction,
                heap,
                opposite,
                &mut meeting,
                ForceLoops::NONE,
                candidates,
            );
            if let Some(key) = heap.min_key() {
                *minimum = key;
            }

            if let Some(node) = meeting.middle {
                vias.push(WeightedVia {
                    node,
                    weight: meeting.weight,
                });
                shortest = Some(shortest.map_or(meeting.weight, |weight| weight.min(meeting.weight)));
            }
        }
    }

    vias
}

/// Unpacks `paths` on the heaps of `engine`, which are cleared in the
/// process. Alternatives which fail to unpack are dropped; `None` if the
/// shortest path, the first entry, fails.
fn unpack_candidates<F>(
    engine: &mut SearchEngineData<Mld>,
    facade: &F,
    candidates: &PhantomEndpointCandidates,
    paths: Vec<PackedCandidate>,
) -> Option<Vec<UnpackedCandidate>>
where
    F: MldFacade + ?Sized,
{
    let SearchEngineData {
        forward_heap_1: forward_heap,
        reverse_heap_1: reverse_heap,
        ..
    } = engine;

    let mut unpacked = Vec::with_capacity(paths.len());
    for (index, candidate) in paths.into_iter().enumerate() {
        let source = candidate.path.first().map_or(candidate.via.node, |(from, ..)| *from);
        let path = unpack_packed_path(
            facade,
            forward_heap,
            reverse_heap,
            source,
            &candidate.path,
            ForceLoops::NONE,
            candidates,
        );

        match path {
            Some(path) => unpacked.push(UnpackedCandidate {
                via: candidate.via,
                sharing: 0.0,
                path,
            }),
            None if index == 0 => return None,
            None => error!("Dropping alternative through {} which failed to unpack", candidate.via.node),
        }
    }

    Some(unpacked)
}

/// Annotates an unpacked candidate with the snapping candidates its
/// path starts and ends on.
fn annotate<F>(
    facade: &F,
    candidates: &PhantomEndpointCandidates,
    candidate: UnpackedCandidate,
) -> Option<RouteResult>
where
    F: MldFacade + ?Sized,
{
    let first = *candidate.path.nodes.first()?;
    let last = *candidate.path.nodes.last()?;
    let source = seeded_candidate(&candidates.source_phantoms, first, Direction::Forward)?;
    let target = seeded_candidate(&candidates.target_phantoms, last, Direction::Reverse)?;

    let leg = extract_route(facade, source, target, candidate.path)?;
    debug_assert_eq!(leg.weight, candidate.via.weight);

    Some(RouteResult { legs: vec![leg] })
}

/// The shortest route between the candidates followed by up to
/// `number_of_alternatives` alternatives, best first.
///
/// Returns fewer alternatives when not enough pass the filters. The list
/// always holds at least one entry, an invalid [`RouteResult`] when the
/// endpoints are not connected.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all, level = "info"))]
pub fn alternative_path_search<F>(
    engine: &mut SearchEngineData<Mld>,
    facade: &F,
    candidates: &PhantomEndpointCandidates,
    number_of_alternatives: usize,
    config: &AlternativeConfig,
) -> Result<Vec<RouteResult>, SearchError>
where
    F: MldFacade + ?Sized,
{
    if number_of_alternatives == 0 {
        return Err(SearchError::NoAlternativesRequested);
    }
    let sources = &candidates.source_phantoms;
    let targets = &candidates.target_phantoms;
    if sources.is_empty() || !sources.iter().all(PhantomNode::is_valid) {
        return Err(SearchError::InvalidPhantom(0));
    }
    if targets.is_empty() || !targets.iter().all(PhantomNode::is_valid) {
        return Err(SearchError::InvalidPhantom(1));
    }

    debug_time!("alternative path search for {number_of_alternatives} alternatives");
    let mut parameters = Parameters::from_request(config, candidates);
    let number_to_unpack = parameters.alternatives_to_unpack_factor * number_of_alternatives;
    engine.ensure_capacity(facade.number_of_nodes());

    let mut vias = candidate_vias(engine, facade, candidates, &parameters);
    let Some(shortest_via) = vias.iter().min_by_key(|via| via.weight).copied() else {
        debug!("No route between {} source and {} target candidates", sources.len(), targets.len());
        return Ok(vec![RouteResult::default()]);
    };
    trace!("{} via candidates, shortest {shortest_via:?}", vias.len());

    let estimated_duration = shortest_via.weight as f64 / facade.weight_multiplier();
    parameters = parameters.with_duration(estimated_duration);

    filter::unique_nodes(&mut vias);
    filter::road_importance(&mut vias, facade);
    filter::stretch(&mut vias, shortest_via.weight, &parameters);
    vias.sort_by_key(|via| via.weight);

    // Packed paths live in the heaps, which unpacking destroys.
    let paths = {
        let SearchEngineData {
            forward_heap_1: forward_heap,
            reverse_heap_1: reverse_heap,
            ..
        } = &*engine;
        let packed = |via: WeightedVia| PackedCandidate {
            via,
            path: retrieve_packed_path_from_heap(forward_heap, reverse_heap, via.node),
        };

        let shortest = packed(shortest_via);
        filter::via_not_on_path(&mut vias, &shortest);

        let alternatives = vias
            .into_iter()
            .map(packed)
            .filter(|candidate| {
                filter::is_locally_optimal(candidate, &shortest, forward_heap, reverse_heap, &parameters)
            })
            .collect::<Vec<_>>();

        let mut paths = Vec::with_capacity(1 + alternatives.len());
        paths.push(shortest);
        paths.extend(alternatives);
        filter::cell_sharing(&mut paths, facade.partition(), &parameters);
        paths.truncate(1 + number_to_unpack);
        paths
    };
    trace!("Unpacking {} packed paths", paths.len());

    let Some(mut unpacked) = unpack_candidates(engine, facade, candidates, paths) else {
        error!("Shortest path through {} failed to unpack", shortest_via.node);
        return Ok(vec![RouteResult::default()]);
    };
    filter::sharing(&mut unpacked, facade, &parameters);
    unpacked.truncate(1 + number_of_alternatives);

    let mut routes = unpacked
        .into_iter()
        .filter_map(|candidate| annotate(facade, candidates, candidate))
        .collect::<Vec<_>>();
    let Some(shortest) = routes.first() else {
        return Ok(vec![RouteResult::default()]);
    };

    let shortest_duration = shortest.duration() as f64 / DECISECONDS_PER_SECOND;
    parameters = parameters.with_duration(shortest_duration);
    filter::duration_stretch(&mut routes, &parameters);

    debug!("Found {} alternatives", routes.len() - 1);
    Ok(routes)
}
