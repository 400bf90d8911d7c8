//! Shortest route through a sequence of waypoints.
//!
//! Every waypoint may be passed on either of its segment directions. The
//! search keeps the best route ending on each direction of the current
//! waypoint and extends both leg by leg, so a choice made at one waypoint
//! can still be revised by the legs that follow. When u-turns are allowed
//! at waypoints a single search per leg suffices; otherwise each leg is
//! searched once per target direction.

use log::{debug, trace};
use measure_time::debug_time;

use crate::engine::{ForceLoops, HeapData, SearchAlgorithm, SearchEngineData};
use crate::facade::EdgeFacade;
use crate::heap::QueryHeap;
use crate::primitives::{
    NodeId, PackedPath, PhantomEndpoints, PhantomNode, PhantomSeed, RouteResult, Weight,
};
use crate::routing::annotate::extract_route;
use crate::routing::SearchError;

/// Best route found so far ending on one direction of a waypoint.
#[derive(Debug, Clone, Default, PartialEq)]
struct LegChain {
    weight: Weight,
    legs: Vec<PackedPath>,
}

impl LegChain {
    fn extend(&self, weight: Weight, leg: PackedPath) -> Self {
        let mut legs = self.legs.clone();
        legs.push(leg);
        Self { weight, legs }
    }

    fn number_of_nodes(&self) -> usize {
        self.legs.iter().map(Vec::len).sum()
    }
}

/// Routes ending on the forward and the reverse segment of a waypoint.
#[derive(Debug, Clone, Default)]
struct RouteState {
    to_forward: Option<LegChain>,
    to_reverse: Option<LegChain>,
}

impl RouteState {
    fn start(source: &PhantomNode) -> Self {
        let empty = || LegChain::default();
        Self {
            to_forward: source.is_valid_forward_source().then(empty),
            to_reverse: source.is_valid_reverse_source().then(empty),
        }
    }

    fn is_empty(&self) -> bool {
        self.to_forward.is_none() && self.to_reverse.is_none()
    }

    /// The chain a new leg continues, found from the leg's first node.
    fn continued_by(&self, source: &PhantomNode, leg: &[NodeId]) -> Option<&LegChain> {
        let first = leg.first()?;
        if source.forward_segment_id.enabled && source.forward_segment_id.id == *first {
            self.to_forward.as_ref()
        } else if source.reverse_segment_id.enabled && source.reverse_segment_id.id == *first {
            self.to_reverse.as_ref()
        } else {
            None
        }
    }

    /// The cheaper chain, preferring fewer packed nodes on a tie.
    fn best(self) -> Option<LegChain> {
        match (self.to_forward, self.to_reverse) {
            (Some(forward), Some(reverse)) => {
                if (forward.weight, forward.number_of_nodes()) < (reverse.weight, reverse.number_of_nodes()) {
                    Some(forward)
                } else {
                    Some(reverse)
                }
            }
            (forward, reverse) => forward.or(reverse),
        }
    }
}

fn seed<D: HeapData>(heap: &mut QueryHeap<D>, node: NodeId, weight: Weight) {
    let seed = PhantomSeed {
        node,
        weight,
        duration: 0,
        distance: 0.0,
    };

    match heap.get_key(node) {
        None => heap.insert(node, weight, D::from_seed(&seed)),
        Some(key) if weight < key => heap.decrease_key(node, weight, D::from_seed(&seed)),
        Some(_) => {}
    }
}

/// Seeds the source segments of a leg, each offset by the weight of the
/// route reaching it so far. Segments no route reaches are left out.
fn seed_source<D: HeapData>(
    heap: &mut QueryHeap<D>,
    source: &PhantomNode,
    to_forward: Option<Weight>,
    to_reverse: Option<Weight>,
) {
    if let Some(total) = to_forward.filter(|_| source.is_valid_forward_source()) {
        seed(heap, source.forward_segment_id.id, total - source.forward_weight_plus_offset());
    }
    if let Some(total) = to_reverse.filter(|_| source.is_valid_reverse_source()) {
        seed(heap, source.reverse_segment_id.id, total - source.reverse_weight_plus_offset());
    }
}

/// Searches a leg allowing a u-turn at its source: both source segments
/// start from zero and the cheaper route reaching the source is added
/// afterwards.
fn search_with_uturn<A, F>(
    engine: &mut SearchEngineData<A>,
    facade: &F,
    state: &RouteState,
    source: &PhantomNode,
    target: &PhantomNode,
) -> Option<(Weight, PackedPath)>
where
    A: SearchAlgorithm<F>,
    F: ?Sized,
{
    let to_forward = state.to_forward.as_ref().map(|chain| chain.weight);
    let to_reverse = state.to_reverse.as_ref().map(|chain| chain.weight);

    engine.forward_heap_1.clear();
    engine.reverse_heap_1.clear();
    seed_source(&mut engine.forward_heap_1, source, to_forward.map(|_| 0), to_reverse.map(|_| 0));
    if target.is_valid_forward_target() {
        seed(&mut engine.reverse_heap_1, target.forward_segment_id.id, target.forward_weight_plus_offset());
    }
    if target.is_valid_reverse_target() {
        seed(&mut engine.reverse_heap_1, target.reverse_segment_id.id, target.reverse_weight_plus_offset());
    }

    // Loops only matter when the search cannot turn onto the other
    // direction of a shared segment.
    let oneway_source = to_forward.is_none() || to_reverse.is_none();
    let oneway_target = !(target.is_valid_forward_target() && target.is_valid_reverse_target());
    let loops = ForceLoops::between(source, target);
    let force_loops = ForceLoops {
        forward: loops.forward.filter(|_| oneway_source),
        reverse: loops.reverse.filter(|_| oneway_target),
    };

    let endpoints = PhantomEndpoints::new(*source, *target);
    let (weight, leg) = A::search(engine, facade, force_loops, &endpoints, None)?;
    let reached = to_forward.into_iter().chain(to_reverse).min()?;
    Some((weight + reached, leg))
}

/// Searches a leg towards the target segment `(node, weight)`,
/// continuing the routes that reach the source.
fn search_to_segment<A, F>(
    engine: &mut SearchEngineData<A>,
    facade: &F,
    state: &RouteState,
    endpoints: &PhantomEndpoints,
    (target_node, target_weight): (NodeId, Weight),
    force_loops: ForceLoops,
) -> Option<(Weight, PackedPath)>
where
    A: SearchAlgorithm<F>,
    F: ?Sized,
{
    engine.forward_heap_1.clear();
    engine.reverse_heap_1.clear();
    seed_source(
        &mut engine.forward_heap_1,
        &endpoints.source,
        state.to_forward.as_ref().map(|chain| chain.weight),
        state.to_reverse.as_ref().map(|chain| chain.weight),
    );
    if engine.forward_heap_1.is_empty() {
        return None;
    }
    seed(&mut engine.reverse_heap_1, target_node, target_weight);

    A::search(engine, facade, force_loops, endpoints, None)
}

/// Extends `state` by the leg `source -> target`.
fn advance<A, F>(
    engine: &mut SearchEngineData<A>,
    facade: &F,
    state: RouteState,
    source: &PhantomNode,
    target: &PhantomNode,
    allow_uturn: bool,
) -> RouteState
where
    A: SearchAlgorithm<F>,
    F: ?Sized,
{
    let (to_forward, to_reverse) = if allow_uturn {
        let found = search_with_uturn(engine, facade, &state, source, target);
        if target.is_valid_forward_target() {
            (found.clone(), found.filter(|_| target.is_valid_reverse_target()))
        } else {
            (None, found)
        }
    } else {
        let endpoints = PhantomEndpoints::new(*source, *target);
        let loops = ForceLoops::between(source, target);

        let to_forward = if target.is_valid_forward_target() {
            let segment = (target.forward_segment_id.id, target.forward_weight_plus_offset());
            search_to_segment(engine, facade, &state, &endpoints, segment, loops.only_forward())
        } else {
            None
        };
        let to_reverse = if target.is_valid_reverse_target() {
            let segment = (target.reverse_segment_id.id, target.reverse_weight_plus_offset());
            search_to_segment(engine, facade, &state, &endpoints, segment, loops.only_reverse())
        } else {
            None
        };
        (to_forward, to_reverse)
    };

    let chain = |found: Option<(Weight, PackedPath)>| {
        let (weight, leg) = found?;
        let previous = state.continued_by(source, &leg)?;
        Some(previous.extend(weight, leg))
    };

    RouteState {
        to_forward: chain(to_forward),
        to_reverse: chain(to_reverse),
    }
}

/// Shortest route visiting `waypoints` in order.
///
/// `continue_straight_at_waypoint` forbids turning around at
/// intermediate waypoints and defaults to the facade's setting. Returns
/// an empty [`RouteResult`] when some leg cannot be completed by any
/// combination of segment directions.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all, level = "info"))]
pub fn shortest_path_search<A, F>(
    engine: &mut SearchEngineData<A>,
    facade: &F,
    waypoints: &[PhantomNode],
    continue_straight_at_waypoint: Option<bool>,
) -> Result<RouteResult, SearchError>
where
    A: SearchAlgorithm<F>,
    F: EdgeFacade + ?Sized,
{
    if waypoints.len() < 2 {
        return Err(SearchError::NotEnoughWaypoints(waypoints.len()));
    }
    if let Some(index) = waypoints.iter().position(|phantom| !phantom.is_valid()) {
        return Err(SearchError::InvalidPhantom(index));
    }

    debug_time!("shortest path over {} waypoints", waypoints.len());
    let allow_uturn = !continue_straight_at_waypoint.unwrap_or_else(|| facade.continue_straight_default());
    engine.ensure_capacity(facade.number_of_nodes());

    let mut state = RouteState::start(&waypoints[0]);
    for (leg, pair) in waypoints.windows(2).enumerate() {
        state = advance(engine, facade, state, &pair[0], &pair[1], allow_uturn);
        if state.is_empty() {
            debug!("Leg {leg} has no route from any direction of its source");
            return Ok(RouteResult::default());
        }
        trace!(
            "Leg {leg}: to forward {:?}, to reverse {:?}",
            state.to_forward.as_ref().map(|chain| chain.weight),
            state.to_reverse.as_ref().map(|chain| chain.weight)
        );
    }

    let Some(best) = state.best() else {
        return Ok(RouteResult::default());
    };

    let mut legs = Vec::with_capacity(best.legs.len());
    for (packed, pair) in best.legs.iter().zip(waypoints.windows(2)) {
        let unpacked = A::unpack_path(facade, packed);
        let Some(leg) = extract_route(facade, &pair[0], &pair[1], unpacked) else {
            return Ok(RouteResult::default());
        };
        legs.push(leg);
    }

    Ok(RouteResult { legs })
}
