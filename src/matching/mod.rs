//! Map matching of GPS traces.
//!
//! Every trace point comes with the snapping candidates around it. A
//! hidden Markov model scores each candidate by its distance to the point
//! (emission) and each pair of candidates of consecutive points by how
//! much the route between them deviates from the straight line between
//! the points (transition). The Viterbi algorithm then picks the most
//! likely candidate sequence.
//!
//! Points no candidate can be routed to are broken. When a run of broken
//! points empties the history of the current sub-matching, or when two
//! points are too far apart in time, the trace is split and matching
//! starts over behind the split. Each part is reported as a separate
//! [`SubMatching`].

use std::iter;

use geo::{Distance as _, Haversine, Point};
use log::{debug, trace};
use measure_time::debug_time;
use thiserror::Error;

use crate::config::MatchingConfig;
use crate::engine::{SearchAlgorithm, SearchEngineData};
use crate::facade::BaseFacade;
use crate::primitives::{PhantomNode, PhantomNodeWithDistance, Weight};

pub mod confidence;
pub mod costing;
pub mod hmm;

#[doc(inline)]
pub use confidence::{matching_confidence, BayesClassifier, ClassLabel, LaplaceDistribution};
#[doc(inline)]
pub use costing::*;
#[doc(inline)]
pub use hmm::{HiddenMarkovModel, State};


/// Routes between consecutive points are assumed to average at least this
/// speed (m/s), which bounds the searches between their candidates.
const MINIMUM_SPEED: f64 = 4.0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("at least two trace points are required, got {0}")]
    NotEnoughPoints(usize),

    #[error("{name} has {found} entries for {expected} trace points")]
    LengthMismatch {
        name: &'static str,
        found: usize,
        expected: usize,
    },
}

/// A GPS trace and the snapping candidates of its points.
#[derive(Debug, Clone, Copy, Default)]
pub struct Trace<'a> {
    pub candidates: &'a [Vec<PhantomNodeWithDistance>],
    pub coordinates: &'a [Point<f64>],
    /// Recording time of every point in seconds, or empty.
    pub timestamps: &'a [u32],
    /// Standard deviation of every point's position in meters, or empty.
    pub gps_precision: &'a [Option<f64>],
}

impl<'a> Trace<'a> {
    pub fn new(candidates: &'a [Vec<PhantomNodeWithDistance>], coordinates: &'a [Point<f64>]) -> Self {
        Self {
            candidates,
            coordinates,
            ..Self::default()
        }
    }

    pub fn with_timestamps(self, timestamps: &'a [u32]) -> Self {
        Self { timestamps, ..self }
    }

    pub fn with_gps_precision(self, gps_precision: &'a [Option<f64>]) -> Self {
        Self {
            gps_precision,
            ..self
        }
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    fn validate(&self) -> Result<(), MatchError> {
        let expected = self.len();
        if expected < 2 {
            return Err(MatchError::NotEnoughPoints(expected));
        }

        let optional = [
            ("candidates", self.candidates.len(), false),
            ("timestamps", self.timestamps.len(), true),
            ("gps_precision", self.gps_precision.len(), true),
        ];
        for (name, found, may_be_empty) in optional {
            if found != expected && !(may_be_empty && found == 0) {
                return Err(MatchError::LengthMismatch { name, found, expected });
            }
        }

        Ok(())
    }

    fn uses_timestamps(&self) -> bool {
        self.timestamps.len() > 1
    }

    fn haversine_distance(&self, from: usize, to: usize) -> f64 {
        Haversine.distance(self.coordinates[from], self.coordinates[to])
    }
}

/// A maximal run of the trace matched onto the network.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubMatching {
    pub nodes: Vec<PhantomNode>,
    /// The trace point every node was matched from.
    pub indices: Vec<usize>,
    /// Other candidates of every point a plausible path runs through.
    pub alternatives_count: Vec<usize>,
    pub confidence: f64,
}

/// Median interval between consecutive timestamps, at least one second.
pub fn median_sample_time(timestamps: &[u32]) -> u32 {
    let mut intervals = timestamps
        .windows(2)
        .map(|pair| pair[1].saturating_sub(pair[0]))
        .collect::<Vec<_>>();
    if intervals.is_empty() {
        return 1;
    }

    let middle = intervals.len() / 2;
    let (_, median, _) = intervals.select_nth_unstable(middle);
    (*median).max(1)
}

/// Extends the model from the unbroken point `previous` to `point`,
/// routing between every pair of their candidates that could improve
/// the score of `point`. Leaves `point` broken if no candidate is reached.
fn viterbi_step<A, F, E, T>(
    engine: &mut SearchEngineData<A>,
    facade: &F,
    costing: &CostingStrategies<E, T>,
    trace: &Trace<'_>,
    model: &mut HiddenMarkovModel,
    (previous, point): (usize, usize),
    max_distance_delta: f64,
) where
    A: SearchAlgorithm<F>,
    F: BaseFacade + ?Sized,
    E: EmissionStrategy,
    T: TransitionStrategy,
{
    let haversine_distance = trace.haversine_distance(previous, point);
    let upper_bound =
        ((haversine_distance + max_distance_delta) / MINIMUM_SPEED * facade.weight_multiplier()) as Weight;

    for (from, source) in trace.candidates[previous].iter().enumerate() {
        if model.pruned[previous][from] {
            continue;
        }
        let previous_viterbi = model.viterbi[previous][from];

        for (to, target) in trace.candidates[point].iter().enumerate() {
            let mut viterbi = previous_viterbi + model.emission((point, to));
            if model.viterbi[point][to] > viterbi {
                continue;
            }

            let network_distance = A::network_distance(
                engine,
                facade,
                &source.phantom_node,
                &target.phantom_node,
                Some(upper_bound),
            );
            let context = TransitionContext {
                network_distance,
                haversine_distance,
            };
            if context.delta() >= max_distance_delta {
                continue;
            }

            viterbi += costing.transition(context);
            if viterbi > model.viterbi[point][to] {
                model.viterbi[point][to] = viterbi;
                model.parents[point][to] = Some((previous, from));
                model.path_distances[point][to] = network_distance;
                model.pruned[point][to] = false;
                model.breakage[point] = false;
            }
        }
    }
}

/// Backtracks the most likely path of the points `begin..end` and counts
/// the alternatives of each point on it. `None` if fewer than two
/// unbroken points remain.
fn reconstruct(
    model: &mut HiddenMarkovModel,
    trace: &Trace<'_>,
    classifier: &BayesClassifier,
    begin: usize,
    end: usize,
) -> Option<SubMatching> {
    let last = (begin..end).rev().find(|point| !model.breakage[*point])?;
    let begin = (begin..end).find(|point| !model.breakage[*point])?;
    if last <= begin {
        return None;
    }

    let mut states = Vec::new();
    let mut state = (last, model.best_candidate(last)?);
    loop {
        states.push(state);
        model.viterbi_reachable[state.0][state.1] = true;
        if state.0 <= begin {
            break;
        }
        match model.parents[state.0][state.1] {
            Some(parent) if parent.0 < state.0 => state = parent,
            _ => break,
        }
    }
    states.reverse();
    if states.len() < 2 {
        return None;
    }

    for candidate in 0..model.viterbi[last].len() {
        let mut state = (last, candidate);
        loop {
            if model.viterbi_reachable[state.0][state.1] || model.pruned[state.0][state.1] {
                break;
            }
            model.viterbi_reachable[state.0][state.1] = true;
            if state.0 <= begin {
                break;
            }
            match model.parents[state.0][state.1] {
                Some(parent) if parent.0 < state.0 => state = parent,
                _ => break,
            }
        }
    }

    let mut matching = SubMatching::default();
    let mut matched_distance = 0.0;
    for &(point, candidate) in &states {
        matching.indices.push(point);
        matching.nodes.push(trace.candidates[point][candidate].phantom_node);
        matching
            .alternatives_count
            .push(model.reachable_count(point).saturating_sub(1));
        matched_distance += model.path_distances[point][candidate];
    }

    let trace_distance = states
        .windows(2)
        .map(|pair| trace.haversine_distance(pair[0].0, pair[1].0))
        .sum::<f64>();
    matching.confidence = matching_confidence(classifier, trace_distance, matched_distance);
    trace!(
        "Sub-matching {begin}..={last}: {} points, trace {trace_distance:.1}m, matched {matched_distance:.1}m",
        states.len()
    );

    Some(matching)
}

/// Matches `trace` with the default strategies for `config`.
pub fn map_matching<A, F>(
    engine: &mut SearchEngineData<A>,
    facade: &F,
    trace: &Trace<'_>,
    allow_splitting: bool,
    config: &MatchingConfig,
) -> Result<Vec<SubMatching>, MatchError>
where
    A: SearchAlgorithm<F>,
    F: BaseFacade + ?Sized,
{
    let costing: CostingStrategies = CostingStrategies::from(config);
    map_matching_with_costing(engine, facade, trace, allow_splitting, config, &costing)
}

/// The sub-matchings of `trace`, in trace order.
///
/// Without timestamps the trace is split once more than
/// `max_broken_states` consecutive points are broken. With timestamps
/// and `allow_splitting`, it is also split where consecutive unbroken
/// points are more than `max_broken_states` median sample intervals
/// apart. An empty list means no two consecutive points could be matched.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all, level = "info"))]
pub fn map_matching_with_costing<A, F, E, T>(
    engine: &mut SearchEngineData<A>,
    facade: &F,
    trace: &Trace<'_>,
    allow_splitting: bool,
    config: &MatchingConfig,
    costing: &CostingStrategies<E, T>,
) -> Result<Vec<SubMatching>, MatchError>
where
    A: SearchAlgorithm<F>,
    F: BaseFacade + ?Sized,
    E: EmissionStrategy,
    T: TransitionStrategy,
{
    trace.validate()?;
    debug_time!("map matching {} points", trace.len());

    let emissions = trace
        .candidates
        .iter()
        .enumerate()
        .map(|(point, candidates)| {
            let gps_precision = trace.gps_precision.get(point).copied().flatten();
            candidates
                .iter()
                .map(|candidate| {
                    costing.emission(EmissionContext {
                        distance: candidate.distance,
                        gps_precision,
                    })
                })
                .collect()
        })
        .collect();
    let mut model = HiddenMarkovModel::new(emissions);

    let Some(initial) = model.initialize(0) else {
        debug!("No trace point has a plausible candidate");
        return Ok(Vec::new());
    };
    engine.ensure_capacity(facade.number_of_nodes());

    let use_timestamps = trace.uses_timestamps();
    let median = if use_timestamps {
        median_sample_time(trace.timestamps)
    } else {
        1
    };
    let max_broken_time = median.saturating_mul(config.max_broken_states as u32);

    let mut breakage_begin: Option<usize> = None;
    let mut split_points = Vec::new();
    let mut prev_unbroken = vec![initial];

    let mut point = initial + 1;
    while point < trace.len() {
        let Some(&previous) = prev_unbroken.last() else {
            break;
        };

        let step_time = if use_timestamps {
            trace.timestamps[point].saturating_sub(trace.timestamps[previous])
        } else {
            1
        };
        let max_distance_delta = if use_timestamps {
            step_time as f64 * config.max_speed
        } else {
            config.max_distance_delta
        };
        let gap_in_trace = if use_timestamps && allow_splitting {
            step_time > max_broken_time
        } else {
            point - previous > config.max_broken_states
        };

        if !gap_in_trace {
            viterbi_step(
                engine,
                facade,
                costing,
                trace,
                &mut model,
                (previous, point),
                max_distance_delta,
            );

            if model.breakage[point] {
                trace!("Point {point} is broken");
                breakage_begin = Some(breakage_begin.map_or(point, |begin| begin.min(point)));
                // Drop the other end of the breakage too.
                prev_unbroken.pop();
            } else {
                prev_unbroken.push(point);
            }
        }

        if prev_unbroken.is_empty() || gap_in_trace {
            let split = breakage_begin.take().unwrap_or(point);
            debug!("Splitting trace at point {split}");
            split_points.push(split);

            model.clear(split);
            let Some(start) = model.initialize(split) else {
                prev_unbroken.clear();
                break;
            };

            prev_unbroken.clear();
            prev_unbroken.push(start);
            point = start;
        }

        point += 1;
    }

    if let Some(last) = prev_unbroken.last() {
        split_points.push(last + 1);
    }

    let classifier = BayesClassifier::default();
    let ends = split_points.iter().copied();
    let begins = iter::once(initial).chain(split_points.iter().copied());

    let sub_matchings = begins
        .zip(ends)
        .filter_map(|(begin, end)| reconstruct(&mut model, trace, &classifier, begin, end))
        .collect::<Vec<_>>();

    debug!("Matched {} points into {} sub-matchings", trace.len(), sub_matchings.len());
    Ok(sub_matchings)
}
