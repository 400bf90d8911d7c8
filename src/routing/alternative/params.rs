use geo::{Distance as _, Haversine};

use crate::config::AlternativeConfig;
use crate::primitives::{candidates_snapped_location, PhantomEndpointCandidates};

/// Thresholds of one alternative route query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Parameters {
    /// How far past the shortest path weight both searches keep running
    /// to collect via nodes.
    pub search_space_overlap_factor: f64,
    /// Candidates unpacked per requested alternative.
    pub alternatives_to_unpack_factor: usize,
    /// Maximal stretch over the shortest path.
    pub at_most_longer_by: f64,
    /// Maximal share of an alternative's duration on already accepted routes.
    pub at_most_same_by: f64,
    /// Minimal optimal stretch around the via node, relative to the detour.
    pub at_least_optimal_around_via_by: f64,
    /// Maximal share of level one cells already visited by accepted routes.
    pub cells_at_most_same_by: f64,
}

impl From<&AlternativeConfig> for Parameters {
    fn from(config: &AlternativeConfig) -> Self {
        Self {
            search_space_overlap_factor: config.search_space_overlap_factor,
            alternatives_to_unpack_factor: config.alternatives_to_unpack_factor,
            at_most_longer_by: config.at_most_longer_by,
            at_most_same_by: config.at_most_same_by,
            at_least_optimal_around_via_by: config.at_least_optimal_around_via_by,
            cells_at_most_same_by: config.cells_at_most_same_by,
        }
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self::from(&AlternativeConfig::default())
    }
}

impl Parameters {
    /// Relaxes `config` for endpoints close to each other.
    ///
    /// Short routes have few candidate vias, so more of them are unpacked
    /// and the sharing limits are tightened to keep alternatives distinct.
    pub fn from_request(config: &AlternativeConfig, candidates: &PhantomEndpointCandidates) -> Self {
        let mut parameters = Self::from(config);

        let (Some(source), Some(target)) = (
            candidates_snapped_location(&candidates.source_phantoms),
            candidates_snapped_location(&candidates.target_phantoms),
        ) else {
            return parameters;
        };

        let distance = Haversine.distance(source, target);
        if distance < 10_000.0 {
            parameters.alternatives_to_unpack_factor = 10;
            parameters.cells_at_most_same_by = 1.0;
            parameters.at_least_optimal_around_via_by = 0.2;
            parameters.at_most_same_by = 0.50;
        } else if distance < 20_000.0 {
            parameters.alternatives_to_unpack_factor = 8;
            parameters.cells_at_most_same_by = 1.0;
            parameters.at_least_optimal_around_via_by = 0.2;
            parameters.at_most_same_by = 0.60;
        } else if distance < 50_000.0 {
            parameters.alternatives_to_unpack_factor = 6;
            parameters.cells_at_most_same_by = 0.95;
            parameters.at_most_same_by = 0.65;
        } else if distance < 100_000.0 {
            parameters.alternatives_to_unpack_factor = 4;
            parameters.cells_at_most_same_by = 0.95;
            parameters.at_most_same_by = 0.70;
        }

        parameters
    }

    /// Replaces the allowed stretch by the one for a route of `seconds`.
    pub fn with_duration(self, seconds: f64) -> Self {
        Self {
            at_most_longer_by: longer_by_factor_based_on_duration(seconds),
            ..self
        }
    }
}

/// Allowed stretch of an alternative to a route taking `seconds`.
///
/// Flat 1.0 below five minutes and 0.2 above ten hours. In between a
/// hyperbola fitted to 0.75 at ten minutes, 0.5 at half an hour,
/// 0.4 at one hour and 0.3 at three hours.
pub fn longer_by_factor_based_on_duration(seconds: f64) -> f64 {
    const A: f64 = 1.91578463e-01;
    const B: f64 = 1.35118442e+03;
    const C: f64 = 2.45437877e+09;
    const D: f64 = -2.07944571e+03;

    if seconds < 5.0 * 60.0 {
        return 1.0;
    }
    if seconds > 10.0 * 60.0 * 60.0 {
        return 0.20;
    }

    let shifted = seconds - D;
    A + B / shifted + C / shifted.powi(3)
}
