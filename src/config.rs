//! Engine configuration.
//!
//! Every value has a default matching the reference behaviour of the
//! search algorithms, so `EngineConfig::default()` is a complete
//! configuration. [`EngineConfig::from_env`] layers `ROUTERS_*`
//! environment variables (optionally from a `.env` file) on top.

use std::env;
use std::str::FromStr;

use log::debug;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not parse {key}={value}")]
    InvalidValue { key: String, value: String },

    #[error("{key} must be positive, got {value}")]
    NotPositive { key: String, value: f64 },
}

/// Map matching parameters.
///
/// Like the other sections it deserializes with defaults for missing
/// fields, for callers that embed the engine in their own configuration.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Number of consecutive states which may be broken before the
    /// trace is split, when timestamps are not used.
    pub max_broken_states: usize,
    /// Transition probability parameter β.
    pub beta: f64,
    /// Emission standard deviation (m) for points without a precision.
    pub default_gps_precision: f64,
    /// Maximum difference (m) between the network and great-circle
    /// distance of a transition when no timestamps are given.
    pub max_distance_delta: f64,
    /// Maximum plausible speed (m/s) used to bound transitions with timestamps.
    pub max_speed: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            max_broken_states: 10,
            beta: 10.0,
            default_gps_precision: 4.07,
            max_distance_delta: 2000.0,
            max_speed: 180.0 / 3.6,
        }
    }
}

/// Base parameters of the alternative route search. Requests between
/// close endpoints relax some of them, see
/// [`crate::routing::alternative::Parameters::from_request`].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct AlternativeConfig {
    pub search_space_overlap_factor: f64,
    pub alternatives_to_unpack_factor: usize,
    pub at_most_longer_by: f64,
    pub at_most_same_by: f64,
    pub at_least_optimal_around_via_by: f64,
    pub cells_at_most_same_by: f64,
}

impl Default for AlternativeConfig {
    fn default() -> Self {
        Self {
            search_space_overlap_factor: 1.33,
            alternatives_to_unpack_factor: 2,
            at_most_longer_by: 0.25,
            at_most_same_by: 0.75,
            at_least_optimal_around_via_by: 0.1,
            cells_at_most_same_by: 0.95,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Whether u-turns at waypoints are forbidden unless a request says otherwise.
    pub continue_straight_default: bool,
    /// Capacity of the shortcut annotation cache.
    pub unpacking_cache_capacity: usize,
    pub matching: MatchingConfig,
    pub alternatives: AlternativeConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            continue_straight_default: true,
            unpacking_cache_capacity: 1024,
            matching: MatchingConfig::default(),
            alternatives: AlternativeConfig::default(),
        }
    }
}

fn read<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

fn positive(key: &str, value: f64) -> Result<f64, ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::NotPositive {
            key: key.to_string(),
            value,
        })
    }
}

impl EngineConfig {
    /// Loads the defaults and overrides them from the environment.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `ROUTERS_CONTINUE_STRAIGHT` | `continue_straight_default` |
    /// | `ROUTERS_UNPACKING_CACHE_CAPACITY` | `unpacking_cache_capacity` |
    /// | `ROUTERS_MATCHING_MAX_SPEED` | `matching.max_speed` (m/s) |
    /// | `ROUTERS_MATCHING_BETA` | `matching.beta` |
    /// | `ROUTERS_MATCHING_GPS_PRECISION` | `matching.default_gps_precision` |
    /// | `ROUTERS_MATCHING_MAX_BROKEN_STATES` | `matching.max_broken_states` |
    pub fn from_env() -> Result<Self, ConfigError> {
        if dotenv::dotenv().is_err() {
            debug!("No .env file found, using process environment only");
        }

        let mut config = EngineConfig::default();

        if let Some(value) = read::<bool>("ROUTERS_CONTINUE_STRAIGHT")? {
            config.continue_straight_default = value;
        }
        if let Some(value) = read::<usize>("ROUTERS_UNPACKING_CACHE_CAPACITY")? {
            config.unpacking_cache_capacity = value;
        }
        if let Some(value) = read::<f64>("ROUTERS_MATCHING_MAX_SPEED")? {
            config.matching.max_speed = positive("ROUTERS_MATCHING_MAX_SPEED", value)?;
        }
        if let Some(value) = read::<f64>("ROUTERS_MATCHING_BETA")? {
            config.matching.beta = positive("ROUTERS_MATCHING_BETA", value)?;
        }
        if let Some(value) = read::<f64>("ROUTERS_MATCHING_GPS_PRECISION")? {
            config.matching.default_gps_precision =
                positive("ROUTERS_MATCHING_GPS_PRECISION", value)?;
        }
        if let Some(value) = read::<usize>("ROUTERS_MATCHING_MAX_BROKEN_STATES")? {
            config.matching.max_broken_states = value;
        }

        debug!("Engine configuration: {config:?}");
        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use serde::de::value::{Error, MapDeserializer};
    use serde::Deserialize;

    use super::*;

    #[test_log::test]
    fn missing_fields_keep_their_defaults() {
        let entries = [("beta", 5.0), ("max_speed", 30.0)];
        let config = MatchingConfig::deserialize(MapDeserializer::<_, Error>::new(entries.into_iter()))
            .expect("fields are known");

        assert_eq!(config.beta, 5.0);
        assert_eq!(config.max_speed, 30.0);
        assert_eq!(config.max_broken_states, MatchingConfig::default().max_broken_states);
        assert_eq!(config.max_distance_delta, MatchingConfig::default().max_distance_delta);

        let entries = [("at_most_longer_by", 0.5)];
        let config = AlternativeConfig::deserialize(MapDeserializer::<_, Error>::new(entries.into_iter()))
            .expect("fields are known");

        assert_eq!(
            config,
            AlternativeConfig {
                at_most_longer_by: 0.5,
                ..AlternativeConfig::default()
            }
        );
    }

    #[test_log::test]
    fn mistyped_field_is_rejected() {
        let entries = [("max_broken_states", "many")];
        let result = MatchingConfig::deserialize(MapDeserializer::<_, Error>::new(entries.into_iter()));

        assert!(result.is_err());
    }
}
