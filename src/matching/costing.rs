//! Log-probabilities of the hidden Markov model.
//!
//! The model is scored through two strategies:
//!
//! - [`EmissionStrategy`]
//!     Likelihood of observing a trace point given it was recorded on a
//!     snapping candidate, from the distance between the two.
//!
//! - [`TransitionStrategy`]
//!     Likelihood of moving between candidates of consecutive points,
//!     from how much the route between them deviates from the
//!     great-circle distance of the points.
//!
//! ### Default Strategies:
//! - [`GaussianEmission`]: Emission, with [`LaplaceEmission`] as a
//!   heavier tailed alternative
//! - [`ExponentialTransition`]: Transition

use std::f64::consts::PI;

use crate::config::MatchingConfig;

pub trait Strategy<Ctx> {
    /// A calculable log-probability which can be any required
    /// type, so long as it is castable into a 64-bit float.
    type Cost: Into<f64>;

    /// The calculation you must implement.
    fn calculate(&self, context: Ctx) -> Self::Cost;

    /// The natural logarithm of the probability of `context`.
    #[inline(always)]
    fn log_probability(&self, context: Ctx) -> f64 {
        self.calculate(context).into()
    }
}

pub trait EmissionStrategy: Strategy<EmissionContext> {}
impl<T> EmissionStrategy for T where T: Strategy<EmissionContext> {}

pub trait TransitionStrategy: Strategy<TransitionContext> {}
impl<T> TransitionStrategy for T where T: Strategy<TransitionContext> {}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EmissionContext {
    /// The distance (in meters) between the trace point and the candidate.
    pub distance: f64,

    /// Standard deviation (in meters) of the trace point's position, if
    /// the caller knows it.
    pub gps_precision: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransitionContext {
    /// Length (in meters) of the route between both candidates.
    pub network_distance: f64,

    /// Great-circle distance (in meters) between both trace points.
    pub haversine_distance: f64,
}

impl TransitionContext {
    /// How far the route deviates from the straight line.
    #[inline]
    pub fn delta(&self) -> f64 {
        (self.network_distance - self.haversine_distance).abs()
    }
}

/// Snapping distances follow a zero-mean normal distribution whose
/// standard deviation is the point's precision.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GaussianEmission {
    pub default_sigma: f64,
}

impl Strategy<EmissionContext> for GaussianEmission {
    type Cost = f64;

    #[inline]
    fn calculate(&self, context: EmissionContext) -> f64 {
        let sigma = context.gps_precision.unwrap_or(self.default_sigma);
        let normalised = context.distance / sigma;

        -0.5 * ((2.0 * PI).ln() + normalised * normalised) - sigma.ln()
    }
}

/// Snapping distances follow a Laplace distribution whose scale is the
/// point's precision. Heavier tailed than [`GaussianEmission`], so far
/// candidates are penalised less.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LaplaceEmission {
    pub default_scale: f64,
}

impl Strategy<EmissionContext> for LaplaceEmission {
    type Cost = f64;

    #[inline]
    fn calculate(&self, context: EmissionContext) -> f64 {
        let scale = context.gps_precision.unwrap_or(self.default_scale);

        -(2.0 * scale).ln() - context.distance.abs() / scale
    }
}

/// Route deviations follow an exponential distribution with scale `beta`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExponentialTransition {
    pub beta: f64,
}

impl Strategy<TransitionContext> for ExponentialTransition {
    type Cost = f64;

    #[inline]
    fn calculate(&self, context: TransitionContext) -> f64 {
        -self.beta.ln() - context.delta() / self.beta
    }
}

/// The pair of strategies a matching is scored with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CostingStrategies<E = GaussianEmission, T = ExponentialTransition>
where
    E: EmissionStrategy,
    T: TransitionStrategy,
{
    pub emission: E,
    pub transition: T,
}

impl<E, T> CostingStrategies<E, T>
where
    E: EmissionStrategy,
    T: TransitionStrategy,
{
    pub fn new(emission: E, transition: T) -> Self {
        Self {
            emission,
            transition,
        }
    }

    #[inline(always)]
    pub fn emission(&self, context: EmissionContext) -> f64 {
        self.emission.log_probability(context)
    }

    #[inline(always)]
    pub fn transition(&self, context: TransitionContext) -> f64 {
        self.transition.log_probability(context)
    }
}

/// Gaussian emission with `default_gps_precision` as σ and exponential
/// transition with `beta`. Use [`CostingStrategies::new`] with a
/// [`LaplaceEmission`] for Laplace-distributed snapping distances.
impl From<&MatchingConfig> for CostingStrategies {
    fn from(config: &MatchingConfig) -> Self {
        Self::new(
            GaussianEmission {
                default_sigma: config.default_gps_precision,
            },
            ExponentialTransition { beta: config.beta },
        )
    }
}

impl Default for CostingStrategies {
    fn default() -> Self {
        Self::from(&MatchingConfig::default())
    }
}
