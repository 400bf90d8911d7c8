//! Confidence of a sub-matching, from a two-class naive Bayes classifier
//! over `ln(matched length / trace length)`.
//!
//! Both classes are Laplace distributions fitted to manually labelled
//! traces. A good matching follows the trace closely, so its feature sits
//! near zero.

/// Density of a Laplace distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaplaceDistribution {
    pub location: f64,
    pub scale: f64,
}

impl LaplaceDistribution {
    pub const fn new(location: f64, scale: f64) -> Self {
        Self { location, scale }
    }

    #[inline]
    pub fn density(&self, value: f64) -> f64 {
        0.5 / self.scale * (-(value - self.location).abs() / self.scale).exp()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassLabel {
    Positive,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BayesClassifier {
    pub positive: LaplaceDistribution,
    pub negative: LaplaceDistribution,
    /// A priori probability of the positive class.
    pub positive_prior: f64,
}

impl BayesClassifier {
    /// The more likely class of `feature` and its posterior probability.
    pub fn classify(&self, feature: f64) -> (ClassLabel, f64) {
        let positive = self.positive_prior * self.positive.density(feature);
        let negative = (1.0 - self.positive_prior) * self.negative.density(feature);
        let total = positive + negative;

        if total <= 0.0 {
            (ClassLabel::Negative, 1.0)
        } else if positive > negative {
            (ClassLabel::Positive, positive / total)
        } else {
            (ClassLabel::Negative, negative / total)
        }
    }
}

impl Default for BayesClassifier {
    fn default() -> Self {
        Self {
            positive: LaplaceDistribution::new(0.005986, 0.016646),
            negative: LaplaceDistribution::new(0.054385, 0.458432),
            positive_prior: 0.696774,
        }
    }
}

/// Probability in `[0, 1]` that a sub-matching is valid. Degenerate
/// lengths, such as a trace which never moves, score zero.
pub fn matching_confidence(classifier: &BayesClassifier, trace_distance: f64, matched_distance: f64) -> f64 {
    let feature = matched_distance.ln() - trace_distance.ln();
    if !feature.is_finite() {
        return 0.0;
    }

    match classifier.classify(feature) {
        (ClassLabel::Positive, probability) => probability,
        (ClassLabel::Negative, probability) => 1.0 - probability,
    }
}
