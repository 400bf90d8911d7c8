use log::trace;

fn shaped<T: Clone>(rows: &[Vec<f64>], value: T) -> Vec<Vec<T>> {
    rows.iter().map(|row| vec![value.clone(); row.len()]).collect()
}

/// A state of the model: a trace point and one of its candidates.
pub type State = (usize, usize);

/// Viterbi tables over the candidates of every trace point.
///
/// Rows are trace points, columns their candidates. A point is broken
/// when none of its candidates can be reached from the previous unbroken
/// point, or, for the first point of a sub-matching, when none of its
/// candidates is plausible at all.
#[derive(Debug, Clone)]
pub struct HiddenMarkovModel {
    pub viterbi: Vec<Vec<f64>>,
    pub viterbi_reachable: Vec<Vec<bool>>,
    pub parents: Vec<Vec<Option<State>>>,
    pub path_distances: Vec<Vec<f64>>,
    pub pruned: Vec<Vec<bool>>,
    pub breakage: Vec<bool>,
    emission_log_probabilities: Vec<Vec<f64>>,
}

impl HiddenMarkovModel {
    pub fn new(emission_log_probabilities: Vec<Vec<f64>>) -> Self {
        let rows = &emission_log_probabilities;

        Self {
            viterbi: shaped(rows, f64::NEG_INFINITY),
            viterbi_reachable: shaped(rows, false),
            parents: shaped(rows, None),
            path_distances: shaped(rows, 0.0),
            pruned: shaped(rows, true),
            breakage: vec![true; rows.len()],
            emission_log_probabilities,
        }
    }

    pub fn len(&self) -> usize {
        self.breakage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakage.is_empty()
    }

    #[inline]
    pub fn emission(&self, state: State) -> f64 {
        self.emission_log_probabilities[state.0][state.1]
    }

    /// Forgets every point from `from` onwards, keeping the tables of
    /// the sub-matchings before it.
    pub fn clear(&mut self, from: usize) {
        for point in from..self.len() {
            self.viterbi[point].fill(f64::NEG_INFINITY);
            self.viterbi_reachable[point].fill(false);
            self.parents[point].fill(None);
            self.path_distances[point].fill(0.0);
            self.pruned[point].fill(true);
            self.breakage[point] = true;
        }
    }

    /// Starts a sub-matching on the first point from `from` onwards with
    /// a plausible candidate. The candidates of every point on the way
    /// are scored by their emission alone and point to themselves.
    ///
    /// `None` if no point before the last one can start a sub-matching.
    pub fn initialize(&mut self, from: usize) -> Option<usize> {
        if from >= self.len() {
            return None;
        }

        let mut point = from;
        loop {
            for candidate in 0..self.viterbi[point].len() {
                let viterbi = self.emission((point, candidate));
                let pruned = viterbi < f64::MIN;

                self.viterbi[point][candidate] = viterbi;
                self.parents[point][candidate] = Some((point, candidate));
                self.pruned[point][candidate] = pruned;
                self.breakage[point] = self.breakage[point] && pruned;
            }

            point += 1;
            if point >= self.len() || !self.breakage[point - 1] {
                break;
            }
        }

        if point >= self.len() {
            trace!("No plausible candidate from point {from} onwards");
            return None;
        }
        Some(point - 1)
    }

    /// Number of reachable candidates of `point`.
    pub fn reachable_count(&self, point: usize) -> usize {
        self.viterbi_reachable[point].iter().filter(|reachable| **reachable).count()
    }

    /// The candidate of `point` ending the most likely path, the first
    /// one on ties.
    pub fn best_candidate(&self, point: usize) -> Option<usize> {
        self.viterbi[point]
            .iter()
            .enumerate()
            .rev()
            .max_by(|(_, left), (_, right)| left.total_cmp(right))
            .map(|(candidate, _)| candidate)
    }
}
