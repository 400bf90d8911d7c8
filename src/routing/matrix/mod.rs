//! Many-to-many duration and distance tables.
//!
//! Both backends use the bucket scheme: one search per target records
//! every settled node into a bucket list, which the searches from the
//! sources scan at each node they settle. The multi-level backend also
//! runs single unidirectional searches for one-to-many and many-to-one
//! requests.

use log::debug;
use measure_time::debug_time;

use crate::engine::{Algorithm, SearchEngineData};
use crate::primitives::{
    Distance, Duration, NodeId, PhantomNode, Weight, INVALID_EDGE_DISTANCE, INVALID_EDGE_WEIGHT,
    MAXIMAL_EDGE_DURATION,
};
use crate::routing::SearchError;

#[doc(hidden)]
pub mod ch;
#[doc(hidden)]
pub mod mld;

#[cfg(test)]
mod test;

/// A node settled by one of the bucket searches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeBucket {
    pub node: NodeId,
    pub parent: NodeId,
    pub from_clique_arc: bool,
    pub column: usize,
    pub weight: Weight,
    pub duration: Duration,
    pub distance: Distance,
}

/// Orders buckets by node, then column, for the lookups below.
pub fn sort_buckets(buckets: &mut [NodeBucket]) {
    buckets.sort_unstable_by_key(|bucket| (bucket.node, bucket.column));
}

/// All buckets of `node` in a sorted bucket list.
pub fn buckets_at(buckets: &[NodeBucket], node: NodeId) -> &[NodeBucket] {
    let start = buckets.partition_point(|bucket| bucket.node < node);
    let end = start + buckets[start..].partition_point(|bucket| bucket.node == node);
    &buckets[start..end]
}

/// The bucket `column` left at `node`.
pub fn bucket_of(buckets: &[NodeBucket], node: NodeId, column: usize) -> Option<&NodeBucket> {
    buckets
        .binary_search_by_key(&(node, column), |bucket| (bucket.node, bucket.column))
        .ok()
        .map(|index| &buckets[index])
}

/// Best route found so far for one matrix entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatrixRoute {
    pub weight: Weight,
    pub duration: Duration,
    pub distance: Distance,
    pub middle: NodeId,
    /// The route turns around on a self-loop at `middle`.
    pub looped: bool,
}

impl MatrixRoute {
    /// Whether `self` is better than `other`, by weight, then duration,
    /// then distance.
    #[inline]
    pub fn improves(&self, other: &Option<MatrixRoute>) -> bool {
        match other {
            None => true,
            Some(other) => (self.weight, self.duration)
                .cmp(&(other.weight, other.duration))
                .then_with(|| self.distance.total_cmp(&other.distance))
                .is_lt(),
        }
    }
}

/// Stores `route` in `slot` if it improves on the current entry.
#[inline]
pub fn improve(slot: &mut Option<MatrixRoute>, route: MatrixRoute) {
    if route.improves(slot) {
        *slot = Some(route);
    }
}

/// A dense row-major `sources x targets` table.
///
/// Unreachable entries are `None`; the `*_with_sentinels` views replace
/// them with the sentinel values of the routing data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Matrix {
    number_of_sources: usize,
    number_of_targets: usize,
    weights: Vec<Option<Weight>>,
    durations: Vec<Option<Duration>>,
    distances: Vec<Option<Distance>>,
}

impl Matrix {
    pub fn new(number_of_sources: usize, number_of_targets: usize) -> Self {
        let entries = number_of_sources * number_of_targets;
        Self {
            number_of_sources,
            number_of_targets,
            weights: vec![None; entries],
            durations: vec![None; entries],
            distances: vec![None; entries],
        }
    }

    /// Builds a table from row-major routes.
    pub fn from_routes(
        number_of_sources: usize,
        number_of_targets: usize,
        routes: &[Option<MatrixRoute>],
    ) -> Self {
        debug_assert_eq!(routes.len(), number_of_sources * number_of_targets);

        Self {
            number_of_sources,
            number_of_targets,
            weights: routes.iter().map(|route| route.map(|route| route.weight)).collect(),
            durations: routes.iter().map(|route| route.map(|route| route.duration)).collect(),
            distances: routes.iter().map(|route| route.map(|route| route.distance)).collect(),
        }
    }

    pub fn number_of_sources(&self) -> usize {
        self.number_of_sources
    }

    pub fn number_of_targets(&self) -> usize {
        self.number_of_targets
    }

    #[inline]
    fn index(&self, source: usize, target: usize) -> Option<usize> {
        (source < self.number_of_sources && target < self.number_of_targets)
            .then_some(source * self.number_of_targets + target)
    }

    pub fn weight(&self, source: usize, target: usize) -> Option<Weight> {
        self.index(source, target).and_then(|index| self.weights[index])
    }

    pub fn duration(&self, source: usize, target: usize) -> Option<Duration> {
        self.index(source, target).and_then(|index| self.durations[index])
    }

    pub fn distance(&self, source: usize, target: usize) -> Option<Distance> {
        self.index(source, target).and_then(|index| self.distances[index])
    }

    pub fn set(
        &mut self,
        source: usize,
        target: usize,
        weight: Weight,
        duration: Duration,
        distance: Distance,
    ) {
        if let Some(index) = self.index(source, target) {
            self.weights[index] = Some(weight);
            self.durations[index] = Some(duration);
            self.distances[index] = Some(distance);
        }
    }

    /// Swaps sources and targets.
    pub fn transposed(&self) -> Self {
        let mut transposed = Matrix::new(self.number_of_targets, self.number_of_sources);
        for source in 0..self.number_of_sources {
            for target in 0..self.number_of_targets {
                let (Some(from), Some(to)) = (self.index(source, target), transposed.index(target, source))
                else {
                    continue;
                };
                transposed.weights[to] = self.weights[from];
                transposed.durations[to] = self.durations[from];
                transposed.distances[to] = self.distances[from];
            }
        }
        transposed
    }

    pub fn weights_with_sentinels(&self) -> Vec<Weight> {
        self.weights
            .iter()
            .map(|weight| weight.unwrap_or(INVALID_EDGE_WEIGHT))
            .collect()
    }

    pub fn durations_with_sentinels(&self) -> Vec<Duration> {
        self.durations
            .iter()
            .map(|duration| duration.unwrap_or(MAXIMAL_EDGE_DURATION))
            .collect()
    }

    pub fn distances_with_sentinels(&self) -> Vec<Distance> {
        self.distances
            .iter()
            .map(|distance| distance.unwrap_or(INVALID_EDGE_DISTANCE))
            .collect()
    }
}

/// Backends able to compute a matrix.
///
/// `sources` and `targets` index into `phantoms` and are validated by
/// [`many_to_many_search`].
pub trait ManyToManyAlgorithm<F: ?Sized>: Algorithm {
    fn many_to_many(
        engine: &mut SearchEngineData<Self>,
        facade: &F,
        phantoms: &[PhantomNode],
        sources: &[usize],
        targets: &[usize],
    ) -> Matrix;
}

fn resolve_indices(indices: &[usize], len: usize) -> Result<Vec<usize>, SearchError> {
    if indices.is_empty() {
        return Ok((0..len).collect());
    }

    match indices.iter().find(|index| **index >= len) {
        Some(index) => Err(SearchError::IndexOutOfRange { index: *index, len }),
        None => Ok(indices.to_vec()),
    }
}

/// Duration and distance table between `phantoms[sources]` and
/// `phantoms[targets]`. An empty index list selects every phantom.
///
/// Entries whose source and target are the same phantom are zero.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all, level = "info"))]
pub fn many_to_many_search<A, F>(
    engine: &mut SearchEngineData<A>,
    facade: &F,
    phantoms: &[PhantomNode],
    sources: &[usize],
    targets: &[usize],
) -> Result<Matrix, SearchError>
where
    A: ManyToManyAlgorithm<F>,
    F: ?Sized,
{
    let sources = resolve_indices(sources, phantoms.len())?;
    let targets = resolve_indices(targets, phantoms.len())?;

    if let Some(index) = sources
        .iter()
        .chain(&targets)
        .find(|index| !phantoms[**index].is_valid())
    {
        return Err(SearchError::InvalidPhantom(*index));
    }

    debug_time!("many to many {}x{}", sources.len(), targets.len());
    let mut matrix = A::many_to_many(engine, facade, phantoms, &sources, &targets);

    for (row, source) in sources.iter().enumerate() {
        for (column, target) in targets.iter().enumerate() {
            if source == target {
                matrix.set(row, column, 0, 0, 0.0);
            }
        }
    }

    debug!(
        "Matrix of {} entries, {} reachable",
        sources.len() * targets.len(),
        matrix.durations.iter().filter(|duration| duration.is_some()).count()
    );

    Ok(matrix)
}
