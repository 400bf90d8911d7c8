//! Duration and distance of unpacked shortcuts, memoised across the
//! searches of one session.

use indexmap::IndexMap;
use log::{error, trace};
use rustc_hash::FxBuildHasher;

use crate::facade::ChFacade;
use crate::primitives::{Distance, Duration, NodeId};
use crate::routing::ch::unpack::smallest_edge_between;

/// `(from, to, exclude index)` of a packed hop.
pub type CacheKey = (NodeId, NodeId, u8);

/// Least recently used map from packed hops to their annotations.
///
/// Entries are ordered from least to most recently used. The cache
/// belongs to the dataset identified by its timestamp and is emptied when
/// a facade with another timestamp is used.
#[derive(Debug, Clone)]
pub struct UnpackingCache {
    entries: IndexMap<CacheKey, (Duration, Distance), FxBuildHasher>,
    capacity: usize,
    timestamp: u64,
}

impl UnpackingCache {
    pub fn new(capacity: usize, timestamp: u64) -> Self {
        Self {
            entries: IndexMap::with_capacity_and_hasher(capacity, FxBuildHasher),
            capacity,
            timestamp,
        }
    }

    /// Empties the cache if it was filled from another dataset.
    pub fn invalidate_if_stale(&mut self, timestamp: u64) {
        if timestamp != self.timestamp {
            trace!(
                "Dataset changed from {} to {timestamp}, dropping {} cached annotations",
                self.timestamp,
                self.entries.len()
            );
            self.entries.clear();
            self.timestamp = timestamp;
        }
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Looks up `key`, marking it as most recently used.
    pub fn get(&mut self, key: &CacheKey) -> Option<(Duration, Distance)> {
        let index = self.entries.get_index_of(key)?;
        let last = self.entries.len() - 1;
        self.entries.move_index(index, last);
        self.entries.get_index(last).map(|(_, value)| *value)
    }

    pub fn insert(&mut self, key: CacheKey, value: (Duration, Distance)) {
        if self.capacity == 0 {
            return;
        }

        if let Some(index) = self.entries.get_index_of(&key) {
            let last = self.entries.len() - 1;
            self.entries.move_index(index, last);
            if let Some((_, slot)) = self.entries.get_index_mut(last) {
                *slot = value;
            }
            return;
        }

        if self.entries.len() >= self.capacity {
            self.entries.shift_remove_index(0);
        }
        self.entries.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Duration and distance of the original edges behind `packed_path`.
///
/// Every hop is resolved depth first; a shortcut is revisited once both
/// of its halves are known, at which point their sum is cached for the
/// shortcut itself. Returns `None` if a hop has no edge.
pub fn calculate_ebg_node_annotations<F>(
    facade: &F,
    packed_path: &[NodeId],
    cache: &mut UnpackingCache,
) -> Option<(Duration, Distance)>
where
    F: ChFacade + ?Sized,
{
    cache.invalidate_if_stale(facade.timestamp());
    let exclude_index = facade.exclude_index();

    let mut stack: Vec<(NodeId, NodeId, bool)> = packed_path
        .windows(2)
        .rev()
        .map(|hop| (hop[0], hop[1], false))
        .collect();
    let mut values: Vec<(Duration, Distance)> = Vec::with_capacity(stack.len());

    while let Some((from, to, expanded)) = stack.pop() {
        let key = (from, to, exclude_index);

        if expanded {
            let (Some(second), Some(first)) = (values.pop(), values.pop()) else {
                error!("Annotation stack underflow at {from} -> {to}");
                debug_assert!(false, "annotation stack underflow");
                return None;
            };
            let value = (first.0 + second.0, first.1 + second.1);
            cache.insert(key, value);
            values.push(value);
            continue;
        }

        if let Some(value) = cache.get(&key) {
            values.push(value);
            continue;
        }

        let Some(edge) = smallest_edge_between(facade, from, to) else {
            error!("No edge between {from} and {to} while annotating");
            debug_assert!(false, "packed path hop {from} -> {to} has no edge");
            return None;
        };

        let data = facade.edge_data(edge);
        if data.shortcut {
            let middle = data.turn_id;
            stack.push((from, to, true));
            stack.push((middle, to, false));
            stack.push((from, middle, false));
        } else {
            let value = (data.duration, data.distance);
            cache.insert(key, value);
            values.push(value);
        }
    }

    Some(
        values
            .into_iter()
            .fold((0, 0.0), |(duration, distance), value| {
                (duration + value.0, distance + value.1)
            }),
    )
}
