use rustc_hash::FxHashMap;

use crate::primitives::NodeId;

/// Maps a node to the slot it occupies in the heap's insertion list.
///
/// A storage may return stale slots after a clear; the heap validates
/// every lookup against the node recorded in the slot.
pub trait IndexStorage: Default {
    fn with_capacity(capacity: usize) -> Self;
    fn get(&self, node: NodeId) -> Option<usize>;
    fn set(&mut self, node: NodeId, index: usize);
    fn clear(&mut self);
}

/// Dense storage sized by the number of graph nodes. Clearing is free,
/// which makes it the storage of choice for point-to-point searches.
#[derive(Debug, Default, Clone)]
pub struct ArrayStorage {
    positions: Vec<usize>,
}

impl IndexStorage for ArrayStorage {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            positions: vec![usize::MAX; capacity],
        }
    }

    #[inline]
    fn get(&self, node: NodeId) -> Option<usize> {
        self.positions
            .get(node as usize)
            .copied()
            .filter(|index| *index != usize::MAX)
    }

    #[inline]
    fn set(&mut self, node: NodeId, index: usize) {
        let node = node as usize;
        if node >= self.positions.len() {
            self.positions.resize(node + 1, usize::MAX);
        }
        self.positions[node] = index;
    }

    #[inline]
    fn clear(&mut self) {}
}

/// Sparse storage for searches which touch few nodes, such as the
/// per-target searches of a matrix query.
#[derive(Debug, Default, Clone)]
pub struct MapStorage {
    positions: FxHashMap<NodeId, usize>,
}

impl IndexStorage for MapStorage {
    fn with_capacity(_: usize) -> Self {
        Self::default()
    }

    #[inline]
    fn get(&self, node: NodeId) -> Option<usize> {
        self.positions.get(&node).copied()
    }

    #[inline]
    fn set(&mut self, node: NodeId, index: usize) {
        self.positions.insert(node, index);
    }

    #[inline]
    fn clear(&mut self) {
        self.positions.clear();
    }
}
