//! Addressable min-heap used by every search.
//!
//! Nodes are appended to an insertion list and referenced from a
//! [`BinaryHeap`] of `(weight, slot)` entries. Decreasing a key pushes a
//! fresh entry; outdated entries are discarded lazily so that the top of
//! the heap is always a live node. Ties are broken by insertion order,
//! so two runs over the same input settle nodes in the same order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::primitives::{NodeId, Weight};

#[doc(hidden)]
pub mod storage;
#[doc(inline)]
pub use storage::{ArrayStorage, IndexStorage, MapStorage};


#[derive(Debug, Clone, PartialEq)]
pub struct HeapNode<D> {
    pub node: NodeId,
    pub weight: Weight,
    pub data: D,
}

#[derive(Debug, Clone)]
struct Slot<D> {
    heap_node: HeapNode<D>,
    removed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    weight: Weight,
    index: usize,
}

impl PartialOrd for Entry {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .weight
            .cmp(&self.weight)
            .then_with(|| other.index.cmp(&self.index))
    }
}

#[derive(Debug, Clone)]
pub struct QueryHeap<D, S: IndexStorage = ArrayStorage> {
    inserted: Vec<Slot<D>>,
    heap: BinaryHeap<Entry>,
    storage: S,
    live: usize,
}

impl<D, S: IndexStorage> Default for QueryHeap<D, S> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<D, S: IndexStorage> QueryHeap<D, S> {
    pub fn new(number_of_nodes: usize) -> Self {
        Self {
            inserted: Vec::new(),
            heap: BinaryHeap::new(),
            storage: S::with_capacity(number_of_nodes),
            live: 0,
        }
    }

    #[inline]
    fn index_of(&self, node: NodeId) -> Option<usize> {
        self.storage
            .get(node)
            .filter(|index| {
                self.inserted
                    .get(*index)
                    .is_some_and(|slot| slot.heap_node.node == node)
            })
    }

    #[inline]
    fn is_stale(&self, entry: &Entry) -> bool {
        let slot = &self.inserted[entry.index];
        slot.removed || slot.heap_node.weight != entry.weight
    }

    fn prune(&mut self) {
        while let Some(top) = self.heap.peek() {
            if !self.is_stale(top) {
                break;
            }
            self.heap.pop();
        }
    }

    /// Inserts a node which was not yet inserted since the last clear.
    pub fn insert(&mut self, node: NodeId, weight: Weight, data: D) {
        debug_assert!(!self.was_inserted(node), "node {node} inserted twice");

        let index = self.inserted.len();
        self.inserted.push(Slot {
            heap_node: HeapNode { node, weight, data },
            removed: false,
        });
        self.storage.set(node, index);
        self.heap.push(Entry { weight, index });
        self.live += 1;
        self.prune();
    }

    /// Lowers the key of a node that is still in the heap and replaces its
    /// data. An equal key only replaces the data.
    pub fn decrease_key(&mut self, node: NodeId, weight: Weight, data: D) {
        let Some(index) = self.index_of(node) else {
            debug_assert!(false, "decrease_key on node {node} which is not in the heap");
            return;
        };

        let slot = &mut self.inserted[index];
        debug_assert!(!slot.removed, "decrease_key on settled node {node}");
        debug_assert!(weight <= slot.heap_node.weight);

        slot.heap_node.data = data;
        if weight < slot.heap_node.weight {
            slot.heap_node.weight = weight;
            self.heap.push(Entry { weight, index });
            self.prune();
        }
    }

    /// Inserts a node, or lowers its key if the new weight is smaller.
    /// Settled nodes are left untouched.
    pub fn insert_or_update(&mut self, node: NodeId, weight: Weight, data: D) {
        match self.index_of(node) {
            None => self.insert(node, weight, data),
            Some(index) => {
                let slot = &self.inserted[index];
                if !slot.removed && weight < slot.heap_node.weight {
                    self.decrease_key(node, weight, data);
                }
            }
        }
    }

    pub fn was_inserted(&self, node: NodeId) -> bool {
        self.index_of(node).is_some()
    }

    /// True once the node has been popped (or dropped by [`Self::delete_all`]).
    pub fn was_removed(&self, node: NodeId) -> bool {
        self.index_of(node)
            .is_some_and(|index| self.inserted[index].removed)
    }

    pub fn get_key(&self, node: NodeId) -> Option<Weight> {
        self.index_of(node)
            .map(|index| self.inserted[index].heap_node.weight)
    }

    pub fn get_data(&self, node: NodeId) -> Option<&D> {
        self.index_of(node)
            .map(|index| &self.inserted[index].heap_node.data)
    }

    pub fn get_data_mut(&mut self, node: NodeId) -> Option<&mut D> {
        self.index_of(node)
            .map(|index| &mut self.inserted[index].heap_node.data)
    }

    pub fn get_heap_node_if_was_inserted(&self, node: NodeId) -> Option<&HeapNode<D>> {
        self.index_of(node)
            .map(|index| &self.inserted[index].heap_node)
    }

    /// Node with the smallest key.
    pub fn min(&self) -> Option<NodeId> {
        self.heap
            .peek()
            .map(|entry| self.inserted[entry.index].heap_node.node)
    }

    pub fn min_key(&self) -> Option<Weight> {
        self.heap.peek().map(|entry| entry.weight)
    }

    pub fn delete_min(&mut self) -> Option<NodeId> {
        self.delete_min_index()
            .map(|index| self.inserted[index].heap_node.node)
    }

    pub fn delete_min_get_heap_node(&mut self) -> Option<HeapNode<D>>
    where
        D: Clone,
    {
        self.delete_min_index()
            .map(|index| self.inserted[index].heap_node.clone())
    }

    fn delete_min_index(&mut self) -> Option<usize> {
        let entry = self.heap.pop()?;
        self.inserted[entry.index].removed = true;
        self.live -= 1;
        self.prune();
        Some(entry.index)
    }

    /// Marks every queued node as removed, keeping their keys readable.
    pub fn delete_all(&mut self) {
        for slot in self.inserted.iter_mut() {
            slot.removed = true;
        }
        self.heap.clear();
        self.live = 0;
    }

    /// Forgets every node.
    pub fn clear(&mut self) {
        self.inserted.clear();
        self.heap.clear();
        self.storage.clear();
        self.live = 0;
    }

    /// Number of nodes waiting in the heap.
    pub fn size(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Every node inserted since the last clear, settled or not.
    pub fn inserted(&self) -> impl Iterator<Item = &HeapNode<D>> + '_ {
        self.inserted.iter().map(|slot| &slot.heap_node)
    }
}
