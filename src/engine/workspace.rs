use log::trace;

use crate::config::EngineConfig;
use crate::engine::Algorithm;
use crate::heap::{MapStorage, QueryHeap};
use crate::routing::ch::UnpackingCache;

/// Scratch heaps of one query thread.
///
/// A workspace is owned by the caller and handed to every search by
/// mutable reference; searches clear the heaps they use before seeding
/// them, so a workspace can be reused across queries without any state
/// leaking between them. [`Self::ensure_capacity`] resizes the dense heaps
/// when the graph changes.
#[derive(Debug, Clone)]
pub struct SearchEngineData<A: Algorithm> {
    pub forward_heap_1: QueryHeap<A::QueryData>,
    pub reverse_heap_1: QueryHeap<A::QueryData>,
    /// Second pair of heaps, used by the core phase of a core-CH search.
    pub forward_heap_2: QueryHeap<A::QueryData>,
    pub reverse_heap_2: QueryHeap<A::QueryData>,
    pub many_to_many_heap: QueryHeap<A::ManyToManyData, MapStorage>,
    pub map_matching_forward_heap: QueryHeap<A::MapMatchingData>,
    pub map_matching_reverse_heap: QueryHeap<A::MapMatchingData>,
    /// Shortcut annotations, kept across queries and resizes.
    pub unpacking_cache: UnpackingCache,
    number_of_nodes: usize,
}

impl<A: Algorithm> Default for SearchEngineData<A> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<A: Algorithm> SearchEngineData<A> {
    pub fn new(number_of_nodes: usize) -> Self {
        Self {
            forward_heap_1: QueryHeap::new(number_of_nodes),
            reverse_heap_1: QueryHeap::new(number_of_nodes),
            forward_heap_2: QueryHeap::new(number_of_nodes),
            reverse_heap_2: QueryHeap::new(number_of_nodes),
            many_to_many_heap: QueryHeap::new(number_of_nodes),
            map_matching_forward_heap: QueryHeap::new(number_of_nodes),
            map_matching_reverse_heap: QueryHeap::new(number_of_nodes),
            unpacking_cache: UnpackingCache::new(
                EngineConfig::default().unpacking_cache_capacity,
                0,
            ),
            number_of_nodes,
        }
    }

    /// A workspace whose unpacking cache holds `config.unpacking_cache_capacity`
    /// entries.
    pub fn with_config(number_of_nodes: usize, config: &EngineConfig) -> Self {
        Self {
            unpacking_cache: UnpackingCache::new(config.unpacking_cache_capacity, 0),
            ..Self::new(number_of_nodes)
        }
    }

    pub fn number_of_nodes(&self) -> usize {
        self.number_of_nodes
    }

    /// Makes the workspace fit a graph of `number_of_nodes` nodes, keeping
    /// the allocations when the size is unchanged.
    pub fn ensure_capacity(&mut self, number_of_nodes: usize) {
        if number_of_nodes == self.number_of_nodes {
            self.reset();
        } else {
            trace!(
                "Resizing search workspace from {} to {number_of_nodes} nodes",
                self.number_of_nodes
            );
            let unpacking_cache = std::mem::replace(&mut self.unpacking_cache, UnpackingCache::new(0, 0));
            *self = Self {
                unpacking_cache,
                ..Self::new(number_of_nodes)
            };
        }
    }

    /// Clears every heap.
    pub fn reset(&mut self) {
        self.forward_heap_1.clear();
        self.reverse_heap_1.clear();
        self.forward_heap_2.clear();
        self.reverse_heap_2.clear();
        self.many_to_many_heap.clear();
        self.map_matching_forward_heap.clear();
        self.map_matching_reverse_heap.clear();
    }
}
