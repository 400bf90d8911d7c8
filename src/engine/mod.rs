//! Algorithm markers, heap payloads and the per-query workspace.
//!
//! Both backends are zero-sized marker types implementing [`Algorithm`],
//! which fixes the payload each heap of a [`SearchEngineData`] carries.
//! The searches themselves are reached through [`SearchAlgorithm`], with
//! the facade type chosen statically.

use std::fmt::Debug;

use crate::primitives::{
    needs_loop_backwards, needs_loop_forward, Distance, Duration, NodeId, PackedPath,
    PhantomNode, PhantomSeed, UnpackedPath, Weight,
};
use crate::routing::mld::QueryLevel;

#[doc(hidden)]
pub mod workspace;
#[doc(inline)]
pub use workspace::SearchEngineData;


/// Payload of a heap entry.
pub trait HeapData: Clone + Debug {
    /// Predecessor on the search tree. Seeds are their own parent.
    fn parent(&self) -> NodeId;

    /// Payload of a node seeded from a phantom segment.
    fn from_seed(seed: &PhantomSeed) -> Self;
}

pub trait Algorithm: Sized {
    type QueryData: HeapData;
    type ManyToManyData: HeapData;
    type MapMatchingData: HeapData;
}

/// Contraction hierarchies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ch;

/// Multi-level Dijkstra.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mld;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChQueryData {
    pub parent: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChManyToManyData {
    pub parent: NodeId,
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MldQueryData {
    pub parent: NodeId,
    /// Reached through a cell shortcut.
    pub from_clique_arc: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MldManyToManyData {
    pub parent: NodeId,
    pub from_clique_arc: bool,
    pub duration: Duration,
    pub distance: Distance,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MldMapMatchingData {
    pub parent: NodeId,
    pub from_clique_arc: bool,
    pub distance: Distance,
}

impl HeapData for ChQueryData {
    #[inline]
    fn parent(&self) -> NodeId {
        self.parent
    }

    fn from_seed(seed: &PhantomSeed) -> Self {
        Self { parent: seed.node }
    }
}

impl HeapData for ChManyToManyData {
    #[inline]
    fn parent(&self) -> NodeId {
        self.parent
    }

    fn from_seed(seed: &PhantomSeed) -> Self {
        Self {
            parent: seed.node,
            duration: seed.duration,
        }
    }
}

impl HeapData for MldQueryData {
    #[inline]
    fn parent(&self) -> NodeId {
        self.parent
    }

    fn from_seed(seed: &PhantomSeed) -> Self {
        Self {
            parent: seed.node,
            from_clique_arc: false,
        }
    }
}

impl HeapData for MldManyToManyData {
    #[inline]
    fn parent(&self) -> NodeId {
        self.parent
    }

    fn from_seed(seed: &PhantomSeed) -> Self {
        Self {
            parent: seed.node,
            from_clique_arc: false,
            duration: seed.duration,
            distance: seed.distance,
        }
    }
}

impl HeapData for MldMapMatchingData {
    #[inline]
    fn parent(&self) -> NodeId {
        self.parent
    }

    fn from_seed(seed: &PhantomSeed) -> Self {
        Self {
            parent: seed.node,
            from_clique_arc: false,
            distance: seed.distance,
        }
    }
}

/// Payloads the multi-level relaxation can produce.
pub trait MldHeapData: HeapData {
    /// Whether relaxations have to accumulate distances.
    const TRACKS_DISTANCE: bool;

    fn new(parent: NodeId, from_clique_arc: bool, distance: Distance) -> Self;
    fn from_clique_arc(&self) -> bool;
    fn distance(&self) -> Distance;
}

impl MldHeapData for MldQueryData {
    const TRACKS_DISTANCE: bool = false;

    #[inline]
    fn new(parent: NodeId, from_clique_arc: bool, _: Distance) -> Self {
        Self {
            parent,
            from_clique_arc,
        }
    }

    #[inline]
    fn from_clique_arc(&self) -> bool {
        self.from_clique_arc
    }

    #[inline]
    fn distance(&self) -> Distance {
        0.0
    }
}

impl MldHeapData for MldMapMatchingData {
    const TRACKS_DISTANCE: bool = true;

    #[inline]
    fn new(parent: NodeId, from_clique_arc: bool, distance: Distance) -> Self {
        Self {
            parent,
            from_clique_arc,
            distance,
        }
    }

    #[inline]
    fn from_clique_arc(&self) -> bool {
        self.from_clique_arc
    }

    #[inline]
    fn distance(&self) -> Distance {
        self.distance
    }
}

impl Algorithm for Ch {
    type QueryData = ChQueryData;
    type ManyToManyData = ChManyToManyData;
    type MapMatchingData = ChQueryData;
}

impl Algorithm for Mld {
    type QueryData = MldQueryData;
    type ManyToManyData = MldManyToManyData;
    type MapMatchingData = MldMapMatchingData;
}

/// Seed nodes at which a meeting of the two searches must not end the
/// search, because the route has to leave the seed segment and loop
/// back to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForceLoops {
    pub forward: Option<NodeId>,
    pub reverse: Option<NodeId>,
}

impl ForceLoops {
    pub const NONE: ForceLoops = ForceLoops {
        forward: None,
        reverse: None,
    };

    /// Loops required between two phantoms on the same segment, where
    /// the target lies behind the source.
    pub fn between(source: &PhantomNode, target: &PhantomNode) -> Self {
        Self {
            forward: needs_loop_forward(source, target).then_some(source.forward_segment_id.id),
            reverse: needs_loop_backwards(source, target).then_some(source.reverse_segment_id.id),
        }
    }

    pub fn only_forward(self) -> Self {
        Self {
            reverse: None,
            ..self
        }
    }

    pub fn only_reverse(self) -> Self {
        Self {
            forward: None,
            ..self
        }
    }

    /// Whether the search has to step over a meeting at `node`, given the
    /// parents the node has in both heaps.
    #[inline]
    pub fn forces(&self, forward_parent: NodeId, reverse_parent: NodeId) -> bool {
        forward_parent == reverse_parent
            && (self.forward == Some(forward_parent) || self.reverse == Some(forward_parent))
    }
}

/// Point-to-point search on a backend.
///
/// `search` expects `forward_heap_1` and `reverse_heap_1` of the
/// workspace to be seeded; it returns the best weight and the packed
/// path. [`SearchAlgorithm::unpack_path`] turns the packed path into
/// original edges.
pub trait SearchAlgorithm<F: ?Sized>: Algorithm {
    fn search<L: QueryLevel + ?Sized>(
        engine: &mut SearchEngineData<Self>,
        facade: &F,
        force_loops: ForceLoops,
        endpoints: &L,
        upper_bound: Option<Weight>,
    ) -> Option<(Weight, PackedPath)>;

    fn unpack_path(facade: &F, packed_path: &[NodeId]) -> UnpackedPath;

    /// Distance in metres between two phantoms along the network, or
    /// `f64::MAX` if no route exists within `upper_bound`.
    fn network_distance(
        engine: &mut SearchEngineData<Self>,
        facade: &F,
        source: &PhantomNode,
        target: &PhantomNode,
        upper_bound: Option<Weight>,
    ) -> f64;
}
