use crate::primitives::{Distance, Duration, EdgeId, NodeId, PhantomNode, Weight};

/// Node sequence of a CH search result. Consecutive nodes are joined by
/// an edge that may be a shortcut.
pub type PackedPath = Vec<NodeId>;

/// A fully expanded path over original graph edges.
///
/// `nodes.len() == edges.len() + 1` whenever the path is non-empty;
/// `edges[i]` joins `nodes[i]` and `nodes[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnpackedPath {
    pub nodes: Vec<NodeId>,
    pub edges: Vec<EdgeId>,
}

impl UnpackedPath {
    pub fn single(node: NodeId) -> Self {
        Self {
            nodes: vec![node],
            edges: vec![],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Appends `other`, whose first node must be the last node of `self`.
    pub fn splice(&mut self, other: UnpackedPath) {
        if self.nodes.is_empty() {
            *self = other;
            return;
        }

        debug_assert_eq!(self.nodes.last(), other.nodes.first());
        self.nodes.extend(other.nodes.into_iter().skip(1));
        self.edges.extend(other.edges);
    }
}

/// One annotated leg between two waypoints.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RouteLeg {
    pub nodes: Vec<NodeId>,
    pub edges: Vec<EdgeId>,

    pub weight: Weight,
    pub duration: Duration,
    pub distance: Distance,

    pub source_phantom: PhantomNode,
    pub target_phantom: PhantomNode,

    /// The leg starts on the reverse segment of its source phantom.
    pub source_traversed_in_reverse: bool,
    /// The leg ends on the reverse segment of its target phantom.
    pub target_traversed_in_reverse: bool,
}

/// A route through all waypoints of a request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RouteResult {
    pub legs: Vec<RouteLeg>,
}

impl RouteResult {
    pub fn weight(&self) -> Weight {
        self.legs.iter().map(|leg| leg.weight).sum()
    }

    pub fn duration(&self) -> Duration {
        self.legs.iter().map(|leg| leg.duration).sum()
    }

    pub fn distance(&self) -> Distance {
        self.legs.iter().map(|leg| leg.distance).sum()
    }

    pub fn is_valid(&self) -> bool {
        !self.legs.is_empty()
    }
}
