use geo::Point;

use crate::primitives::{Direction, Distance, Duration, NodeId, Weight};

/// One directed half of a snapped segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentId {
    pub id: NodeId,
    pub enabled: bool,
}

impl SegmentId {
    pub const fn new(id: NodeId, enabled: bool) -> Self {
        Self { id, enabled }
    }

    pub const fn disabled() -> Self {
        Self {
            id: crate::primitives::SPECIAL_NODEID,
            enabled: false,
        }
    }
}

/// A location snapped onto the graph.
///
/// The snapped position lies inside a segment which may be traversed in
/// up to two directions. For each direction the `*_weight` is the cost of
/// the segment portion *before* the snapped point and `*_weight_offset`
/// the cost of the already traversed geometry leading to it; their sum is
/// what a search seeded at this phantom has to subtract (as a source) or
/// add (as a target).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PhantomNode {
    pub forward_segment_id: SegmentId,
    pub reverse_segment_id: SegmentId,

    pub forward_weight: Weight,
    pub reverse_weight: Weight,
    pub forward_weight_offset: Weight,
    pub reverse_weight_offset: Weight,

    pub forward_duration: Duration,
    pub reverse_duration: Duration,
    pub forward_duration_offset: Duration,
    pub reverse_duration_offset: Duration,

    pub forward_distance: Distance,
    pub reverse_distance: Distance,
    pub forward_distance_offset: Distance,
    pub reverse_distance_offset: Distance,

    /// Snapped location on the segment.
    pub location: Point<f64>,
    /// Location as given by the caller.
    pub input_location: Point<f64>,
}

impl PhantomNode {
    /// A phantom located exactly on `node`, usable in the forward
    /// direction only, with no offsets.
    pub fn at_node(node: NodeId, location: Point<f64>) -> Self {
        Self {
            forward_segment_id: SegmentId::new(node, true),
            reverse_segment_id: SegmentId::disabled(),
            location,
            input_location: location,
            ..Self::default()
        }
    }

    /// Enables the reverse direction of the snapped segment on `node`.
    pub fn with_reverse(mut self, node: NodeId) -> Self {
        self.reverse_segment_id = SegmentId::new(node, true);
        self
    }

    pub fn with_forward_offset(
        mut self,
        weight: Weight,
        duration: Duration,
        distance: Distance,
    ) -> Self {
        self.forward_weight = weight;
        self.forward_duration = duration;
        self.forward_distance = distance;
        self
    }

    pub fn with_reverse_offset(
        mut self,
        weight: Weight,
        duration: Duration,
        distance: Distance,
    ) -> Self {
        self.reverse_weight = weight;
        self.reverse_duration = duration;
        self.reverse_distance = distance;
        self
    }

    #[inline]
    pub fn forward_weight_plus_offset(&self) -> Weight {
        self.forward_weight_offset + self.forward_weight
    }

    #[inline]
    pub fn reverse_weight_plus_offset(&self) -> Weight {
        self.reverse_weight_offset + self.reverse_weight
    }

    pub fn is_valid(&self) -> bool {
        self.forward_segment_id.enabled || self.reverse_segment_id.enabled
    }

    #[inline]
    pub fn is_valid_forward_source(&self) -> bool {
        self.forward_segment_id.enabled
    }

    #[inline]
    pub fn is_valid_reverse_source(&self) -> bool {
        self.reverse_segment_id.enabled
    }

    #[inline]
    pub fn is_valid_forward_target(&self) -> bool {
        self.forward_segment_id.enabled
    }

    #[inline]
    pub fn is_valid_reverse_target(&self) -> bool {
        self.reverse_segment_id.enabled
    }

    /// Enabled segments with their key, forward segment first. The weight
    /// includes the offset of the segment; duration and distance only
    /// cover the part of the segment before the snapped point.
    pub fn seeds(&self) -> impl Iterator<Item = PhantomSeed> + '_ {
        let forward = self.forward_segment_id.enabled.then(|| PhantomSeed {
            node: self.forward_segment_id.id,
            weight: self.forward_weight_plus_offset(),
            duration: self.forward_duration,
            distance: self.forward_distance,
        });
        let reverse = self.reverse_segment_id.enabled.then(|| PhantomSeed {
            node: self.reverse_segment_id.id,
            weight: self.reverse_weight_plus_offset(),
            duration: self.reverse_duration,
            distance: self.reverse_distance,
        });

        forward.into_iter().chain(reverse)
    }

    /// Seeds signed for a heap searching in `direction`.
    pub fn signed_seeds(&self, direction: Direction) -> impl Iterator<Item = PhantomSeed> + '_ {
        let sign = direction.sign();
        self.seeds().map(move |seed| PhantomSeed {
            node: seed.node,
            weight: sign * seed.weight,
            duration: sign * seed.duration,
            distance: sign as f64 * seed.distance,
        })
    }
}

/// A heap entry derived from a phantom segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhantomSeed {
    pub node: NodeId,
    pub weight: Weight,
    pub duration: Duration,
    pub distance: Distance,
}

/// A snapped candidate together with its distance (m) to the input location.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PhantomNodeWithDistance {
    pub phantom_node: PhantomNode,
    pub distance: f64,
}

/// Source and target of one route leg.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PhantomEndpoints {
    pub source: PhantomNode,
    pub target: PhantomNode,
}

impl PhantomEndpoints {
    pub fn new(source: PhantomNode, target: PhantomNode) -> Self {
        Self { source, target }
    }
}

/// All snapping candidates for the source and target of a leg. A search
/// seeded from candidates finds the best combination.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PhantomEndpointCandidates {
    pub source_phantoms: Vec<PhantomNode>,
    pub target_phantoms: Vec<PhantomNode>,
}

impl PhantomEndpointCandidates {
    pub fn new(source_phantoms: Vec<PhantomNode>, target_phantoms: Vec<PhantomNode>) -> Self {
        Self {
            source_phantoms,
            target_phantoms,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.source_phantoms.is_empty()
            && !self.target_phantoms.is_empty()
            && self.source_phantoms.iter().all(PhantomNode::is_valid)
            && self.target_phantoms.iter().all(PhantomNode::is_valid)
    }
}

impl From<PhantomEndpoints> for PhantomEndpointCandidates {
    fn from(value: PhantomEndpoints) -> Self {
        Self::new(vec![value.source], vec![value.target])
    }
}

/// The snapped location shared by all candidates of one waypoint. Every
/// candidate of a waypoint has the same input, so the first snapped
/// location stands in for the group.
pub fn candidates_snapped_location(candidates: &[PhantomNode]) -> Option<Point<f64>> {
    candidates.first().map(|phantom| phantom.location)
}

/// True when a search from `source` to `target` on the same forward
/// segment has to leave the segment and come back, because the target
/// lies behind the source.
pub fn needs_loop_forward(source: &PhantomNode, target: &PhantomNode) -> bool {
    source.forward_segment_id.enabled
        && target.forward_segment_id.enabled
        && source.forward_segment_id.id == target.forward_segment_id.id
        && source.forward_weight_plus_offset() > target.forward_weight_plus_offset()
}

/// The reverse-segment counterpart of [`needs_loop_forward`].
pub fn needs_loop_backwards(source: &PhantomNode, target: &PhantomNode) -> bool {
    source.reverse_segment_id.enabled
        && target.reverse_segment_id.enabled
        && source.reverse_segment_id.id == target.reverse_segment_id.id
        && source.reverse_weight_plus_offset() > target.reverse_weight_plus_offset()
}
