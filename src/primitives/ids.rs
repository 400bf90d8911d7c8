//! Identifier and metric types shared by every search.
//!
//! The sentinel constants only exist for the boundary with serialized
//! graph data and result tables. Inside the searches absence is an
//! `Option`.

/// Node of the routing graph (an edge-based node for turn-aware graphs).
pub type NodeId = u32;
pub type EdgeId = u32;

/// Integer-scaled optimisation metric.
pub type Weight = i32;
/// Travel time in deciseconds, tracked alongside the weight.
pub type Duration = i32;
/// Metres, tracked alongside the weight.
pub type Distance = f64;

pub type LevelId = u8;
pub type CellId = u32;

pub const SPECIAL_NODEID: NodeId = NodeId::MAX;
pub const SPECIAL_EDGEID: EdgeId = EdgeId::MAX;

pub const INVALID_EDGE_WEIGHT: Weight = Weight::MAX;
pub const MAXIMAL_EDGE_DURATION: Duration = Duration::MAX;
pub const INVALID_EDGE_DISTANCE: Distance = Distance::MAX;

pub const INVALID_LEVEL_ID: LevelId = LevelId::MAX;

/// Search direction. Forward searches leave the source, reverse
/// searches arrive at the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    #[inline]
    pub const fn opposite(self) -> Direction {
        match self {
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
        }
    }

    /// `-1` for the forward direction, `+1` for the reverse one. Phantom
    /// offsets enter a forward heap negated.
    #[inline]
    pub const fn sign(self) -> i32 {
        match self {
            Direction::Forward => -1,
            Direction::Reverse => 1,
        }
    }
}
