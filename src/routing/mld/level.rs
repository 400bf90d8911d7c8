//! The partition level a multi-level search runs on at a given node.
//!
//! Close to its endpoints a search has to use the base graph; further
//! away it may jump across whole cells. The level at a node is the
//! highest level on which the node lies in a different cell than every
//! endpoint, so the search never skips over a cell holding an endpoint.

use crate::facade::MultiLevelPartition;
use crate::primitives::{
    CellId, LevelId, NodeId, PhantomEndpointCandidates, PhantomEndpoints, PhantomNode,
};

/// Chooses the level on which a node is settled and restricts which
/// nodes a search may enter.
pub trait QueryLevel {
    /// Level to settle `node` on, `None` when no endpoint segment is
    /// enabled.
    fn level(&self, partition: &MultiLevelPartition, node: NodeId) -> Option<LevelId>;

    /// Whether a node lying in `cell` one level above its query level
    /// may be entered.
    #[inline]
    fn allows(&self, _cell: CellId) -> bool {
        true
    }
}

/// Enabled segment ids of a phantom.
fn segments(phantom: &PhantomNode) -> impl Iterator<Item = NodeId> + '_ {
    [phantom.forward_segment_id, phantom.reverse_segment_id]
        .into_iter()
        .filter(|segment| segment.enabled)
        .map(|segment| segment.id)
}

fn pair_level(
    partition: &MultiLevelPartition,
    source: &PhantomNode,
    target: &PhantomNode,
    node: NodeId,
) -> Option<LevelId> {
    segments(source)
        .flat_map(|from| segments(target).map(move |to| (from, to)))
        .map(|(from, to)| partition.query_level(from, to, node))
        .min()
}

/// Level against a single group of endpoints, as used by the one-sided
/// searches of the matrices.
fn single_level(
    partition: &MultiLevelPartition,
    phantoms: &[PhantomNode],
    node: NodeId,
) -> Option<LevelId> {
    phantoms
        .iter()
        .flat_map(segments)
        .map(|segment| partition.highest_different_level(segment, node))
        .min()
}

impl QueryLevel for PhantomEndpoints {
    fn level(&self, partition: &MultiLevelPartition, node: NodeId) -> Option<LevelId> {
        pair_level(partition, &self.source, &self.target, node)
    }
}

impl QueryLevel for PhantomEndpointCandidates {
    fn level(&self, partition: &MultiLevelPartition, node: NodeId) -> Option<LevelId> {
        self.source_phantoms
            .iter()
            .flat_map(|source| {
                self.target_phantoms
                    .iter()
                    .filter_map(move |target| pair_level(partition, source, target, node))
            })
            .min()
    }
}

impl QueryLevel for [PhantomNode] {
    fn level(&self, partition: &MultiLevelPartition, node: NodeId) -> Option<LevelId> {
        single_level(partition, self, node)
    }
}

impl QueryLevel for PhantomNode {
    fn level(&self, partition: &MultiLevelPartition, node: NodeId) -> Option<LevelId> {
        single_level(partition, std::slice::from_ref(self), node)
    }
}

/// The phantom at `index` together with the phantoms at `indices`, used
/// when one search serves a whole row or column of a matrix.
#[derive(Debug, Clone, Copy)]
pub struct PhantomGroup<'a> {
    pub phantoms: &'a [PhantomNode],
    pub index: usize,
    pub indices: &'a [usize],
}

impl QueryLevel for PhantomGroup<'_> {
    fn level(&self, partition: &MultiLevelPartition, node: NodeId) -> Option<LevelId> {
        std::iter::once(self.index)
            .chain(self.indices.iter().copied())
            .filter_map(|index| self.phantoms.get(index))
            .filter_map(|phantom| phantom.level(partition, node))
            .min()
    }
}

/// A search confined to one cell while unpacking a cell shortcut.
///
/// Every node is settled on `level`, and only nodes inside
/// `parent_cell` (one level up) are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRestriction {
    pub level: LevelId,
    pub parent_cell: CellId,
}

impl QueryLevel for CellRestriction {
    #[inline]
    fn level(&self, _: &MultiLevelPartition, _: NodeId) -> Option<LevelId> {
        Some(self.level)
    }

    #[inline]
    fn allows(&self, cell: CellId) -> bool {
        cell == self.parent_cell
    }
}

/// Levels of a single phantom, with nodes on `maximal_level` or above
/// left unexpanded. Bucket searches stop below the top level so that the
/// probing search settles the meeting.
#[derive(Debug, Clone, Copy)]
pub struct CappedLevel<'a> {
    pub phantom: &'a PhantomNode,
    pub maximal_level: LevelId,
}

impl QueryLevel for CappedLevel<'_> {
    fn level(&self, partition: &MultiLevelPartition, node: NodeId) -> Option<LevelId> {
        self.phantom
            .level(partition, node)
            .filter(|level| *level < self.maximal_level)
    }
}
