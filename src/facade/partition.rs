use itertools::Itertools;

use crate::facade::FacadeError;
use crate::primitives::{CellId, LevelId, NodeId, INVALID_LEVEL_ID};

/// Nested cell assignment of every node.
///
/// Level 0 is the graph itself, every node being its own cell. Levels
/// `1..number_of_levels()` are stored explicitly, each coarser than the
/// one below: two nodes sharing a cell on level `l` share a cell on every
/// level above `l`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiLevelPartition {
    cells: Vec<Vec<CellId>>,
    cell_counts: Vec<u32>,
    number_of_nodes: usize,
}

impl MultiLevelPartition {
    /// Builds a partition from `cells[level - 1][node]`.
    pub fn new(number_of_nodes: usize, cells: Vec<Vec<CellId>>) -> Result<Self, FacadeError> {
        if cells.len() + 1 >= INVALID_LEVEL_ID as usize {
            return Err(FacadeError::TooManyLevels(cells.len()));
        }

        for (index, level) in cells.iter().enumerate() {
            if level.len() != number_of_nodes {
                return Err(FacadeError::PartitionSizeMismatch {
                    level: index as LevelId + 1,
                    len: level.len(),
                    nodes: number_of_nodes,
                });
            }
        }

        for (index, (lower, upper)) in cells.iter().tuple_windows().enumerate() {
            let mut parents = rustc_hash::FxHashMap::default();
            for (cell, parent) in lower.iter().zip(upper.iter()) {
                if *parents.entry(*cell).or_insert(*parent) != *parent {
                    return Err(FacadeError::PartitionNotNested {
                        level: index as LevelId + 1,
                        cell: *cell,
                        parent_level: index as LevelId + 2,
                    });
                }
            }
        }

        let cell_counts = cells
            .iter()
            .map(|level| level.iter().max().map_or(0, |max| max + 1))
            .collect();

        Ok(Self {
            cells,
            cell_counts,
            number_of_nodes,
        })
    }

    /// Number of levels including the base level 0.
    pub fn number_of_levels(&self) -> LevelId {
        self.cells.len() as LevelId + 1
    }

    /// Cell of `node` on `level`. Everything above the top level is a
    /// single cell.
    #[inline]
    pub fn cell(&self, level: LevelId, node: NodeId) -> CellId {
        match level {
            0 => node,
            level => self
                .cells
                .get(level as usize - 1)
                .and_then(|cells| cells.get(node as usize))
                .copied()
                .unwrap_or(0),
        }
    }

    pub fn number_of_cells(&self, level: LevelId) -> u32 {
        match level {
            0 => self.number_of_nodes as u32,
            level => self
                .cell_counts
                .get(level as usize - 1)
                .copied()
                .unwrap_or(1),
        }
    }

    /// The highest level on which `first` and `second` lie in different
    /// cells, `0` when they share a cell on every level.
    #[inline]
    pub fn highest_different_level(&self, first: NodeId, second: NodeId) -> LevelId {
        (1..self.number_of_levels())
            .rev()
            .find(|level| self.cell(*level, first) != self.cell(*level, second))
            .unwrap_or(0)
    }

    /// Level on which a search between `source` and `target` may settle
    /// `node`.
    #[inline]
    pub fn query_level(&self, source: NodeId, target: NodeId, node: NodeId) -> LevelId {
        self.highest_different_level(source, node)
            .min(self.highest_different_level(target, node))
    }
}
