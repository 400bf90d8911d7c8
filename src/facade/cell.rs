use either::Either;

use crate::facade::MultiLevelPartition;
use crate::primitives::{CellId, Distance, Duration, LevelId, NodeId, Weight};

#[derive(Debug, Clone, Default, PartialEq)]
struct CellData {
    sources: Vec<NodeId>,
    destinations: Vec<NodeId>,
    offset: usize,
}

/// Boundary nodes of every cell on every level above the base graph.
///
/// A boundary node has an edge leaving its cell. It is a *source* of the
/// cell if the cell's interior can be entered from it and a
/// *destination* if it can be reached from the interior; a boundary node
/// with neither is kept as a destination so that every boundary node
/// belongs to the cell. Shortcut values are stored separately in a
/// [`CellMetric`], row-major as `sources x destinations`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellStorage {
    levels: Vec<Vec<CellData>>,
    metric_size: usize,
}

/// One cell's boundary nodes and shortcuts.
#[derive(Debug, Clone, Copy)]
pub struct Cell<'a> {
    sources: &'a [NodeId],
    destinations: &'a [NodeId],
    weights: &'a [Option<Weight>],
    durations: &'a [Option<Duration>],
    distances: &'a [Option<Distance>],
}

/// Shortcut values for every cell of a [`CellStorage`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellMetric {
    pub weights: Vec<Option<Weight>>,
    pub durations: Vec<Option<Duration>>,
    pub distances: Vec<Option<Distance>>,
}

impl CellMetric {
    /// A metric of `size` entries with every shortcut unreachable.
    pub fn unreachable(size: usize) -> Self {
        Self {
            weights: vec![None; size],
            durations: vec![None; size],
            distances: vec![None; size],
        }
    }
}

impl CellStorage {
    /// Collects the boundary nodes of all cells.
    ///
    /// `edges(node)` yields `(target, forward, backward)` for every edge
    /// stored at `node`.
    pub fn new<E, I>(partition: &MultiLevelPartition, number_of_nodes: usize, edges: E) -> Self
    where
        E: Fn(NodeId) -> I,
        I: IntoIterator<Item = (NodeId, bool, bool)>,
    {
        let mut levels = Vec::new();
        let mut metric_size = 0;

        for level in 1..partition.number_of_levels() {
            let mut cells = vec![CellData::default(); partition.number_of_cells(level) as usize];

            for node in 0..number_of_nodes as NodeId {
                let cell = partition.cell(level, node);

                let mut boundary = false;
                let mut enters = false;
                let mut exits = false;
                for (target, forward, backward) in edges(node) {
                    if partition.cell(level, target) != cell {
                        boundary = true;
                    } else if target != node {
                        enters |= forward;
                        exits |= backward;
                    }
                }

                if !boundary {
                    continue;
                }

                let data = &mut cells[cell as usize];
                if enters {
                    data.sources.push(node);
                }
                if exits || !enters {
                    data.destinations.push(node);
                }
            }

            for data in cells.iter_mut() {
                data.offset = metric_size;
                metric_size += data.sources.len() * data.destinations.len();
            }

            levels.push(cells);
        }

        Self {
            levels,
            metric_size,
        }
    }

    /// Number of entries a [`CellMetric`] for this storage holds.
    pub fn metric_size(&self) -> usize {
        self.metric_size
    }

    pub fn cell<'a>(&'a self, metric: &'a CellMetric, level: LevelId, cell: CellId) -> Option<Cell<'a>> {
        let data = self
            .levels
            .get((level as usize).checked_sub(1)?)?
            .get(cell as usize)?;

        let range = data.offset..data.offset + data.sources.len() * data.destinations.len();
        Some(Cell {
            sources: &data.sources,
            destinations: &data.destinations,
            weights: metric.weights.get(range.clone())?,
            durations: metric.durations.get(range.clone())?,
            distances: metric.distances.get(range)?,
        })
    }

    /// Every cell as `(level, cell, sources, destinations, metric offset)`.
    pub fn cells(&self) -> impl Iterator<Item = (LevelId, CellId, &[NodeId], &[NodeId], usize)> + '_ {
        self.levels.iter().enumerate().flat_map(|(index, cells)| {
            cells.iter().enumerate().map(move |(cell, data)| {
                (
                    index as LevelId + 1,
                    cell as CellId,
                    data.sources.as_slice(),
                    data.destinations.as_slice(),
                    data.offset,
                )
            })
        })
    }
}

impl<'a> Cell<'a> {
    pub fn source_nodes(&self) -> &'a [NodeId] {
        self.sources
    }

    pub fn destination_nodes(&self) -> &'a [NodeId] {
        self.destinations
    }

    fn row<T>(&self, values: &'a [T], node: NodeId) -> &'a [T] {
        let width = self.destinations.len();
        match self.sources.binary_search(&node) {
            Ok(index) => &values[index * width..(index + 1) * width],
            Err(_) => &[],
        }
    }

    fn column<T: Copy>(&self, values: &'a [T], node: NodeId) -> impl Iterator<Item = T> + 'a {
        let width = self.destinations.len();
        match self.destinations.binary_search(&node) {
            Ok(index) => Either::Left(values[index..].iter().step_by(width).copied()),
            Err(_) => Either::Right(std::iter::empty()),
        }
    }

    /// Shortcut weights from `node` to each destination node, empty if
    /// `node` is not a source of this cell.
    pub fn out_weights(&self, node: NodeId) -> &'a [Option<Weight>] {
        self.row(self.weights, node)
    }

    pub fn out_durations(&self, node: NodeId) -> &'a [Option<Duration>] {
        self.row(self.durations, node)
    }

    pub fn out_distances(&self, node: NodeId) -> &'a [Option<Distance>] {
        self.row(self.distances, node)
    }

    /// Shortcut weights from each source node to `node`, empty if `node`
    /// is not a destination of this cell.
    pub fn in_weights(&self, node: NodeId) -> impl Iterator<Item = Option<Weight>> + 'a {
        self.column(self.weights, node)
    }

    pub fn in_durations(&self, node: NodeId) -> impl Iterator<Item = Option<Duration>> + 'a {
        self.column(self.durations, node)
    }

    pub fn in_distances(&self, node: NodeId) -> impl Iterator<Item = Option<Distance>> + 'a {
        self.column(self.distances, node)
    }
}
