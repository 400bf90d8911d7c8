use std::ops::Range;

use geo::Point;
use log::debug;
use measure_time::debug_time;
use pathfinding::prelude::{build_path, dijkstra_all};

use crate::facade::{
    BaseFacade, CellMetric, CellStorage, EdgeData, EdgeFacade, FacadeError, MldFacade,
    MultiLevelPartition,
};
use crate::primitives::{CellId, Distance, Duration, EdgeId, LevelId, NodeId, Weight};

/// Edge of the base graph underneath a multi-level partition.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MldEdgeData {
    pub turn_id: NodeId,
    pub weight: Weight,
    pub duration: Duration,
    pub distance: Distance,
    pub forward: bool,
    pub backward: bool,
}

impl EdgeData for MldEdgeData {
    #[inline]
    fn weight(&self) -> Weight {
        self.weight
    }

    #[inline]
    fn duration(&self) -> Duration {
        self.duration
    }

    #[inline]
    fn distance(&self) -> Distance {
        self.distance
    }

    #[inline]
    fn forward(&self) -> bool {
        self.forward
    }

    #[inline]
    fn backward(&self) -> bool {
        self.backward
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct NodeData {
    weight: Weight,
    duration: Duration,
    distance: Distance,
}

/// A partitioned graph with customized cell shortcuts, held in memory.
///
/// The edges of every node are ordered by the highest level on which
/// their endpoints lie in different cells, so the border edges of a
/// level form a suffix of the node's adjacency range.
#[derive(Debug, Clone, Default)]
pub struct MultiLevelGraph {
    first_edge: Vec<EdgeId>,
    targets: Vec<NodeId>,
    levels: Vec<LevelId>,
    edges: Vec<MldEdgeData>,
    coordinates: Vec<Point<f64>>,
    nodes: Vec<NodeData>,
    excluded: Vec<bool>,
    partition: MultiLevelPartition,
    cells: CellStorage,
    metric: CellMetric,
    max_border_node_id: NodeId,
    timestamp: u64,
    continue_straight_default: bool,
}

#[derive(Debug, Clone)]
pub struct MultiLevelGraphBuilder {
    number_of_nodes: usize,
    edges: Vec<(NodeId, NodeId, MldEdgeData)>,
    coordinates: Vec<Point<f64>>,
    node_data: Vec<Option<NodeData>>,
    excluded: Vec<bool>,
    cells: Vec<Vec<CellId>>,
    timestamp: u64,
    continue_straight_default: bool,
}

impl MultiLevelGraphBuilder {
    pub fn new(number_of_nodes: usize) -> Self {
        Self {
            number_of_nodes,
            edges: Vec::new(),
            coordinates: vec![Point::new(0.0, 0.0); number_of_nodes],
            node_data: vec![None; number_of_nodes],
            excluded: vec![false; number_of_nodes],
            cells: Vec::new(),
            timestamp: 0,
            continue_straight_default: true,
        }
    }

    fn check(&self, node: NodeId) -> Result<(), FacadeError> {
        if (node as usize) < self.number_of_nodes {
            Ok(())
        } else {
            Err(FacadeError::NodeOutOfRange {
                node,
                nodes: self.number_of_nodes,
            })
        }
    }

    pub fn coordinate(mut self, node: NodeId, point: Point<f64>) -> Result<Self, FacadeError> {
        self.check(node)?;
        self.coordinates[node as usize] = point;
        Ok(self)
    }

    pub fn node(
        mut self,
        node: NodeId,
        weight: Weight,
        duration: Duration,
        distance: Distance,
    ) -> Result<Self, FacadeError> {
        self.check(node)?;
        self.node_data[node as usize] = Some(NodeData {
            weight,
            duration,
            distance,
        });
        Ok(self)
    }

    /// Removes `node` from routing.
    pub fn exclude(mut self, node: NodeId) -> Result<Self, FacadeError> {
        self.check(node)?;
        self.excluded[node as usize] = true;
        Ok(self)
    }

    fn edge(mut self, from: NodeId, to: NodeId, data: MldEdgeData) -> Result<Self, FacadeError> {
        self.check(from)?;
        self.check(to)?;
        if data.weight < 0 {
            return Err(FacadeError::NegativeWeight { from, to });
        }
        self.edges.push((from, to, data));
        Ok(self)
    }

    pub fn road(
        self,
        from: NodeId,
        to: NodeId,
        weight: Weight,
        duration: Duration,
        distance: Distance,
    ) -> Result<Self, FacadeError> {
        let data = MldEdgeData {
            turn_id: from,
            weight,
            duration,
            distance,
            forward: true,
            backward: true,
        };

        self.edge(from, to, data)?
            .edge(to, from, MldEdgeData { turn_id: to, ..data })
    }

    pub fn arc(
        self,
        from: NodeId,
        to: NodeId,
        weight: Weight,
        duration: Duration,
        distance: Distance,
    ) -> Result<Self, FacadeError> {
        let data = MldEdgeData {
            turn_id: from,
            weight,
            duration,
            distance,
            forward: true,
            backward: false,
        };

        self.edge(from, to, data)?.edge(
            to,
            from,
            MldEdgeData {
                forward: false,
                backward: true,
                ..data
            },
        )
    }

    /// Cell assignment per level, finest first: `cells[level - 1][node]`.
    pub fn partition(mut self, cells: Vec<Vec<CellId>>) -> Self {
        self.cells = cells;
        self
    }

    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn continue_straight_default(mut self, value: bool) -> Self {
        self.continue_straight_default = value;
        self
    }

    /// Validates the partition, lays out the edges and customizes every
    /// cell.
    pub fn build(mut self) -> Result<MultiLevelGraph, FacadeError> {
        let cells = std::mem::take(&mut self.cells);
        let partition = MultiLevelPartition::new(self.number_of_nodes, cells)?;

        self.edges.sort_by_key(|(from, to, _)| {
            (*from, partition.highest_different_level(*from, *to), *to)
        });

        let mut first_edge = vec![0 as EdgeId; self.number_of_nodes + 1];
        for (from, _, _) in &self.edges {
            first_edge[*from as usize + 1] += 1;
        }
        for node in 0..self.number_of_nodes {
            first_edge[node + 1] += first_edge[node];
        }

        let nodes = (0..self.number_of_nodes)
            .map(|node| {
                self.node_data[node].unwrap_or_else(|| {
                    let range = first_edge[node] as usize..first_edge[node + 1] as usize;
                    self.edges[range]
                        .iter()
                        .filter(|(_, _, data)| data.forward)
                        .min_by_key(|(_, _, data)| data.weight)
                        .map(|(_, _, data)| NodeData {
                            weight: data.weight,
                            duration: data.duration,
                            distance: data.distance,
                        })
                        .unwrap_or_default()
                })
            })
            .collect();

        let levels = self
            .edges
            .iter()
            .map(|(from, to, _)| partition.highest_different_level(*from, *to))
            .collect();
        let (targets, edges) = self
            .edges
            .into_iter()
            .map(|(_, to, data)| (to, data))
            .unzip();

        let mut graph = MultiLevelGraph {
            first_edge,
            targets,
            levels,
            edges,
            coordinates: self.coordinates,
            nodes,
            excluded: self.excluded,
            partition,
            cells: CellStorage::default(),
            metric: CellMetric::default(),
            max_border_node_id: 0,
            timestamp: self.timestamp,
            continue_straight_default: self.continue_straight_default,
        };

        let view = &graph;
        let cells = CellStorage::new(&view.partition, view.number_of_nodes(), |node| {
            view.adjacent_edges(node).map(move |edge| {
                let data = view.edge_data(edge);
                (view.target(edge), data.forward, data.backward)
            })
        });
        graph.cells = cells;
        graph.max_border_node_id = graph
            .cells
            .cells()
            .filter(|(level, ..)| *level == 1)
            .flat_map(|(_, _, sources, destinations, _)| sources.iter().chain(destinations))
            .copied()
            .max()
            .unwrap_or(0);
        graph.metric = graph.customize();

        debug!(
            "Built multi-level graph with {} nodes, {} edges and {} levels",
            graph.number_of_nodes(),
            graph.edges.len(),
            graph.partition.number_of_levels()
        );

        Ok(graph)
    }
}

impl MultiLevelGraph {
    pub fn builder(number_of_nodes: usize) -> MultiLevelGraphBuilder {
        MultiLevelGraphBuilder::new(number_of_nodes)
    }

    /// Computes the shortcut metric of every cell by searching the base
    /// graph restricted to the cell.
    fn customize(&self) -> CellMetric {
        debug_time!("Customized cell metric");

        let mut metric = CellMetric::unreachable(self.cells.metric_size());

        for (level, cell, sources, destinations, offset) in self.cells.cells() {
            let inside = |node: NodeId| self.partition.cell(level, node) == cell;

            for (row, source) in sources.iter().enumerate() {
                let mut parents = dijkstra_all(source, |node: &NodeId| {
                    self.adjacent_edges(*node)
                        .filter(|edge| {
                            self.edge_data(*edge).forward && !self.exclude_node(self.target(*edge))
                        })
                        .map(|edge| (self.target(edge), self.edge_data(edge).weight))
                        .filter(|(target, _)| inside(*target))
                        .collect::<Vec<_>>()
                });
                parents.remove(source);

                for (column, destination) in destinations.iter().enumerate() {
                    let index = offset + row * destinations.len() + column;

                    if destination == source {
                        metric.weights[index] = Some(0);
                        metric.durations[index] = Some(0);
                        metric.distances[index] = Some(0.0);
                        continue;
                    }

                    let Some((_, weight)) = parents.get(destination) else {
                        continue;
                    };

                    let path = build_path(destination, &parents);
                    let (duration, distance) = path
                        .windows(2)
                        .filter_map(|pair| {
                            self.find_smallest_edge(pair[0], pair[1], |data| data.forward)
                        })
                        .map(|edge| self.edge_data(edge))
                        .fold((0, 0.0), |(duration, distance), data| {
                            (duration + data.duration, distance + data.distance)
                        });

                    metric.weights[index] = Some(*weight);
                    metric.durations[index] = Some(duration);
                    metric.distances[index] = Some(distance);
                }
            }
        }

        metric
    }

    pub fn number_of_edges(&self) -> usize {
        self.edges.len()
    }
}

impl BaseFacade for MultiLevelGraph {
    fn number_of_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn coordinate(&self, node: NodeId) -> Point<f64> {
        self.coordinates[node as usize]
    }

    fn node_weight(&self, node: NodeId) -> Weight {
        self.nodes[node as usize].weight
    }

    fn node_duration(&self, node: NodeId) -> Duration {
        self.nodes[node as usize].duration
    }

    fn node_distance(&self, node: NodeId) -> Distance {
        self.nodes[node as usize].distance
    }

    fn exclude_node(&self, node: NodeId) -> bool {
        self.excluded[node as usize]
    }

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn continue_straight_default(&self) -> bool {
        self.continue_straight_default
    }
}

impl EdgeFacade for MultiLevelGraph {
    type Edge = MldEdgeData;

    #[inline]
    fn adjacent_edges(&self, node: NodeId) -> Range<EdgeId> {
        self.first_edge[node as usize]..self.first_edge[node as usize + 1]
    }

    #[inline]
    fn target(&self, edge: EdgeId) -> NodeId {
        self.targets[edge as usize]
    }

    #[inline]
    fn edge_data(&self, edge: EdgeId) -> &MldEdgeData {
        &self.edges[edge as usize]
    }

    /// Smallest forward edge `from -> to`.
    fn find_edge(&self, from: NodeId, to: NodeId) -> Option<EdgeId> {
        self.find_smallest_edge(from, to, |data| data.forward)
    }
}

impl MldFacade for MultiLevelGraph {
    fn partition(&self) -> &MultiLevelPartition {
        &self.partition
    }

    fn cell_storage(&self) -> &CellStorage {
        &self.cells
    }

    fn cell_metric(&self) -> &CellMetric {
        &self.metric
    }

    fn border_edges(&self, level: LevelId, node: NodeId) -> Range<EdgeId> {
        let range = self.adjacent_edges(node);
        let levels = &self.levels[range.start as usize..range.end as usize];
        let skip = levels.partition_point(|edge_level| *edge_level < level);
        range.start + skip as EdgeId..range.end
    }

    fn max_border_node_id(&self) -> NodeId {
        self.max_border_node_id
    }
}
