use std::ops::Range;

use geo::Point;
use log::debug;

use crate::facade::{BaseFacade, ChFacade, EdgeData, EdgeFacade, FacadeError};
use crate::primitives::{Distance, Duration, EdgeId, NodeId, Weight};

/// Edge of a contraction hierarchy.
///
/// For a shortcut `turn_id` is the contracted middle node the shortcut
/// bypasses; for an original edge it identifies the turn it represents.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChEdgeData {
    pub turn_id: NodeId,
    pub shortcut: bool,
    pub weight: Weight,
    pub duration: Duration,
    pub distance: Distance,
    pub forward: bool,
    pub backward: bool,
}

impl EdgeData for ChEdgeData {
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

/// A contraction hierarchy held in memory as a compressed adjacency
/// array.
#[derive(Debug, Clone, Default)]
pub struct ContractedGraph {
    first_edge: Vec<EdgeId>,
    targets: Vec<NodeId>,
    edges: Vec<ChEdgeData>,
    coordinates: Vec<Point<f64>>,
    nodes: Vec<NodeData>,
    core: Vec<bool>,
    has_core: bool,
    timestamp: u64,
    exclude_index: u8,
    continue_straight_default: bool,
}

/// Collects edges for a [`ContractedGraph`].
///
/// Edges are stored at the node they are added to; a hierarchy stores each
/// edge at its lower ranked endpoint only. [`Self::road`] and
/// [`Self::arc`] store an edge at both endpoints, which is how an
/// uncontracted graph is expressed.
#[derive(Debug, Clone)]
pub struct ContractedGraphBuilder {
    number_of_nodes: usize,
    edges: Vec<(NodeId, NodeId, ChEdgeData)>,
    coordinates: Vec<Point<f64>>,
    node_data: Vec<Option<NodeData>>,
    core: Vec<bool>,
    timestamp: u64,
    exclude_index: u8,
    continue_straight_default: bool,
}

impl ContractedGraphBuilder {
    pub fn new(number_of_nodes: usize) -> Self {
        Self {
            number_of_nodes,
            edges: Vec::new(),
            coordinates: vec![Point::new(0.0, 0.0); number_of_nodes],
            node_data: vec![None; number_of_nodes],
            core: vec![false; number_of_nodes],
            timestamp: 0,
            exclude_index: 0,
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

    /// Overrides the node metrics, which otherwise default to the
    /// cheapest forward edge leaving the node.
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

    /// Stores `data` at `from` with target `to`.
    pub fn edge(mut self, from: NodeId, to: NodeId, data: ChEdgeData) -> Result<Self, FacadeError> {
        self.check(from)?;
        self.check(to)?;
        if data.weight < 0 {
            return Err(FacadeError::NegativeWeight { from, to });
        }
        self.edges.push((from, to, data));
        Ok(self)
    }

    /// A road traversable in both directions with the same metrics.
    pub fn road(
        self,
        from: NodeId,
        to: NodeId,
        weight: Weight,
        duration: Duration,
        distance: Distance,
    ) -> Result<Self, FacadeError> {
        let data = ChEdgeData {
            turn_id: from,
            shortcut: false,
            weight,
            duration,
            distance,
            forward: true,
            backward: true,
        };

        self.edge(from, to, data)?.edge(to, from, ChEdgeData { turn_id: to, ..data })
    }

    /// A one-way road `from -> to`.
    pub fn arc(
        self,
        from: NodeId,
        to: NodeId,
        weight: Weight,
        duration: Duration,
        distance: Distance,
    ) -> Result<Self, FacadeError> {
        let data = ChEdgeData {
            turn_id: from,
            shortcut: false,
            weight,
            duration,
            distance,
            forward: true,
            backward: false,
        };

        self.edge(from, to, data)?.edge(
            to,
            from,
            ChEdgeData {
                forward: false,
                backward: true,
                ..data
            },
        )
    }

    /// Leaves `node` uncontracted.
    pub fn core(mut self, node: NodeId) -> Result<Self, FacadeError> {
        self.check(node)?;
        self.core[node as usize] = true;
        Ok(self)
    }

    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn exclude_index(mut self, exclude_index: u8) -> Self {
        self.exclude_index = exclude_index;
        self
    }

    pub fn continue_straight_default(mut self, value: bool) -> Self {
        self.continue_straight_default = value;
        self
    }

    pub fn build(mut self) -> ContractedGraph {
        self.edges.sort_by_key(|(from, to, _)| (*from, *to));

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
                        .filter(|(_, _, data)| data.forward && !data.shortcut)
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

        let has_core = self.core.iter().any(|core| *core);
        debug!(
            "Built contracted graph with {} nodes and {} edges (core: {has_core})",
            self.number_of_nodes,
            self.edges.len()
        );

        let (targets, edges) = self
            .edges
            .into_iter()
            .map(|(_, to, data)| (to, data))
            .unzip();

        ContractedGraph {
            first_edge,
            targets,
            edges,
            coordinates: self.coordinates,
            nodes,
            core: self.core,
            has_core,
            timestamp: self.timestamp,
            exclude_index: self.exclude_index,
            continue_straight_default: self.continue_straight_default,
        }
    }
}

impl ContractedGraph {
    pub fn builder(number_of_nodes: usize) -> ContractedGraphBuilder {
        ContractedGraphBuilder::new(number_of_nodes)
    }

    pub fn number_of_edges(&self) -> usize {
        self.edges.len()
    }
}

impl BaseFacade for ContractedGraph {
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

    fn exclude_index(&self) -> u8 {
        self.exclude_index
    }

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn continue_straight_default(&self) -> bool {
        self.continue_straight_default
    }
}

impl EdgeFacade for ContractedGraph {
    type Edge = ChEdgeData;

    #[inline]
    fn adjacent_edges(&self, node: NodeId) -> Range<EdgeId> {
        self.first_edge[node as usize]..self.first_edge[node as usize + 1]
    }

    #[inline]
    fn target(&self, edge: EdgeId) -> NodeId {
        self.targets[edge as usize]
    }

    #[inline]
    fn edge_data(&self, edge: EdgeId) -> &ChEdgeData {
        &self.edges[edge as usize]
    }
}

impl ChFacade for ContractedGraph {
    fn is_core_node(&self, node: NodeId) -> bool {
        self.core[node as usize]
    }

    fn has_core(&self) -> bool {
        self.has_core
    }
}
