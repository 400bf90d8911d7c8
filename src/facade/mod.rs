//! Read-only graph access consumed by the searches.
//!
//! The routing code never owns a graph. It is generic over the facade
//! traits below, which are implemented by the in-memory graphs of this
//! module and by any external storage layer.

use std::ops::Range;

use geo::Point;
use thiserror::Error;

use crate::primitives::{Distance, Duration, EdgeId, LevelId, NodeId, Weight};

#[doc(hidden)]
pub mod cell;
#[doc(hidden)]
pub mod ch;
#[doc(hidden)]
pub mod mld;
#[doc(hidden)]
pub mod partition;

#[doc(inline)]
pub use cell::{Cell, CellMetric, CellStorage};
#[doc(inline)]
pub use ch::{ChEdgeData, ContractedGraph, ContractedGraphBuilder};
#[doc(inline)]
pub use mld::{MldEdgeData, MultiLevelGraph, MultiLevelGraphBuilder};
#[doc(inline)]
pub use partition::MultiLevelPartition;


#[derive(Error, Debug, Clone, PartialEq)]
pub enum FacadeError {
    #[error("node {node} is out of range for a graph of {nodes} nodes")]
    NodeOutOfRange { node: NodeId, nodes: usize },

    #[error("partition level {level} covers {len} nodes, expected {nodes}")]
    PartitionSizeMismatch {
        level: LevelId,
        len: usize,
        nodes: usize,
    },

    #[error("cell {cell} of level {level} is split across cells of level {parent_level}")]
    PartitionNotNested {
        level: LevelId,
        cell: u32,
        parent_level: LevelId,
    },

    #[error("too many partition levels: {0}")]
    TooManyLevels(usize),

    #[error("edge {from} -> {to} has a negative weight")]
    NegativeWeight { from: NodeId, to: NodeId },
}

/// Metrics and direction flags of a stored edge.
///
/// An edge stored at node `u` with target `v` is traversable `u -> v`
/// when `forward` is set and `v -> u` when `backward` is set.
pub trait EdgeData {
    fn weight(&self) -> Weight;
    fn duration(&self) -> Duration;
    fn distance(&self) -> Distance;
    fn forward(&self) -> bool;
    fn backward(&self) -> bool;
}

/// Node level accessors shared by every backend.
pub trait BaseFacade {
    fn number_of_nodes(&self) -> usize;

    fn coordinate(&self, node: NodeId) -> Point<f64>;

    fn node_weight(&self, node: NodeId) -> Weight;
    fn node_duration(&self, node: NodeId) -> Duration;
    fn node_distance(&self, node: NodeId) -> Distance;

    /// Nodes excluded from routing by the active exclude class.
    fn exclude_node(&self, _node: NodeId) -> bool {
        false
    }

    fn exclude_index(&self) -> u8 {
        0
    }

    /// Identifies the loaded dataset. Caches keyed by graph data must be
    /// dropped when it changes.
    fn timestamp(&self) -> u64 {
        0
    }

    fn weight_multiplier(&self) -> f64 {
        1.0
    }

    fn continue_straight_default(&self) -> bool {
        true
    }
}

/// Adjacency list access.
pub trait EdgeFacade: BaseFacade {
    type Edge: EdgeData;

    fn adjacent_edges(&self, node: NodeId) -> Range<EdgeId>;

    fn out_degree(&self, node: NodeId) -> usize {
        self.adjacent_edges(node).len()
    }

    fn target(&self, edge: EdgeId) -> NodeId;

    fn edge_data(&self, edge: EdgeId) -> &Self::Edge;

    /// The edge stored at `from` towards `to` with the smallest weight
    /// amongst those accepted by `filter`.
    fn find_smallest_edge<P>(&self, from: NodeId, to: NodeId, filter: P) -> Option<EdgeId>
    where
        P: Fn(&Self::Edge) -> bool,
    {
        self.adjacent_edges(from)
            .filter(|edge| self.target(*edge) == to)
            .filter(|edge| filter(self.edge_data(*edge)))
            .min_by_key(|edge| self.edge_data(*edge).weight())
    }

    /// First edge stored at `from` towards `to`.
    fn find_edge(&self, from: NodeId, to: NodeId) -> Option<EdgeId> {
        self.adjacent_edges(from)
            .find(|edge| self.target(*edge) == to)
    }

    fn find_edge_in_either_direction(&self, from: NodeId, to: NodeId) -> Option<EdgeId> {
        self.find_edge(from, to)
            .or_else(|| self.find_edge(to, from))
    }
}

/// A contraction hierarchy, optionally with an uncontracted core.
pub trait ChFacade: EdgeFacade<Edge = ChEdgeData> {
    fn is_core_node(&self, _node: NodeId) -> bool {
        false
    }

    /// Whether any node was left uncontracted.
    fn has_core(&self) -> bool {
        false
    }
}

/// A multi-level partitioned graph with cell shortcuts.
pub trait MldFacade: EdgeFacade<Edge = MldEdgeData> {
    fn partition(&self) -> &MultiLevelPartition;
    fn cell_storage(&self) -> &CellStorage;
    fn cell_metric(&self) -> &CellMetric;

    /// Edges of `node` which leave its cell on `level`. Level 0 yields
    /// every edge of the node.
    fn border_edges(&self, level: LevelId, node: NodeId) -> Range<EdgeId>;

    fn max_border_node_id(&self) -> NodeId;
}
