//! Synthetic graphs shared by the unit tests.

use geo::{point, Point};

use crate::facade::{
    BaseFacade, ChEdgeData, ContractedGraph, ContractedGraphBuilder, FacadeError, MultiLevelGraph,
    MultiLevelGraphBuilder,
};
use crate::primitives::{NodeId, PhantomNode, Weight};

/// Spacing of fixture nodes in degrees, roughly 111 m at the equator.
pub const SPACING: f64 = 0.001;

pub fn location(x: usize, y: usize) -> Point<f64> {
    point! { x: x as f64 * SPACING, y: y as f64 * SPACING }
}

/// A phantom sitting exactly on `node`, forward segment only.
pub fn phantom<F: BaseFacade>(facade: &F, node: NodeId) -> PhantomNode {
    PhantomNode::at_node(node, facade.coordinate(node))
}

pub const A: NodeId = 0;
pub const B: NodeId = 1;
pub const C: NodeId = 2;
pub const D: NodeId = 3;
pub const E: NodeId = 4;

fn line<T>(
    builder: T,
    road: impl Fn(T, NodeId, NodeId) -> Result<T, FacadeError>,
) -> Result<T, FacadeError> {
    [A, B, C, D]
        .into_iter()
        .try_fold(builder, |builder, node| road(builder, node, node + 1))
}

/// `A - B - C - D - E`, every road costing 10.
pub fn line_ch() -> ContractedGraph {
    let builder = (0..5).fold(ContractedGraphBuilder::new(5), |builder, node| {
        builder
            .coordinate(node, location(node as usize, 0))
            .expect("node in range")
    });

    line(builder, |builder, from, to| builder.road(from, to, 10, 10, 100.0))
        .expect("fixture is valid")
        .build()
}

/// The line graph partitioned into `{A, B} {C, D} {E}` and `{A..D} {E}`.
pub fn line_mld() -> MultiLevelGraph {
    let builder = (0..5).fold(MultiLevelGraphBuilder::new(5), |builder, node| {
        builder
            .coordinate(node, location(node as usize, 0))
            .expect("node in range")
    });

    line(builder, |builder, from, to| builder.road(from, to, 10, 10, 100.0))
        .expect("fixture is valid")
        .partition(vec![vec![0, 0, 1, 1, 2], vec![0, 0, 0, 0, 1]])
        .build()
        .expect("partition is nested")
}

/// A hierarchy over `A - B - C - D - E` contracted in the order
/// `B, D, C`, leaving `A` and `E` on top.
///
/// Shortcuts: `A - C` via `B` (20), `C - E` via `D` (20) and
/// `A - E` via `C` (40). Every edge is stored at its lower ranked
/// endpoint only, so a search walks upwards from both ends.
pub fn contracted_line() -> ContractedGraph {
    let original = |turn_id: NodeId, weight: Weight| ChEdgeData {
        turn_id,
        shortcut: false,
        weight,
        duration: weight,
        distance: weight as f64 * 10.0,
        forward: true,
        backward: true,
    };
    let shortcut = |via: NodeId, weight: Weight| ChEdgeData {
        turn_id: via,
        shortcut: true,
        weight,
        duration: weight,
        distance: weight as f64 * 10.0,
        forward: true,
        backward: true,
    };

    (0..5)
        .try_fold(ContractedGraphBuilder::new(5), |builder, node| {
            builder.coordinate(node, location(node as usize, 0))
        })
        .and_then(|builder| builder.edge(B, A, original(0, 10)))
        .and_then(|builder| builder.edge(B, C, original(1, 10)))
        .and_then(|builder| builder.edge(D, C, original(2, 10)))
        .and_then(|builder| builder.edge(D, E, original(3, 10)))
        .and_then(|builder| builder.edge(C, A, shortcut(B, 20)))
        .and_then(|builder| builder.edge(C, E, shortcut(D, 20)))
        .and_then(|builder| builder.edge(A, E, shortcut(C, 40)))
        .expect("fixture is valid")
        .build()
}

/// Weight of the grid road between two neighbouring cells, varied so
/// that shortest paths are unique-ish and not axis aligned.
pub fn grid_weight(from: usize, to: usize) -> Weight {
    10 + ((from * 7 + to * 3) % 5) as Weight
}

fn grid<T>(
    size: usize,
    builder: T,
    coordinate: impl Fn(T, NodeId, Point<f64>) -> Result<T, FacadeError>,
    road: impl Fn(T, NodeId, NodeId, Weight) -> Result<T, FacadeError>,
) -> Result<T, FacadeError> {
    let id = |x: usize, y: usize| (y * size + x) as NodeId;

    let mut builder = builder;
    for y in 0..size {
        for x in 0..size {
            builder = coordinate(builder, id(x, y), location(x, y))?;
            if x + 1 < size {
                let weight = grid_weight(id(x, y) as usize, id(x + 1, y) as usize);
                builder = road(builder, id(x, y), id(x + 1, y), weight)?;
            }
            if y + 1 < size {
                let weight = grid_weight(id(x, y) as usize, id(x, y + 1) as usize);
                builder = road(builder, id(x, y), id(x, y + 1), weight)?;
            }
        }
    }

    Ok(builder)
}

/// A `size x size` grid of two-way roads stored uncontracted.
pub fn grid_ch(size: usize) -> ContractedGraph {
    grid(
        size,
        ContractedGraphBuilder::new(size * size),
        |builder, node, location| builder.coordinate(node, location),
        |builder, from, to, weight| builder.road(from, to, weight, weight, weight as f64 * 10.0),
    )
    .expect("fixture is valid")
    .build()
}

/// Two-level partition of a grid: quadrants on level 1, halves (left
/// and right) on level 2.
pub fn grid_partition(size: usize) -> Vec<Vec<u32>> {
    let half = size.div_ceil(2);
    let quadrant = |node: usize| {
        let (x, y) = (node % size, node / size);
        ((y / half) * 2 + x / half) as u32
    };
    let side = |node: usize| ((node % size) / half) as u32;

    vec![
        (0..size * size).map(quadrant).collect(),
        (0..size * size).map(side).collect(),
    ]
}

pub fn grid_mld(size: usize) -> MultiLevelGraph {
    grid(
        size,
        MultiLevelGraphBuilder::new(size * size),
        |builder, node, location| builder.coordinate(node, location),
        |builder, from, to, weight| builder.road(from, to, weight, weight, weight as f64 * 10.0),
    )
    .expect("fixture is valid")
    .partition(grid_partition(size))
    .build()
    .expect("partition is nested")
}

/// ```text
///      1
///    /   \
///  0       3 - 4
///    \   /
///      2
/// ```
/// Two routes from 0 to 4: via 1 (cost 20 + 20 + 10) and via 2
/// (cost 22 + 22 + 10). Cells: `{0, 1, 2}` and `{3, 4}`.
pub fn diamond_mld() -> MultiLevelGraph {
    let coordinates = [(0, 1), (1, 2), (1, 0), (2, 1), (3, 1)];

    coordinates
        .iter()
        .enumerate()
        .try_fold(MultiLevelGraphBuilder::new(5), |builder, (node, (x, y))| {
            builder.coordinate(node as NodeId, location(*x, *y))
        })
        .and_then(|builder| builder.road(0, 1, 20, 20, 200.0))
        .and_then(|builder| builder.road(1, 3, 20, 20, 200.0))
        .and_then(|builder| builder.road(0, 2, 22, 22, 220.0))
        .and_then(|builder| builder.road(2, 3, 22, 22, 220.0))
        .and_then(|builder| builder.road(3, 4, 10, 10, 100.0))
        .expect("fixture is valid")
        .partition(vec![vec![0, 0, 0, 1, 1]])
        .build()
        .expect("partition is nested")
}

/// A short road `0 - 1 - 3` and a detour `0 - 2 - 5 - 6 - 3`, both
/// continuing to `4`. The route `0 -> 4` costs 22 and the detour 26.
pub fn detour_mld() -> MultiLevelGraph {
    let coordinates = [(0, 1), (2, 2), (1, 0), (4, 1), (5, 1), (2, 0), (3, 0)];

    coordinates
        .iter()
        .enumerate()
        .try_fold(MultiLevelGraphBuilder::new(7), |builder, (node, (x, y))| {
            builder.coordinate(node as NodeId, location(*x, *y))
        })
        .and_then(|builder| builder.road(0, 1, 10, 10, 100.0))
        .and_then(|builder| builder.road(1, 3, 10, 10, 100.0))
        .and_then(|builder| builder.road(0, 2, 6, 6, 60.0))
        .and_then(|builder| builder.road(2, 5, 6, 6, 60.0))
        .and_then(|builder| builder.road(5, 6, 6, 6, 60.0))
        .and_then(|builder| builder.road(6, 3, 6, 6, 60.0))
        .and_then(|builder| builder.road(3, 4, 2, 2, 20.0))
        .expect("fixture is valid")
        .partition(vec![vec![0, 0, 0, 1, 1, 0, 0]])
        .build()
        .expect("partition is nested")
}

/// The line `A..E` followed by an unconnected pair `5 - 6`.
pub fn disconnected_mld() -> MultiLevelGraph {
    let builder = (0..7).fold(MultiLevelGraphBuilder::new(7), |builder, node| {
        builder
            .coordinate(node, location(node as usize, 0))
            .expect("node in range")
    });

    line(builder, |builder, from, to| builder.road(from, to, 10, 10, 100.0))
        .and_then(|builder| builder.road(5, 6, 10, 10, 100.0))
        .expect("fixture is valid")
        .partition(vec![vec![0, 0, 1, 1, 1, 2, 2]])
        .build()
        .expect("partition is nested")
}

pub fn disconnected_ch() -> ContractedGraph {
    let builder = (0..7).fold(ContractedGraphBuilder::new(7), |builder, node| {
        builder
            .coordinate(node, location(node as usize, 0))
            .expect("node in range")
    });

    line(builder, |builder, from, to| builder.road(from, to, 10, 10, 100.0))
        .and_then(|builder| builder.road(5, 6, 10, 10, 100.0))
        .expect("fixture is valid")
        .build()
}

/// `A - B - C - D - E` with `B` and `D` contracted and `{A, C, E}` left
/// as the core. Core shortcuts `A - C` and `C - E` are stored at both
/// ends.
pub fn core_ch() -> ContractedGraph {
    let original = |turn_id: NodeId| ChEdgeData {
        turn_id,
        shortcut: false,
        weight: 10,
        duration: 10,
        distance: 100.0,
        forward: true,
        backward: true,
    };
    let shortcut = |via: NodeId| ChEdgeData {
        turn_id: via,
        shortcut: true,
        weight: 20,
        duration: 20,
        distance: 200.0,
        forward: true,
        backward: true,
    };

    (0..5)
        .try_fold(ContractedGraphBuilder::new(5), |builder, node| {
            builder.coordinate(node, location(node as usize, 0))
        })
        .and_then(|builder| builder.edge(B, A, original(0)))
        .and_then(|builder| builder.edge(B, C, original(1)))
        .and_then(|builder| builder.edge(D, C, original(2)))
        .and_then(|builder| builder.edge(D, E, original(3)))
        .and_then(|builder| builder.edge(A, C, shortcut(B)))
        .and_then(|builder| builder.edge(C, A, shortcut(B)))
        .and_then(|builder| builder.edge(C, E, shortcut(D)))
        .and_then(|builder| builder.edge(E, C, shortcut(D)))
        .and_then(|builder| builder.core(A))
        .and_then(|builder| builder.core(C))
        .and_then(|builder| builder.core(E))
        .expect("fixture is valid")
        .build()
}

/// A one-way road `0 -> 1` of weight 10, with a self-loop of weight 30 at
/// node 0 when `with_loop` is set. Node 0 cannot be re-entered other than
/// through the loop.
pub fn loop_ch(with_loop: bool) -> ContractedGraph {
    let builder = ContractedGraphBuilder::new(2)
        .coordinate(0, location(0, 0))
        .and_then(|builder| builder.coordinate(1, location(1, 0)))
        .and_then(|builder| builder.arc(0, 1, 10, 10, 100.0))
        .expect("fixture is valid");

    let builder = if with_loop {
        builder
            .edge(
                0,
                0,
                ChEdgeData {
                    turn_id: 0,
                    shortcut: false,
                    weight: 30,
                    duration: 25,
                    distance: 300.0,
                    forward: true,
                    backward: true,
                },
            )
            .expect("fixture is valid")
    } else {
        builder
    };

    builder.build()
}

/// A phantom on the forward segment of `node`, `offset` into the segment.
pub fn phantom_with_offset<F: BaseFacade>(facade: &F, node: NodeId, offset: Weight) -> PhantomNode {
    phantom(facade, node).with_forward_offset(offset, offset, offset as f64 * 10.0)
}
