use log::error;

use crate::facade::ChFacade;
use crate::primitives::{EdgeId, NodeId, UnpackedPath};

/// The edge a search used to step from `from` to `to`: a forward edge
/// stored at `from`, or a backward edge stored at `to` when the step was
/// taken by the reverse search.
pub(crate) fn smallest_edge_between<F>(facade: &F, from: NodeId, to: NodeId) -> Option<EdgeId>
where
    F: ChFacade + ?Sized,
{
    facade
        .find_smallest_edge(from, to, |data| data.forward)
        .or_else(|| facade.find_smallest_edge(to, from, |data| data.backward))
}

/// Expands every hop of `packed_path` down to original edges, calling
/// `callback` with each `(from, to)` pair and its edge in travel order.
///
/// A `[node, node]` path expands to the self-loop at `node`. Returns
/// `None` if a hop has no edge in the graph, which means the path was not
/// produced by a search over this facade.
pub fn unpack_path<F, C>(facade: &F, packed_path: &[NodeId], mut callback: C) -> Option<()>
where
    F: ChFacade + ?Sized,
    C: FnMut((NodeId, NodeId), EdgeId),
{
    let mut stack: Vec<(NodeId, NodeId)> = packed_path
        .windows(2)
        .rev()
        .map(|hop| (hop[0], hop[1]))
        .collect();

    while let Some((from, to)) = stack.pop() {
        let Some(edge) = smallest_edge_between(facade, from, to) else {
            error!("No edge between {from} and {to} while unpacking");
            debug_assert!(false, "packed path hop {from} -> {to} has no edge");
            return None;
        };

        let data = facade.edge_data(edge);
        if data.shortcut {
            let middle = data.turn_id;
            stack.push((middle, to));
            stack.push((from, middle));
        } else {
            callback((from, to), edge);
        }
    }

    Some(())
}

/// Original nodes of the hop `from -> to`, both ends included.
pub fn unpack_edge<F>(facade: &F, from: NodeId, to: NodeId) -> Option<Vec<NodeId>>
where
    F: ChFacade + ?Sized,
{
    let mut nodes = vec![from];
    unpack_path(facade, &[from, to], |(_, next), _| nodes.push(next))?;
    Some(nodes)
}

/// Unpacks a search result into nodes and edges. An empty path is
/// returned when unpacking fails.
pub fn unpack_to_path<F>(facade: &F, packed_path: &[NodeId]) -> UnpackedPath
where
    F: ChFacade + ?Sized,
{
    let Some(first) = packed_path.first() else {
        return UnpackedPath::default();
    };

    let mut unpacked = UnpackedPath {
        nodes: Vec::with_capacity(packed_path.len()),
        edges: Vec::with_capacity(packed_path.len()),
    };
    unpacked.nodes.push(*first);

    let result = unpack_path(facade, packed_path, |(from, to), edge| {
        debug_assert_eq!(unpacked.nodes.last(), Some(&from));
        unpacked.nodes.push(to);
        unpacked.edges.push(edge);
    });

    match result {
        Some(()) => unpacked,
        None => UnpackedPath::default(),
    }
}
