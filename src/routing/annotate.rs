//! Turns unpacked paths into annotated route legs.

use log::error;

use crate::facade::{EdgeData, EdgeFacade};
use crate::primitives::{Distance, Duration, NodeId, PhantomNode, RouteLeg, UnpackedPath, Weight};

/// The part of the phantom's segment lying before the snapped point,
/// on the segment the path uses at `node`.
fn segment_offset(phantom: &PhantomNode, node: NodeId) -> (Weight, Duration, Distance) {
    if phantom.forward_segment_id.enabled && phantom.forward_segment_id.id == node {
        (
            phantom.forward_weight_plus_offset(),
            phantom.forward_duration,
            phantom.forward_distance,
        )
    } else {
        (
            phantom.reverse_weight_plus_offset(),
            phantom.reverse_duration,
            phantom.reverse_distance,
        )
    }
}

#[inline]
fn traversed_in_reverse(phantom: &PhantomNode, node: NodeId) -> bool {
    !(phantom.forward_segment_id.enabled && phantom.forward_segment_id.id == node)
}

/// Annotates one leg between `source` and `target`.
///
/// Weight, duration and distance are the sums over the path's edges,
/// less the part of the source segment behind the source and plus the
/// part of the target segment up to the target. Returns `None` for an
/// empty path or one that starts or ends off the phantoms' segments.
pub fn extract_route<F>(
    facade: &F,
    source: &PhantomNode,
    target: &PhantomNode,
    path: UnpackedPath,
) -> Option<RouteLeg>
where
    F: EdgeFacade + ?Sized,
{
    let (first, last) = (*path.nodes.first()?, *path.nodes.last()?);

    let on_segment = |phantom: &PhantomNode, node: NodeId| {
        phantom.seeds().any(|seed| seed.node == node)
    };
    if !on_segment(source, first) || !on_segment(target, last) {
        error!("Path {first} -> {last} does not start and end on its phantoms");
        debug_assert!(false, "path endpoints are not phantom segments");
        return None;
    }

    let (weight, duration, distance) = path.edges.iter().fold(
        (0, 0, 0.0),
        |(weight, duration, distance), edge| {
            let data = facade.edge_data(*edge);
            (
                weight + data.weight(),
                duration + data.duration(),
                distance + data.distance(),
            )
        },
    );

    let (source_weight, source_duration, source_distance) = segment_offset(source, first);
    let (target_weight, target_duration, target_distance) = segment_offset(target, last);

    Some(RouteLeg {
        weight: weight - source_weight + target_weight,
        duration: duration - source_duration + target_duration,
        distance: distance - source_distance + target_distance,
        source_phantom: *source,
        target_phantom: *target,
        source_traversed_in_reverse: traversed_in_reverse(source, first),
        target_traversed_in_reverse: traversed_in_reverse(target, last),
        nodes: path.nodes,
        edges: path.edges,
    })
}
