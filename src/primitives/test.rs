use geo::point;

use crate::primitives::*;

#[test_log::test]
fn phantom_seeds_carry_offsets() {
    let phantom = PhantomNode::at_node(3, point! { x: 0.0, y: 0.0 })
        .with_reverse(4)
        .with_forward_offset(5, 6, 7.0)
        .with_reverse_offset(2, 3, 4.0);

    let seeds = phantom.signed_seeds(Direction::Forward).collect::<Vec<_>>();
    assert_eq!(seeds.len(), 2);
    assert_eq!(seeds[0].node, 3);
    assert_eq!(seeds[0].weight, -5);
    assert_eq!(seeds[1].node, 4);
    assert_eq!(seeds[1].duration, -3);

    let seeds = phantom.signed_seeds(Direction::Reverse).collect::<Vec<_>>();
    assert_eq!(seeds[0].weight, 5);
    approx::assert_relative_eq!(seeds[1].distance, 4.0);
}

#[test_log::test]
fn loop_is_needed_when_target_lies_behind_source() {
    let source = PhantomNode::at_node(1, point! { x: 0.0, y: 0.0 }).with_forward_offset(8, 8, 8.0);
    let target = PhantomNode::at_node(1, point! { x: 0.0, y: 0.0 }).with_forward_offset(2, 2, 2.0);

    assert!(needs_loop_forward(&source, &target));
    assert!(!needs_loop_forward(&target, &source));
    assert!(!needs_loop_backwards(&source, &target));
}

#[test_log::test]
fn splicing_paths_shares_the_joint() {
    let mut path = UnpackedPath {
        nodes: vec![0, 1, 2],
        edges: vec![10, 11],
    };
    path.splice(UnpackedPath {
        nodes: vec![2, 3],
        edges: vec![12],
    });

    assert_eq!(path.nodes, vec![0, 1, 2, 3]);
    assert_eq!(path.edges, vec![10, 11, 12]);
    assert_eq!(path.nodes.len(), path.edges.len() + 1);
}
