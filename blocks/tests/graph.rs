use blocks::{BlockGraph, BlockKind, Direction, GraphError, Link, Socket};

fn mv(graph: &mut BlockGraph, direction: Direction) -> blocks::BlockId {
    graph.insert(BlockKind::movement(direction))
}

#[test]
fn attach_links_both_ends() {
    let mut g = BlockGraph::new();
    let a = mv(&mut g, Direction::Right);
    let b = mv(&mut g, Direction::Up);

    g.attach(a, b, Socket::Lower).unwrap();

    assert_eq!(g.lower(a), Some(b));
    assert_eq!(g.upper(b), Some(a));
    assert_eq!(
        g.parent_link(b),
        Some(Link {
            parent: a,
            socket: Socket::Lower
        })
    );
}

#[test]
fn attaching_new_lower_replaces_previous() {
    let mut g = BlockGraph::new();
    let a = mv(&mut g, Direction::Right);
    let b = mv(&mut g, Direction::Up);
    let c = mv(&mut g, Direction::Down);

    g.attach(a, b, Socket::Lower).unwrap();
    g.attach(a, c, Socket::Lower).unwrap();

    assert_eq!(g.lower(a), Some(c));
    assert_eq!(g.upper(b), None);
    assert_eq!(g.parent_link(b), None);
}

#[test]
fn reattaching_child_elsewhere_clears_old_parent() {
    let mut g = BlockGraph::new();
    let a = mv(&mut g, Direction::Right);
    let b = mv(&mut g, Direction::Up);
    let c = mv(&mut g, Direction::Down);

    g.attach(a, c, Socket::Lower).unwrap();
    g.attach(b, c, Socket::Lower).unwrap();

    assert_eq!(g.lower(a), None);
    assert_eq!(g.lower(b), Some(c));
    assert_eq!(g.upper(c), Some(b));
}

#[test]
fn operand_replacement() {
    let mut g = BlockGraph::new();
    let m = mv(&mut g, Direction::Left);
    let one = g.insert(BlockKind::integer(1));
    let two = g.insert(BlockKind::integer(2));

    g.attach(m, one, Socket::Operand).unwrap();
    g.attach(m, two, Socket::Operand).unwrap();

    assert_eq!(g.operand(m), Some(two));
    assert_eq!(g.parent_link(one), None);
    assert_eq!(g.integer_in(m, Socket::Operand), Some(2));
}

#[test]
fn detach_is_idempotent() {
    let mut g = BlockGraph::new();
    let a = mv(&mut g, Direction::Right);
    let b = mv(&mut g, Direction::Up);
    g.attach(a, b, Socket::Lower).unwrap();

    g.detach(a, b, Socket::Lower).unwrap();
    g.detach(a, b, Socket::Lower).unwrap();

    assert_eq!(g.lower(a), None);
    assert_eq!(g.upper(b), None);
}

#[test]
fn detach_of_wrong_neighbor_is_rejected() {
    let mut g = BlockGraph::new();
    let a = mv(&mut g, Direction::Right);
    let b = mv(&mut g, Direction::Up);
    let c = mv(&mut g, Direction::Down);
    g.attach(a, b, Socket::Lower).unwrap();

    let err = g.detach(a, c, Socket::Lower).unwrap_err();
    assert!(matches!(err, GraphError::LinkMismatch { found, .. } if found == b));
    assert_eq!(g.lower(a), Some(b));
}

#[test]
fn self_attachment_is_rejected() {
    let mut g = BlockGraph::new();
    let a = mv(&mut g, Direction::Right);

    assert!(matches!(
        g.attach(a, a, Socket::Lower),
        Err(GraphError::WouldCycle { .. })
    ));
}

#[test]
fn cycle_through_chain_is_rejected() {
    let mut g = BlockGraph::new();
    let a = mv(&mut g, Direction::Right);
    let b = mv(&mut g, Direction::Up);
    let c = mv(&mut g, Direction::Down);
    g.attach(a, b, Socket::Lower).unwrap();
    g.attach(b, c, Socket::Lower).unwrap();

    let err = g.attach(c, a, Socket::Lower).unwrap_err();
    assert!(matches!(err, GraphError::WouldCycle { .. }));
    assert_eq!(g.chain(a), vec![a, b, c]);
    assert_eq!(g.lower(c), None);
}

#[test]
fn cycle_through_loop_body_is_rejected() {
    let mut g = BlockGraph::new();
    let outer = g.insert(BlockKind::opening_loop());
    let inner = mv(&mut g, Direction::Up);
    g.attach(outer, inner, Socket::Body).unwrap();

    let err = g.attach(inner, outer, Socket::Lower).unwrap_err();
    assert!(matches!(err, GraphError::WouldCycle { .. }));
}

#[test]
fn incompatible_sockets_are_rejected() {
    let mut g = BlockGraph::new();
    let m = mv(&mut g, Direction::Right);
    let other = mv(&mut g, Direction::Up);
    let lp = g.insert(BlockKind::opening_loop());
    let end = g.insert(BlockKind::terminator());
    let value = g.insert(BlockKind::integer(3));

    let incompatible = |r: Result<(), GraphError>| {
        matches!(r, Err(GraphError::IncompatibleSocket { .. }))
    };
    assert!(incompatible(g.attach(m, value, Socket::Lower)));
    assert!(incompatible(g.attach(m, other, Socket::Operand)));
    assert!(incompatible(g.attach(m, value, Socket::Start)));
    assert!(incompatible(g.attach(lp, value, Socket::Operand)));
    assert!(incompatible(g.attach(end, value, Socket::Start)));
    assert!(incompatible(g.attach(end, other, Socket::Body)));
    assert!(incompatible(g.attach(value, other, Socket::Lower)));

    g.attach(lp, value, Socket::End).unwrap();
    g.attach(end, other, Socket::Lower).unwrap();
}

#[test]
fn remove_clears_every_link() {
    let mut g = BlockGraph::new();
    let a = mv(&mut g, Direction::Right);
    let b = mv(&mut g, Direction::Up);
    let c = mv(&mut g, Direction::Down);
    let v = g.insert(BlockKind::integer(1));
    g.attach(a, b, Socket::Lower).unwrap();
    g.attach(b, c, Socket::Lower).unwrap();
    g.attach(b, v, Socket::Operand).unwrap();

    g.remove(b).unwrap();

    assert!(!g.contains(b));
    assert_eq!(g.lower(a), None);
    assert_eq!(g.upper(c), None);
    assert_eq!(g.parent_link(v), None);
    assert_eq!(g.len(), 3);
}

#[test]
fn stale_handles_do_not_alias() {
    let mut g = BlockGraph::new();
    let a = mv(&mut g, Direction::Right);
    g.remove(a).unwrap();
    let b = mv(&mut g, Direction::Left);

    assert_eq!(a.index(), b.index());
    assert_ne!(a, b);
    assert!(g.get(a).is_none());
    assert!(matches!(g.remove(a), Err(GraphError::UnknownBlock(_))));
}

#[test]
fn topmost_walks_out_of_loops_and_operands() {
    let mut g = BlockGraph::new();
    let root = mv(&mut g, Direction::Right);
    let lp = g.insert(BlockKind::opening_loop());
    let body = mv(&mut g, Direction::Up);
    let nested = mv(&mut g, Direction::Down);
    let value = g.insert(BlockKind::integer(2));
    g.attach(root, lp, Socket::Lower).unwrap();
    g.attach(lp, body, Socket::Body).unwrap();
    g.attach(body, nested, Socket::Lower).unwrap();
    g.attach(nested, value, Socket::Operand).unwrap();

    assert_eq!(g.topmost(value).unwrap(), root);
    assert_eq!(g.topmost(nested).unwrap(), root);
    assert_eq!(g.topmost(root).unwrap(), root);
    assert_eq!(g.enclosing_loop(nested), Some(lp));
    assert_eq!(g.chain_head(nested), body);
}

#[test]
fn literal_edits_in_place() {
    let mut g = BlockGraph::new();
    let m = mv(&mut g, Direction::Up);
    let v = g.insert(BlockKind::integer(1));
    g.attach(m, v, Socket::Operand).unwrap();

    g.set_integer(v, 7).unwrap();
    assert_eq!(g.integer_in(m, Socket::Operand), Some(7));

    assert!(matches!(g.set_integer(m, 1), Err(GraphError::NotAValue(_))));
}
