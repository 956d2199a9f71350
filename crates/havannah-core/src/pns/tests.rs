use super::*;
use crate::store::MemoryStore;
use crate::types::Outcome;

fn mv(x: i8, y: i8) -> Move {
    Move::new(x, y)
}

/// Size 4, P1 to move; (1,4) completes a fork.
fn fork_position() -> Board {
    let moves = [
        mv(1, 1), mv(5, 5), mv(1, 0), mv(3, 3), mv(0, 1),
        mv(5, 2), mv(1, 2), mv(3, 6), mv(1, 3), mv(6, 4),
    ];
    Board::from_moves(BoardOptions::with_size(4), &moves).unwrap()
}

fn settings(assign: Player) -> PassSettings {
    PassSettings::new(&SolverConfig::default(), assign, u64::MAX)
}

fn node(phi: u32, delta: u32, work: u64, m: Move) -> PnsNode {
    let n = PnsNode::default();
    n.init(m, phi, delta);
    n.set_work(work);
    n
}

#[test]
fn test_seed_exact_win() {
    let board = fork_position();
    let s = settings(Player::One);
    assert_eq!(seed_child(&board, mv(1, 4), &s, None, None), (LOSS, 0));
    let (phi, delta) = seed_child(&board, mv(6, 6), &s, None, None);
    assert!(phi > 0 && delta > 0 && phi == delta);
}

#[test]
fn test_seed_draw_follows_assignment() {
    let board = Board::new(5);
    let m = mv(2, 2);
    let store = MemoryStore::new();
    store.set(board.test_hash(m), StoreRecord { outcome: Outcome::Draw, work: 1, best: Move::NONE });

    // P1 moves; with draws counted for P1 the child (P2 to move) is lost
    let s = settings(Player::One);
    assert_eq!(seed_child(&board, m, &s, Some(&store), None), (DRAW, 0));
    let s = settings(Player::Two);
    assert_eq!(seed_child(&board, m, &s, Some(&store), None), (0, DRAW));
}

#[test]
fn test_seed_weights() {
    let board = Board::new(5);
    let mut s = settings(Player::One);
    s.ab = 0;
    assert_eq!(seed_child(&board, mv(2, 2), &s, None, None), (1, 1));

    s.ab = 1;
    let (w, _) = seed_child(&board, mv(2, 2), &s, None, None);
    assert_eq!(w, 60);

    s.ab = 0;
    s.lbdist = true;
    let dists = crate::distance::LbDists::new(&board);
    let (w, _) = seed_child(&board, mv(0, 0), &s, None, Some(&dists));
    assert!(w >= 1);
}

#[test]
fn test_best_child_rules() {
    let children = [
        node(3, 2, 10, mv(0, 0)),
        node(LOSS, 0, 1, mv(1, 0)),
        node(DRAW, 0, 5, mv(2, 0)),
        node(4, 2, 20, mv(3, 0)),
    ];
    let board = Board::new(4);
    assert_eq!(best_child(&board, &children, PassOutcome::Win).unwrap().mv(), mv(1, 0));
    assert_eq!(best_child(&board, &children, PassOutcome::DrawWin).unwrap().mv(), mv(1, 0));
    assert_eq!(best_child(&board, &children, PassOutcome::Loss).unwrap().mv(), mv(3, 0));

    let open = [node(3, 2, 10, mv(0, 0)), node(5, 2, 30, mv(1, 0)), node(1, 4, 50, mv(2, 0))];
    assert_eq!(best_child(&board, &open, PassOutcome::Unknown).unwrap().mv(), mv(1, 0));

    let drawn = [node(3, 2, 10, mv(0, 0)), node(DRAW, 0, 5, mv(2, 0))];
    assert_eq!(best_child(&board, &drawn, PassOutcome::DrawWin).unwrap().mv(), mv(2, 0));
}

#[test]
fn test_best_child_prefers_the_finishing_move() {
    // a1 wins too, through a double threat, and is listed first with less work
    let board = fork_position();
    let children = [node(LOSS, 0, 1, mv(0, 0)), node(LOSS, 0, 3, mv(1, 4)), node(LOSS, 0, 2, mv(6, 6))];
    assert_eq!(best_child(&board, &children, PassOutcome::Win).unwrap().mv(), mv(1, 4));
    assert_eq!(best_child(&board, &children, PassOutcome::DrawWin).unwrap().mv(), mv(1, 4));

    let slow = [node(LOSS, 0, 9, mv(0, 0)), node(LOSS, 0, 2, mv(6, 6))];
    assert_eq!(best_child(&board, &slow, PassOutcome::Win).unwrap().mv(), mv(6, 6));
}

#[test]
fn test_import_keeps_finished_children_exact() {
    let board = fork_position();
    let mut s = settings(Player::One);
    s.ab = 0;

    let mut finishing = RecordNode::new(mv(1, 4), Player::One);
    finishing.proof = Some((3, 2));
    finishing.visits = 7;
    finishing.children = vec![RecordNode::new(mv(6, 6), Player::Two)];
    let mut open = RecordNode::new(mv(6, 6), Player::One);
    open.proof = Some((7, 9));

    let arena = Arena::<PnsNode>::new(crate::arena::MAX_SEGMENT);
    let root = arena.ensure_root().unwrap();
    import_children(&arena, &board, root, &[finishing, open], &s);

    let (_, children) = arena.children_of(arena.node(root)).unwrap();
    let win = children.iter().find(|c| c.mv() == mv(1, 4)).unwrap();
    assert_eq!(win.pd(), (LOSS, 0));
    assert_eq!(win.work(), 7);
    assert!(arena.children_of(win).is_none());
    let other = children.iter().find(|c| c.mv() == mv(6, 6)).unwrap();
    assert_eq!(other.pd(), (7, 9));
    assert_eq!(arena.node(root).pd(), (0, LOSS));
}

#[test]
fn test_principal_variation_follows_proof() {
    let arena = Arena::<PnsNode>::new(crate::arena::MAX_SEGMENT);
    let root = arena.ensure_root().unwrap();
    assert!(arena.node(root).children().try_lock());
    let seg = arena.alloc(2, root).unwrap();
    let kids = arena.segment(seg);
    kids[0].init(mv(0, 0), 2, 2);
    kids[1].init(mv(1, 0), LOSS, 0);
    arena.node(root).children().publish(seg);
    let (phi, delta) = combine(kids);
    arena.node(root).set_pd(phi, delta);

    assert_eq!(arena.node(root).pd(), (0, LOSS));
    assert_eq!(principal_variation(&arena, root, &Board::new(4)), vec![mv(1, 0)]);
}
