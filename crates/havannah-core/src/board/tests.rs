use proptest::prelude::*;

use super::*;

fn mv(x: i8, y: i8) -> Move {
    Move::new(x, y)
}

/// Alternate `p1` and `p2` moves, starting with player one.
fn interleave(p1: &[Move], p2: &[Move]) -> Vec<Move> {
    let mut out = Vec::new();
    for i in 0..p1.len().max(p2.len()) {
        out.extend(p1.get(i));
        out.extend(p2.get(i));
    }
    out
}

#[test]
fn test_fork_on_size_four() {
    let p1 = [mv(1, 1), mv(1, 0), mv(0, 1), mv(1, 2), mv(1, 3), mv(1, 4)];
    let p2 = [mv(5, 5), mv(3, 3), mv(5, 2), mv(3, 6), mv(6, 4)];
    let mut board = Board::new(4);
    let moves = interleave(&p1, &p2);
    let (last, rest) = moves.split_last().unwrap();
    for &m in rest {
        board.play(m).unwrap();
        assert_eq!(board.winner(), Outcome::Unknown, "after {m}");
    }
    assert_eq!(board.test_win(*last), Outcome::Win(Player::One));
    board.play(*last).unwrap();
    assert_eq!(board.winner(), Outcome::Win(Player::One));
    assert_eq!(board.win_type(), WinType::Fork);
    assert_eq!(board.moves_remaining(), 0);
    assert_eq!(board.play(mv(6, 6)), Err(MoveError::GameOver));
}

#[test]
fn test_bridge_along_top_edge() {
    let p1 = [mv(0, 0), mv(1, 0), mv(2, 0), mv(3, 0)];
    let p2 = [mv(3, 3), mv(5, 5), mv(4, 4)];
    let board = Board::from_moves(BoardOptions::with_size(4), &interleave(&p1, &p2)).unwrap();
    assert_eq!(board.winner(), Outcome::Win(Player::One));
    assert_eq!(board.win_type(), WinType::Bridge);
}

fn ring_moves() -> (Vec<Move>, Move) {
    // the six neighbours of the centre of a size-5 board, closing at (4, 3)
    let ring = [mv(5, 4), mv(5, 5), mv(4, 5), mv(3, 4), mv(3, 3)];
    let p2 = [mv(0, 0), mv(8, 8), mv(0, 4), mv(8, 4), mv(4, 0)];
    (interleave(&ring, &p2), mv(4, 3))
}

#[test]
fn test_ring_around_centre() {
    let (moves, closing) = ring_moves();
    let mut board = Board::from_moves(BoardOptions::with_size(5), &moves).unwrap();
    assert_eq!(board.winner(), Outcome::Unknown);
    assert_eq!(board.test_win(closing), Outcome::Win(Player::One));
    // the opponent closing nothing there
    assert_eq!(board.test_win_for(closing, Player::Two), Outcome::Unknown);

    board.play(closing).unwrap();
    assert_eq!(board.winner(), Outcome::Win(Player::One));
    assert_eq!(board.win_type(), WinType::Ring);
}

#[test]
fn test_ring_shorter_than_minimum_does_not_win() {
    let (moves, closing) = ring_moves();
    let opts = BoardOptions { size: 5, min_ring: 7, ..Default::default() };
    let mut board = Board::from_moves(opts, &moves).unwrap();
    assert_eq!(board.test_win(closing), Outcome::Unknown);
    board.play(closing).unwrap();
    assert_eq!(board.winner(), Outcome::Unknown);
}

/// Six stones around a stone of the same colour, closing at (4, 3).
fn filled_ring_moves() -> Vec<Move> {
    let ring = [mv(4, 4), mv(5, 4), mv(5, 5), mv(4, 5), mv(3, 4), mv(3, 3)];
    let p2 = [mv(0, 0), mv(8, 8), mv(0, 4), mv(8, 4), mv(4, 0), mv(4, 8)];
    interleave(&ring, &p2)
}

#[test]
fn test_ring_around_own_stone() {
    let closing = mv(4, 3);
    let mut board = Board::from_moves(BoardOptions::with_size(5), &filled_ring_moves()).unwrap();
    assert_eq!(board.winner(), Outcome::Unknown);
    // the closing stone touches a single run of three own stones
    assert_eq!(board.test_win(closing), Outcome::Win(Player::One));

    board.play(closing).unwrap();
    assert_eq!(board.winner(), Outcome::Win(Player::One));
    assert_eq!(board.win_type(), WinType::Ring);

    let opts = BoardOptions { size: 5, min_ring: 7, ..Default::default() };
    let long = Board::from_moves(opts, &filled_ring_moves()).unwrap();
    assert_eq!(long.test_win(closing), Outcome::Unknown);
}

#[test]
fn test_swap_rules() {
    let centre = Topology::for_size(5).center();

    let mut plain = Board::new(5);
    let total = plain.moves_remaining();
    plain.play(centre).unwrap();
    assert!(!plain.can_swap());
    assert_eq!(plain.moves_remaining(), total - 1);
    assert_eq!(plain.play(Move::SWAP), Err(MoveError::SwapUnavailable));

    let mut board = Board::with_options(BoardOptions { swap: true, ..BoardOptions::with_size(5) });
    assert!(!board.valid_move(Move::SWAP));
    board.play(centre).unwrap();
    assert!(board.can_swap());
    assert_eq!(board.moves_remaining(), total);
    assert_eq!(board.move_iter(false).next(), Some(Move::SWAP));

    board.play(Move::SWAP).unwrap();
    assert_eq!(board.owner(centre), Some(Player::Two));
    assert_eq!(board.to_play(), Player::One);
    assert_eq!(board.moves_remaining(), total - 1);
    assert!(!board.valid_move(Move::SWAP));
    assert_eq!(board.play(Move::SWAP), Err(MoveError::SwapUnavailable));
}

#[test]
fn test_swap_hash_matches_direct_position() {
    let opts = BoardOptions { swap: true, ..BoardOptions::with_size(5) };
    let mut swapped = Board::with_options(opts);
    swapped.play(mv(2, 1)).unwrap();
    swapped.play(Move::SWAP).unwrap();
    swapped.play(mv(4, 4)).unwrap();

    // the same stones without the swap: p1 centre, p2 at (2,1)
    let direct = Board::from_moves(opts, &[mv(4, 4), mv(2, 1)]).unwrap();
    assert_eq!(swapped.owner(mv(2, 1)), Some(Player::Two));
    assert_eq!(swapped.hash(), direct.hash());
}

#[test]
fn test_invalid_moves() {
    let mut board = Board::new(4);
    assert_eq!(board.play(mv(6, 0)), Err(MoveError::OffBoard(mv(6, 0))));
    assert_eq!(board.play(mv(20, 3)), Err(MoveError::OffBoard(mv(20, 3))));
    assert_eq!(board.play(Move::NONE), Err(MoveError::NotAMove(Move::NONE)));
    board.play(mv(3, 3)).unwrap();
    assert_eq!(board.play(mv(3, 3)), Err(MoveError::Occupied(mv(3, 3))));
    assert!(!board.make_move(mv(3, 3)));
    assert_eq!(board.num_moves(), 1);
    assert_eq!(board.to_play(), Player::Two);
}

#[test]
fn test_unique_first_moves_fold_symmetries() {
    let board = Board::new(4);
    assert_eq!(board.move_iter(false).count(), 37);
    // centre, ring 1, two orbits on ring 2, two on the outer ring
    assert_eq!(board.move_iter(true).count(), 6);

    let deep = Board::with_options(BoardOptions { unique_depth: 0, ..BoardOptions::with_size(4) });
    assert_eq!(deep.move_iter(true).count(), 37);
}

#[test]
fn test_locality_bits() {
    let mut board = Board::new(5);
    board.play(mv(4, 4)).unwrap();
    assert_eq!(board.locality(mv(5, 4), Player::One), 0b01);
    assert_eq!(board.locality(mv(6, 4), Player::One), 0b10);
    assert_eq!(board.locality(mv(8, 4), Player::One), 0);
    assert_eq!(board.locality(mv(5, 4), Player::Two), 0);
    assert!(board.is_permanent(mv(4, 4)));

    let mut search = board;
    search.play_search(mv(0, 0)).unwrap();
    assert!(!search.is_permanent(mv(0, 0)));
}

#[test]
fn test_display_shows_stones() {
    let board = Board::from_moves(BoardOptions::with_size(4), &[mv(0, 0), mv(3, 3)]).unwrap();
    let text = board.to_string();
    assert_eq!(text.lines().count(), 8);
    assert_eq!(text.matches('X').count(), 1);
    assert_eq!(text.matches('O').count(), 1);
}

/// Random legal move sequences on a size-5 board, stopping at game end.
fn random_game(max_len: usize) -> impl Strategy<Value = Vec<Move>> {
    prop::collection::vec(any::<prop::sample::Index>(), 0..max_len).prop_map(|picks| {
        let mut board = Board::new(5);
        let mut played = Vec::new();
        for pick in picks {
            if board.is_over() {
                break;
            }
            let moves: Vec<Move> = board.move_iter(false).collect();
            let m = moves[pick.index(moves.len())];
            board.play(m).unwrap();
            played.push(m);
        }
        played
    })
}

proptest! {
    #[test]
    fn prop_union_find_groups_are_consistent(moves in random_game(50)) {
        let mut board = Board::from_moves(BoardOptions::with_size(5), &moves).unwrap();
        let stones: Vec<(Move, Player)> = board.stones().collect();
        let mut roots = Vec::new();
        for &(m, owner) in &stones {
            let root = board.find_group(m).unwrap();
            prop_assert_eq!(board.find_group(m), Some(root));
            prop_assert_eq!(board.find_group(root), Some(root));
            prop_assert_eq!(board.owner(root), Some(owner));
            roots.push(root);
        }
        for (i, &(m, _)) in stones.iter().enumerate() {
            let members = roots.iter().filter(|&&r| r == roots[i]).count();
            prop_assert_eq!(board.group(m).unwrap().size, members);
        }
    }

    #[test]
    fn prop_symmetric_positions_share_hash(moves in random_game(5), sym in 0usize..NUM_SYMMETRIES) {
        let opts = BoardOptions { unique_depth: 5, ..BoardOptions::with_size(5) };
        let board = Board::from_moves(opts, &moves).unwrap();
        prop_assert!(board.symmetry_tracked());
        prop_assert_eq!(board.symmetry_hashes().iter().copied().min().unwrap(), board.hash());

        let mapped: Vec<Move> = moves.iter().map(|&m| board.transform_move(m, sym)).collect();
        let image = Board::from_moves(opts, &mapped).unwrap();
        prop_assert_eq!(image.hash(), board.hash());
    }

    #[test]
    fn prop_test_hash_predicts_hash(moves in random_game(8)) {
        let board = Board::from_moves(BoardOptions::with_size(5), &moves).unwrap();
        for m in board.move_iter(false).filter(|m| m.is_coord()).take(12) {
            let mut next = board;
            next.play(m).unwrap();
            prop_assert_eq!(board.test_hash(m), next.hash());
        }
    }

    #[test]
    fn prop_test_win_agrees_with_play(moves in random_game(40)) {
        let board = Board::from_moves(BoardOptions::with_size(5), &moves).unwrap();
        for m in board.move_iter(false) {
            let mut next = board;
            next.play(m).unwrap();
            prop_assert_eq!(board.test_win(m), next.winner(), "move {}", m);
        }
    }
}
