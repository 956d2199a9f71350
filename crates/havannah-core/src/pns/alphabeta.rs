//! Shallow probes used to seed new leaves.

use crate::board::Board;
use crate::types::{Outcome, Player};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// the side to move wins on its next stone
    ToMoveWins,
    /// the opponent holds two winning cells; one block cannot stop both
    ToMoveLoses,
    Draw,
    Unknown,
}

/// Look `depth` (1 or 2) plies ahead from `board`. Returns the verdict and
/// the number of moves examined.
pub fn probe(board: &Board, depth: u8) -> (Probe, u32) {
    let turn = board.to_play();
    let opponent = turn.opponent();
    let mut nodes = 0;
    let mut verdict = Probe::Unknown;
    let mut threats = 0;

    for mv in board.move_iter(false) {
        nodes += 1;
        match board.test_win_for(mv, turn) {
            Outcome::Win(p) if p == turn => return (Probe::ToMoveWins, nodes),
            Outcome::Draw => verdict = Probe::Draw,
            _ => {}
        }
        if depth >= 2 && mv.is_coord() && board.test_win_for(mv, opponent) == Outcome::Win(opponent) {
            threats += 1;
        }
    }

    if threats >= 2 {
        return (Probe::ToMoveLoses, nodes);
    }
    (verdict, nodes)
}

/// `probe` from the point of view of `mover`, who just moved into `board`.
pub fn mover_result(board: &Board, depth: u8, mover: Player) -> (Option<Outcome>, u32) {
    let (p, nodes) = probe(board, depth);
    let outcome = match p {
        Probe::ToMoveWins => Some(Outcome::Win(mover.opponent())),
        Probe::ToMoveLoses => Some(Outcome::Win(mover)),
        Probe::Draw => Some(Outcome::Draw),
        Probe::Unknown => None,
    };
    (outcome, nodes)
}
