use super::Board;
use super::move_set::MoveHashSet;
use crate::types::Move;

/// Legal moves of a board in row-major order.
///
/// The swap pseudo-move comes first when available. In unique mode a move is
/// skipped when its resulting canonical hash was already produced.
pub struct MoveIterator<'a> {
    board: &'a Board,
    next: usize,
    swap: bool,
    seen: Option<MoveHashSet>,
}

impl<'a> MoveIterator<'a> {
    pub(super) fn new(board: &'a Board, unique: bool) -> Self {
        let over = board.is_over();
        MoveIterator {
            board,
            next: if over { board.topo.padded_len() } else { 0 },
            swap: board.can_swap(),
            seen: unique.then(|| MoveHashSet::with_expected(board.moves_remaining())),
        }
    }
}

impl Iterator for MoveIterator<'_> {
    type Item = Move;

    fn next(&mut self) -> Option<Move> {
        if std::mem::take(&mut self.swap) {
            return Some(Move::SWAP);
        }
        let topo = self.board.topo;
        while self.next < topo.padded_len() {
            let idx = self.next;
            self.next += 1;
            if !topo.is_valid(idx) || !self.board.cells[idx].is_empty() {
                continue;
            }
            let mv = topo.move_at(idx);
            if let Some(seen) = self.seen.as_mut() {
                if !seen.insert(self.board.test_hash(mv)) {
                    continue;
                }
            }
            return Some(mv);
        }
        None
    }
}
