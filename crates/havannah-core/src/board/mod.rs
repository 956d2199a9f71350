//! Havannah 盤面
//!
//! The hexagon of side `size` lives in a padded `d x d` grid, `d = 2 * size - 1`.
//! Cells outside the hexagon are never playable. Stones of one colour are
//! merged with an incremental union-find whose roots carry the group size and
//! the corners and edges the group touches, so fork and bridge detection is a
//! mask test after every move. Rings are found with a short depth-first walk.

mod cell;
mod move_iter;
mod move_set;
mod ring;
pub mod topology;
pub mod zobrist;

#[cfg(test)]
mod tests;

use std::fmt;

use serde::{Deserialize, Serialize};

use self::cell::Cell;
use self::ring::{LONG_RUN, RUNS};
pub use self::move_iter::MoveIterator;
pub use self::topology::{MAX_CELLS, MAX_SIZE, MIN_SIZE, Topology};
pub use self::zobrist::NUM_SYMMETRIES;
use crate::error::{ConfigError, MoveError, MoveResult};
use crate::types::{Move, Outcome, Player, WinType};

/// Rule options fixed for the lifetime of a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardOptions {
    pub size: usize,
    /// pie rule: the second player may take over the first stone
    pub swap: bool,
    /// minimum number of stones in a winning ring
    pub min_ring: usize,
    /// below this move count all 12 symmetry hashes are maintained
    pub unique_depth: usize,
}

impl Default for BoardOptions {
    fn default() -> Self {
        BoardOptions { size: 5, swap: false, min_ring: 6, unique_depth: 5 }
    }
}

impl BoardOptions {
    pub fn with_size(size: usize) -> Self {
        BoardOptions { size, ..Default::default() }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_SIZE..=MAX_SIZE).contains(&self.size) {
            return Err(ConfigError::Invalid {
                field: "board.size",
                reason: format!("{} not in {MIN_SIZE}..={MAX_SIZE}", self.size),
            });
        }
        if !(6..=MAX_CELLS).contains(&self.min_ring) {
            return Err(ConfigError::Invalid {
                field: "board.min_ring",
                reason: format!("{} not in 6..={MAX_CELLS}", self.min_ring),
            });
        }
        Ok(())
    }
}

/// Union-find summary of one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Group {
    pub root: Move,
    pub owner: Player,
    pub size: usize,
    pub corners: u8,
    pub edges: u8,
}

#[derive(Clone, Copy)]
pub struct Board {
    topo: &'static Topology,
    cells: [Cell; MAX_CELLS],
    num_moves: u16,
    num_empty: u16,
    unique_depth: u16,
    min_ring: u16,
    swap_enabled: bool,
    to_play: Player,
    outcome: Outcome,
    win_type: WinType,
    last: Move,
    hashes: [u64; NUM_SYMMETRIES],
}

impl Board {
    pub fn new(size: usize) -> Board {
        Board::with_options(BoardOptions::with_size(size))
    }

    pub fn with_options(opts: BoardOptions) -> Board {
        let topo = Topology::for_size(opts.size);
        let mut cells = [Cell::default(); MAX_CELLS];
        for idx in topo.cells() {
            cells[idx].parent = idx as u16;
        }
        Board {
            topo,
            cells,
            num_moves: 0,
            num_empty: topo.num_cells() as u16,
            unique_depth: opts.unique_depth as u16,
            min_ring: opts.min_ring.max(6) as u16,
            swap_enabled: opts.swap,
            to_play: Player::One,
            outcome: Outcome::Unknown,
            win_type: WinType::None,
            last: Move::NONE,
            hashes: [0; NUM_SYMMETRIES],
        }
    }

    /// Replay `moves` from the empty board.
    pub fn from_moves(opts: BoardOptions, moves: &[Move]) -> MoveResult<Board> {
        let mut board = Board::with_options(opts);
        for &mv in moves {
            board.play(mv)?;
        }
        Ok(board)
    }

    pub fn options(&self) -> BoardOptions {
        BoardOptions {
            size: self.topo.size(),
            swap: self.swap_enabled,
            min_ring: self.min_ring as usize,
            unique_depth: self.unique_depth as usize,
        }
    }

    #[inline]
    pub fn topology(&self) -> &'static Topology {
        self.topo
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.topo.size()
    }

    #[inline]
    pub fn num_moves(&self) -> usize {
        self.num_moves as usize
    }

    #[inline]
    pub fn to_play(&self) -> Player {
        self.to_play
    }

    #[inline]
    pub fn winner(&self) -> Outcome {
        self.outcome
    }

    #[inline]
    pub fn win_type(&self) -> WinType {
        self.win_type
    }

    #[inline]
    pub fn last_move(&self) -> Move {
        self.last
    }

    #[inline]
    pub fn is_over(&self) -> bool {
        self.outcome.is_decided()
    }

    #[inline]
    pub fn can_swap(&self) -> bool {
        self.swap_enabled && self.num_moves == 1 && !self.is_over()
    }

    /// Number of legal moves, counting the swap pseudo-move when available.
    pub fn moves_remaining(&self) -> usize {
        if self.is_over() {
            return 0;
        }
        self.num_empty as usize + self.can_swap() as usize
    }

    /// True while every symmetry accumulator is maintained.
    #[inline]
    pub fn symmetry_tracked(&self) -> bool {
        self.num_moves <= self.unique_depth
    }

    pub fn owner(&self, mv: Move) -> Option<Player> {
        self.topo.index_of(mv).and_then(|i| Player::from_u8(self.cells[i].owner))
    }

    pub fn on_board(&self, mv: Move) -> bool {
        self.topo.index_of(mv).is_some()
    }

    pub fn valid_move(&self, mv: Move) -> bool {
        self.check_move(mv).is_ok()
    }

    fn check_move(&self, mv: Move) -> MoveResult<usize> {
        if self.is_over() {
            return Err(MoveError::GameOver);
        }
        if mv.is_swap() {
            return if self.can_swap() { Ok(usize::MAX) } else { Err(MoveError::SwapUnavailable) };
        }
        if !mv.is_coord() {
            return Err(MoveError::NotAMove(mv));
        }
        let idx = self.topo.index_of(mv).ok_or(MoveError::OffBoard(mv))?;
        if !self.cells[idx].is_empty() {
            return Err(MoveError::Occupied(mv));
        }
        Ok(idx)
    }

    /// Play a real move. The board is unchanged on error.
    pub fn play(&mut self, mv: Move) -> MoveResult<()> {
        self.play_with(mv, true)
    }

    /// Play a move inside a search; the stone is not marked permanent.
    pub fn play_search(&mut self, mv: Move) -> MoveResult<()> {
        self.play_with(mv, false)
    }

    /// `play` reporting only success.
    pub fn make_move(&mut self, mv: Move) -> bool {
        self.play(mv).is_ok()
    }

    fn play_with(&mut self, mv: Move, permanent: bool) -> MoveResult<()> {
        let idx = self.check_move(mv)?;
        if mv.is_swap() {
            self.swap_first_stone();
        } else {
            self.place(idx, permanent);
        }
        Ok(())
    }

    fn swap_first_stone(&mut self) {
        let idx = self
            .topo
            .index_of(self.last)
            .expect("swap is only legal after one stone on the board");
        let (x, y) = (self.last.x as i32, self.last.y as i32);
        let active = self.active_symmetries();
        for (s, h) in self.hashes.iter_mut().enumerate().take(active) {
            let (tx, ty) = zobrist::transform(x, y, self.topo.size(), s);
            *h ^= zobrist::key(Player::One, tx, ty) ^ zobrist::key(Player::Two, tx, ty);
        }

        self.cells[idx].owner = Player::Two as u8;
        for i in self.topo.cells() {
            self.cells[i].local = 0;
        }
        self.mark_locality(idx, Player::Two);

        self.num_moves += 1;
        self.to_play = Player::One;
        self.last = Move::SWAP;
    }

    #[inline]
    fn active_symmetries(&self) -> usize {
        if self.num_moves < self.unique_depth { NUM_SYMMETRIES } else { 1 }
    }

    fn mark_locality(&mut self, idx: usize, player: Player) {
        let shift = 2 * player.index();
        for k in 0..18 {
            if let Some(n) = self.topo.neighbour(idx, k) {
                let bit = if k < 6 { 1 } else { 2 };
                self.cells[n].local |= bit << shift;
            }
        }
    }

    fn place(&mut self, idx: usize, permanent: bool) {
        let player = self.to_play;
        let mv = self.topo.move_at(idx);

        let active = self.active_symmetries();
        for (s, h) in self.hashes.iter_mut().enumerate().take(active) {
            let (tx, ty) = zobrist::transform(mv.x as i32, mv.y as i32, self.topo.size(), s);
            *h ^= zobrist::key(player, tx, ty);
        }

        self.cells[idx] = Cell {
            owner: player as u8,
            perm: permanent,
            mark: 0,
            local: self.cells[idx].local,
            corner: self.topo.corner_mask(idx),
            edge: self.topo.edge_mask(idx),
            size: 1,
            parent: idx as u16,
        };
        self.mark_locality(idx, player);

        let mut already_joined = false;
        let mut dir = 0;
        while dir < 6 {
            match self.topo.neighbour(idx, dir) {
                Some(n) if self.cells[n].owner == player as u8 => {
                    already_joined |= self.join(idx, n);
                    // the next neighbour touches this one, same group either way
                    dir += 2;
                }
                _ => dir += 1,
            }
        }

        self.num_moves += 1;
        self.num_empty -= 1;
        self.last = mv;

        let root = self.find(idx);
        let group = self.cells[root];
        let ring_possible = already_joined && group.size >= self.min_ring;
        if group.corner.count_ones() >= 2 {
            self.finish(Outcome::Win(player), WinType::Bridge);
        } else if group.edge.count_ones() >= 3 {
            self.finish(Outcome::Win(player), WinType::Fork);
        } else if ring_possible && self.check_ring_df(idx, player) {
            self.finish(Outcome::Win(player), WinType::Ring);
        } else if self.num_empty == 0 {
            self.finish(Outcome::Draw, WinType::None);
        }
        self.to_play = !player;
    }

    fn finish(&mut self, outcome: Outcome, win_type: WinType) {
        self.outcome = outcome;
        self.win_type = win_type;
    }

    /// Root of `idx`'s group, compressing the path.
    fn find(&mut self, idx: usize) -> usize {
        let mut root = idx;
        while self.cells[root].parent as usize != root {
            root = self.cells[root].parent as usize;
        }
        let mut cur = idx;
        while cur != root {
            let next = self.cells[cur].parent as usize;
            self.cells[cur].parent = root as u16;
            cur = next;
        }
        root
    }

    /// Root lookup for shared references.
    fn find_ro(&self, mut idx: usize) -> usize {
        while self.cells[idx].parent as usize != idx {
            idx = self.cells[idx].parent as usize;
        }
        idx
    }

    /// Union by size. Returns true when both were already in one group.
    fn join(&mut self, a: usize, b: usize) -> bool {
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return true;
        }
        if self.cells[ra].size < self.cells[rb].size {
            std::mem::swap(&mut ra, &mut rb);
        }
        let child = self.cells[rb];
        let root = &mut self.cells[ra];
        root.size += child.size;
        root.corner |= child.corner;
        root.edge |= child.edge;
        self.cells[rb].parent = ra as u16;
        false
    }

    /// Depth-first ring search through the stone just placed at `start`.
    fn check_ring_df(&mut self, start: usize, player: Player) -> bool {
        self.cells[start].mark = 1;
        let mut found = false;
        // a ring through `start` always leaves it through one of the first 4
        for dir in 0..4 {
            let Some(n) = self.topo.neighbour(start, dir) else { continue };
            if self.cells[n].owner != player as u8 {
                continue;
            }
            self.cells[n].mark = 2;
            found = self.follow_ring(n, dir, player, 2);
            self.cells[n].mark = 0;
            if found {
                break;
            }
        }
        self.cells[start].mark = 0;
        found
    }

    /// Continue the walk at `cur` (entered along `dir`, at path depth `depth`)
    /// turning at most 60 degrees per step.
    fn follow_ring(&mut self, cur: usize, dir: usize, player: Player, depth: u16) -> bool {
        for turn in 5..=7 {
            let nd = (dir + turn) % 6;
            let Some(next) = self.topo.neighbour(cur, nd) else { continue };
            let mark = self.cells[next].mark;
            if mark != 0 {
                if depth + 1 - mark >= self.min_ring {
                    return true;
                }
                continue;
            }
            if self.cells[next].owner != player as u8 {
                continue;
            }
            self.cells[next].mark = depth + 1;
            let found = self.follow_ring(next, nd, player, depth + 1);
            self.cells[next].mark = 0;
            if found {
                return true;
            }
        }
        false
    }

    /// O(1) ring test for `player` playing the empty cell `idx`, valid for
    /// `min_ring <= 6`.
    fn ring_o1(&self, idx: usize, pattern: usize) -> bool {
        let runs = &RUNS[pattern];
        let count = runs[0] as usize;
        if count < 2 {
            return false;
        }
        let mut roots = [0usize; 3];
        for (r, &dir) in roots.iter_mut().zip(&runs[1..=count]) {
            let n = self
                .topo
                .neighbour(idx, dir as usize)
                .expect("run directions only cover on-board neighbours");
            *r = self.find_ro(n);
        }
        (0..count).any(|i| (i + 1..count).any(|j| roots[i] == roots[j]))
    }

    /// Outcome if the side to move played `mv`, without playing it.
    pub fn test_win(&self, mv: Move) -> Outcome {
        self.test_win_for(mv, self.to_play)
    }

    /// Outcome if `player` placed a stone at `mv`.
    pub fn test_win_for(&self, mv: Move, player: Player) -> Outcome {
        if self.is_over() {
            return Outcome::Unknown;
        }
        let Some(idx) = self.topo.index_of(mv) else { return Outcome::Unknown };
        if !self.cells[idx].is_empty() {
            return Outcome::Unknown;
        }

        let mut corner = self.topo.corner_mask(idx);
        let mut edge = self.topo.edge_mask(idx);
        let mut pattern = 0usize;
        // upper bound, a group seen through several neighbours counts twice
        let mut joined = 1usize;
        for dir in 0..6 {
            if let Some(n) = self.topo.neighbour(idx, dir) {
                if self.cells[n].owner == player as u8 {
                    pattern |= 1 << dir;
                    let root = &self.cells[self.find_ro(n)];
                    corner |= root.corner;
                    edge |= root.edge;
                    joined += root.size as usize;
                }
            }
        }

        if corner.count_ones() >= 2 || edge.count_ones() >= 3 {
            return Outcome::Win(player);
        }

        // three neighbours in a row can close a ring around their middle stone,
        // which the run table cannot see
        let long_run = LONG_RUN[pattern] && joined >= self.min_ring as usize;
        if RUNS[pattern][0] >= 2 || long_run {
            let ring = if self.min_ring <= 6 && !long_run {
                self.ring_o1(idx, pattern)
            } else {
                let mut probe = *self;
                probe.to_play = player;
                probe.place(idx, false);
                probe.outcome == Outcome::Win(player)
            };
            if ring {
                return Outcome::Win(player);
            }
        }

        if self.num_empty == 1 { Outcome::Draw } else { Outcome::Unknown }
    }

    /// Canonical hash: the minimum over all symmetries while they are tracked,
    /// otherwise the identity accumulator.
    pub fn hash(&self) -> u64 {
        if self.symmetry_tracked() {
            self.hashes.iter().copied().min().unwrap_or(0)
        } else {
            self.hashes[0]
        }
    }

    /// Raw accumulators, one per symmetry. Only index 0 stays current past the
    /// unique depth.
    pub fn symmetry_hashes(&self) -> [u64; NUM_SYMMETRIES] {
        self.hashes
    }

    /// Canonical hash after the side to move plays `mv`.
    pub fn test_hash(&self, mv: Move) -> u64 {
        let (x, y) = (mv.x as i32, mv.y as i32);
        let player = self.to_play;
        if self.num_moves < self.unique_depth {
            (0..NUM_SYMMETRIES)
                .map(|s| {
                    let (tx, ty) = zobrist::transform(x, y, self.topo.size(), s);
                    self.hashes[s] ^ zobrist::key(player, tx, ty)
                })
                .min()
                .unwrap_or(0)
        } else {
            self.hashes[0] ^ zobrist::key(player, x, y)
        }
    }

    /// Image of `mv` under symmetry `sym`. Sentinels map to themselves.
    pub fn transform_move(&self, mv: Move, sym: usize) -> Move {
        if !mv.is_coord() {
            return mv;
        }
        let (x, y) = zobrist::transform(mv.x as i32, mv.y as i32, self.topo.size(), sym);
        Move::new(x as i8, y as i8)
    }

    /// 2-bit proximity of `mv` to `player`'s stones: bit 0 adjacent, bit 1
    /// within distance two.
    pub fn locality(&self, mv: Move, player: Player) -> u8 {
        self.topo
            .index_of(mv)
            .map_or(0, |i| (self.cells[i].local >> (2 * player.index())) & 0b11)
    }

    /// Whether the stone at `mv` was placed by a real move.
    pub fn is_permanent(&self, mv: Move) -> bool {
        self.topo.index_of(mv).is_some_and(|i| self.cells[i].perm)
    }

    pub fn group(&self, mv: Move) -> Option<Group> {
        let idx = self.topo.index_of(mv)?;
        let owner = Player::from_u8(self.cells[idx].owner)?;
        let root = self.find_ro(idx);
        let c = &self.cells[root];
        Some(Group {
            root: self.topo.move_at(root),
            owner,
            size: c.size as usize,
            corners: c.corner,
            edges: c.edge,
        })
    }

    /// Group root of `mv`, compressing its path.
    pub fn find_group(&mut self, mv: Move) -> Option<Move> {
        let idx = self.topo.index_of(mv)?;
        if self.cells[idx].is_empty() {
            return None;
        }
        let root = self.find(idx);
        Some(self.topo.move_at(root))
    }

    /// Legal moves in row-major order, swap first when available. With
    /// `unique`, moves leading to symmetric duplicates are skipped while
    /// symmetry hashes are tracked.
    pub fn move_iter(&self, unique: bool) -> MoveIterator<'_> {
        MoveIterator::new(self, unique && self.num_moves < self.unique_depth)
    }

    /// Occupied cells with their owners.
    pub fn stones(&self) -> impl Iterator<Item = (Move, Player)> + '_ {
        self.topo
            .cells()
            .filter_map(|i| Player::from_u8(self.cells[i].owner).map(|p| (self.topo.move_at(i), p)))
    }

    pub(crate) fn cell_owner_raw(&self, idx: usize) -> u8 {
        self.cells[idx].owner
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.topo.diameter();
        let m = self.size() - 1;
        write!(f, "{:width$}", "", width = m + 3)?;
        for x in 0..self.size() {
            write!(f, "{} ", x + 1)?;
        }
        writeln!(f)?;
        for y in 0..d {
            write!(f, "{:indent$} {} ", "", (b'a' + y as u8) as char, indent = y.abs_diff(m))?;
            for idx in (y * d..(y + 1) * d).filter(|&i| self.topo.is_valid(i)) {
                let c = match self.cells[idx].owner {
                    1 => 'X',
                    2 => 'O',
                    _ => '.',
                };
                write!(f, "{c} ")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Board")
            .field("size", &self.size())
            .field("moves", &self.num_moves)
            .field("to_play", &self.to_play)
            .field("outcome", &self.outcome)
            .field("win_type", &self.win_type)
            .field("hash", &format_args!("{:016x}", self.hash()))
            .finish()
    }
}
