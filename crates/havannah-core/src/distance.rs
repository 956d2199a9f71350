//! Lower bound on the number of stones still needed to win.
//!
//! For each player a 0-1 breadth-first fill runs from each of the 6 edges and
//! 6 corners: own stones cost 0, empty cells cost 1, opponent stones block.
//! A fork needs three edges and a bridge two corners, so the bound at a cell is
//! the cheaper of the two combinations. PNS uses it as an initial proof weight.

use std::collections::VecDeque;

use crate::board::{Board, Topology};
use crate::types::{Move, Player};

/// Distance of an unreachable cell.
pub const UNREACHABLE: u32 = 1000;

const SOURCES: usize = 12;

pub struct LbDists {
    topo: &'static Topology,
    /// `[player][source][cell]`
    dists: Vec<u32>,
}

impl LbDists {
    pub fn new(board: &Board) -> Self {
        let topo = board.topology();
        let len = topo.padded_len();
        let mut me = LbDists { topo, dists: vec![UNREACHABLE; Player::NUM * SOURCES * len] };
        let mut queue = VecDeque::with_capacity(len);
        for player in [Player::One, Player::Two] {
            for source in 0..SOURCES {
                me.flood(board, player, source, &mut queue);
            }
        }
        me
    }

    #[inline]
    fn slot(&self, player: Player, source: usize, idx: usize) -> usize {
        (player.index() * SOURCES + source) * self.topo.padded_len() + idx
    }

    fn flood(&mut self, board: &Board, player: Player, source: usize, queue: &mut VecDeque<usize>) {
        let topo = self.topo;
        let opponent = player.opponent() as u8;
        let cost = |idx: usize| u32::from(board.cell_owner_raw(idx) != player as u8);

        queue.clear();
        for idx in topo.cells() {
            let touches = if source < 6 {
                topo.edge_mask(idx) & (1 << source) != 0
            } else {
                topo.corner_mask(idx) & (1 << (source - 6)) != 0
            };
            if touches && board.cell_owner_raw(idx) != opponent {
                let slot = self.slot(player, source, idx);
                self.dists[slot] = cost(idx);
                if cost(idx) == 0 {
                    queue.push_front(idx);
                } else {
                    queue.push_back(idx);
                }
            }
        }

        while let Some(idx) = queue.pop_front() {
            let here = self.dists[self.slot(player, source, idx)];
            for dir in 0..6 {
                let Some(n) = topo.neighbour(idx, dir) else { continue };
                if board.cell_owner_raw(n) == opponent {
                    continue;
                }
                let step = cost(n);
                let slot = self.slot(player, source, n);
                if here + step < self.dists[slot] {
                    self.dists[slot] = here + step;
                    if step == 0 {
                        queue.push_front(n);
                    } else {
                        queue.push_back(n);
                    }
                }
            }
        }
    }

    /// Distance from `source` (edges 0..6, corners 6..12) to `mv` for `player`,
    /// counting `mv` itself when empty.
    pub fn dist(&self, source: usize, player: Player, mv: Move) -> u32 {
        self.topo.index_of(mv).map_or(UNREACHABLE, |i| self.dists[self.slot(player, source, i)])
    }

    /// Lower bound on stones `player` needs for a fork or bridge through `mv`.
    pub fn get_for(&self, mv: Move, player: Player) -> u32 {
        let mut edges = [0u32; 6];
        let mut corners = [0u32; 6];
        for i in 0..6 {
            edges[i] = self.dist(i, player, mv);
            corners[i] = self.dist(6 + i, player, mv);
        }
        edges.sort_unstable();
        corners.sort_unstable();
        // `mv` is counted once per path
        let fork = (edges[0] + edges[1] + edges[2]).saturating_sub(2);
        let bridge = (corners[0] + corners[1]).saturating_sub(1);
        fork.min(bridge)
    }

    /// Smaller of both players' bounds.
    pub fn get(&self, mv: Move) -> u32 {
        self.get_for(mv, Player::One).min(self.get_for(mv, Player::Two))
    }
}
