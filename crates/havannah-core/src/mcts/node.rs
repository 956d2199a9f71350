use std::sync::atomic::{AtomicU8, AtomicU16, AtomicU32, Ordering};

use crate::arena::{ArenaNode, ChildrenHandle};
use crate::types::{Move, Outcome, Player};

/// Running average stored in half points (win 2, draw 1, loss 0).
#[derive(Debug, Default)]
pub struct Stat {
    sum: AtomicU32,
    num: AtomicU32,
}

impl Stat {
    #[inline]
    pub fn add(&self, half_points: u32) {
        self.sum.fetch_add(half_points, Ordering::Relaxed);
        self.num.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn num(&self) -> u32 {
        self.num.load(Ordering::Relaxed)
    }

    /// Mean score in `[0, 1]`.
    #[inline]
    pub fn avg(&self) -> f64 {
        let n = self.num();
        if n == 0 { 0.0 } else { self.sum.load(Ordering::Relaxed) as f64 / (2.0 * n as f64) }
    }

    fn copy_from(&self, other: &Stat) {
        self.sum.store(other.sum.load(Ordering::Relaxed), Ordering::Relaxed);
        self.num.store(other.num(), Ordering::Relaxed);
    }

    fn reset(&self) {
        self.sum.store(0, Ordering::Relaxed);
        self.num.store(0, Ordering::Relaxed);
    }
}

/// Half points for `player` given a finished game.
#[inline]
pub fn score(result: Outcome, player: Player) -> u32 {
    match result {
        Outcome::Win(p) if p == player => 2,
        Outcome::Draw => 1,
        _ => 0,
    }
}

const fn encode(o: Outcome) -> u8 {
    match o {
        Outcome::Unknown => 0,
        Outcome::Draw => 1,
        Outcome::Win(Player::One) => 2,
        Outcome::Win(Player::Two) => 3,
    }
}

const fn decode(v: u8) -> Outcome {
    match v {
        1 => Outcome::Draw,
        2 => Outcome::Win(Player::One),
        3 => Outcome::Win(Player::Two),
        _ => Outcome::Unknown,
    }
}

/// UCT node. Statistics are from the point of view of the player whose move
/// leads here.
#[derive(Debug)]
pub struct MctsNode {
    pub exp: Stat,
    pub rave: Stat,
    mv: AtomicU16,
    proven: AtomicU8,
    children: ChildrenHandle,
}

impl Default for MctsNode {
    fn default() -> Self {
        MctsNode {
            exp: Stat::default(),
            rave: Stat::default(),
            mv: AtomicU16::new(Move::NONE.to_u16()),
            proven: AtomicU8::new(0),
            children: ChildrenHandle::new(),
        }
    }
}

impl MctsNode {
    pub fn init(&self, mv: Move, proven: Outcome) {
        self.mv.store(mv.to_u16(), Ordering::Relaxed);
        self.proven.store(encode(proven), Ordering::Release);
    }

    #[inline]
    pub fn mv(&self) -> Move {
        Move::from_u16(self.mv.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn proven(&self) -> Outcome {
        decode(self.proven.load(Ordering::Acquire))
    }

    pub fn set_proven(&self, o: Outcome) {
        self.proven.store(encode(o), Ordering::Release);
    }

    #[inline]
    pub fn visits(&self) -> u32 {
        self.exp.num()
    }
}

impl ArenaNode for MctsNode {
    fn children(&self) -> &ChildrenHandle {
        &self.children
    }

    fn copy_from(&self, other: &Self) {
        self.exp.copy_from(&other.exp);
        self.rave.copy_from(&other.rave);
        self.mv.store(other.mv.load(Ordering::Relaxed), Ordering::Relaxed);
        self.proven.store(other.proven.load(Ordering::Acquire), Ordering::Release);
        self.children.copy_from(&other.children);
    }

    fn reset(&self) {
        self.exp.reset();
        self.rave.reset();
        self.mv.store(Move::NONE.to_u16(), Ordering::Relaxed);
        self.proven.store(0, Ordering::Relaxed);
        self.children.clear();
    }
}
