use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};

use crate::arena::{ArenaNode, ChildrenHandle};
use crate::types::{Move, Outcome, Player};

pub const INF: u32 = u32::MAX;
/// proof number of a lost node
pub const LOSS: u32 = INF - 1;
/// proof number of a node lost through an assigned draw
pub const DRAW: u32 = INF - 2;
/// largest non-terminal value
pub const MAX_PN: u32 = DRAW - 1;

#[inline]
const fn pack(phi: u32, delta: u32) -> u64 {
    ((phi as u64) << 32) | delta as u64
}

#[inline]
const fn unpack(v: u64) -> (u32, u32) {
    ((v >> 32) as u32, v as u32)
}

#[inline]
pub const fn is_terminal(phi: u32, delta: u32) -> bool {
    phi == 0 || delta == 0
}

/// Proof-number node. `phi == 0` proves a win for the side to move at this
/// node, `delta == 0` a loss; the other number then holds `LOSS` (real) or
/// `DRAW` (through an assigned draw).
///
/// (phi, delta) share one atomic word so readers never see a torn pair, and
/// a proven pair is never overwritten.
pub struct PnsNode {
    pd: AtomicU64,
    work: AtomicU64,
    mv: AtomicU16,
    refs: AtomicU16,
    children: ChildrenHandle,
}

impl Default for PnsNode {
    fn default() -> Self {
        PnsNode {
            pd: AtomicU64::new(pack(1, 1)),
            work: AtomicU64::new(0),
            mv: AtomicU16::new(Move::NONE.to_u16()),
            refs: AtomicU16::new(0),
            children: ChildrenHandle::new(),
        }
    }
}

impl PnsNode {
    pub fn init(&self, mv: Move, phi: u32, delta: u32) {
        self.mv.store(mv.to_u16(), Ordering::Relaxed);
        self.pd.store(pack(phi, delta), Ordering::Release);
        self.work.store(0, Ordering::Relaxed);
    }

    #[inline]
    pub fn mv(&self) -> Move {
        Move::from_u16(self.mv.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn pd(&self) -> (u32, u32) {
        unpack(self.pd.load(Ordering::Acquire))
    }

    #[inline]
    pub fn phi(&self) -> u32 {
        self.pd().0
    }

    #[inline]
    pub fn delta(&self) -> u32 {
        self.pd().1
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        let (phi, delta) = self.pd();
        is_terminal(phi, delta)
    }

    /// Store a new pair unless the node is already proven. Returns whether
    /// the stored pair changed.
    pub fn set_pd(&self, phi: u32, delta: u32) -> bool {
        let new = pack(phi, delta);
        self.pd
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |old| {
                let (p, d) = unpack(old);
                (old != new && !is_terminal(p, d)).then_some(new)
            })
            .is_ok()
    }

    /// Overwrite unconditionally (imports, leaf reseeding).
    pub fn force_pd(&self, phi: u32, delta: u32) {
        self.pd.store(pack(phi, delta), Ordering::Release);
    }

    #[inline]
    pub fn work(&self) -> u64 {
        self.work.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn add_work(&self, n: u64) {
        self.work.fetch_add(n, Ordering::Relaxed);
    }

    pub fn set_work(&self, n: u64) {
        self.work.store(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn refs(&self) -> u32 {
        self.refs.load(Ordering::Relaxed) as u32
    }

    #[inline]
    pub fn add_ref(&self) {
        self.refs.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn release_ref(&self) {
        self.refs.fetch_sub(1, Ordering::Relaxed);
    }

    /// `delta` plus the number of threads inside this subtree, so concurrent
    /// descents spread out.
    #[inline]
    pub fn ref_delta(&self) -> u64 {
        self.delta() as u64 + self.refs() as u64
    }

    /// Proven result as a game outcome; `mover` made the move into this node.
    pub fn outcome(&self, mover: Player) -> Outcome {
        match self.pd() {
            (LOSS, 0) => Outcome::Win(mover),
            (0, LOSS) => Outcome::Win(mover.opponent()),
            (DRAW, 0) | (0, DRAW) => Outcome::Draw,
            _ => Outcome::Unknown,
        }
    }
}

impl ArenaNode for PnsNode {
    fn children(&self) -> &ChildrenHandle {
        &self.children
    }

    fn copy_from(&self, other: &Self) {
        self.pd.store(other.pd.load(Ordering::Acquire), Ordering::Release);
        self.work.store(other.work(), Ordering::Relaxed);
        self.mv.store(other.mv.load(Ordering::Relaxed), Ordering::Relaxed);
        self.refs.store(other.refs.load(Ordering::Relaxed), Ordering::Relaxed);
        self.children.copy_from(&other.children);
    }

    fn reset(&self) {
        self.pd.store(pack(1, 1), Ordering::Relaxed);
        self.work.store(0, Ordering::Relaxed);
        self.mv.store(Move::NONE.to_u16(), Ordering::Relaxed);
        self.refs.store(0, Ordering::Relaxed);
        self.children.clear();
    }
}

impl std::fmt::Debug for PnsNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (phi, delta) = self.pd();
        f.debug_struct("PnsNode")
            .field("mv", &self.mv())
            .field("phi", &phi)
            .field("delta", &delta)
            .field("work", &self.work())
            .field("children", &self.children)
            .finish()
    }
}

/// Combine children into the parent's (phi, delta).
///
/// 1. a child lost by its side to move: the parent wins
/// 2. a child lost through a draw: the parent wins through that draw
/// 3. every child won by its side to move: the parent loses, through a draw
///    if any of those wins used one
/// 4. otherwise phi is the smallest child delta and delta the sum of child
///    phis, both capped below the sentinels
pub fn combine<'a>(children: impl IntoIterator<Item = &'a PnsNode>) -> (u32, u32) {
    let mut min_delta = INF;
    let mut sum = 0u64;
    let mut win = false;
    let mut draw_win = false;
    let mut all_lost = true;
    let mut draw_loss = false;
    for child in children {
        let (phi, delta) = child.pd();
        match (phi, delta) {
            (LOSS, 0) => win = true,
            (_, 0) => draw_win = true,
            (0, DRAW) => draw_loss = true,
            _ => {}
        }
        all_lost &= phi == 0;
        min_delta = min_delta.min(delta);
        sum += phi as u64;
    }

    if win {
        (0, LOSS)
    } else if draw_win {
        (0, DRAW)
    } else if all_lost {
        if draw_loss { (DRAW, 0) } else { (LOSS, 0) }
    } else {
        (min_delta.min(MAX_PN), sum.min(MAX_PN as u64) as u32)
    }
}
