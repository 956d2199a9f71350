//! Worker side of the solver: depth-first proof-number descents over the
//! shared tree.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

use parking_lot::RwLock;

use super::alphabeta;
use super::node::{DRAW, INF, LOSS, MAX_PN, PnsNode, combine};
use crate::arena::{Arena, ArenaNode, GcThreshold, NodeRef, collect_garbage};
use crate::board::Board;
use crate::config::{CompactParams, SolverConfig};
use crate::distance::LbDists;
use crate::store::PositionStore;
use crate::sync::{GcVerdict, RunControl, SearchTask, Step};
use crate::types::{Move, Outcome, Player};

/// Settings of the pass in progress. Written by the controller between runs.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PassSettings {
    /// side that draws count as wins for
    pub assign: Player,
    pub mem_limit: u64,
    pub df: bool,
    pub epsilon: f64,
    pub ab: u8,
    pub lbdist: bool,
    pub compact: CompactParams,
}

impl PassSettings {
    pub fn new(config: &SolverConfig, assign: Player, mem_limit: u64) -> Self {
        PassSettings {
            assign,
            mem_limit,
            df: config.df,
            epsilon: config.epsilon,
            ab: config.ab,
            lbdist: config.lbdist,
            compact: config.compact,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct SearchStats {
    pub iterations: AtomicU64,
    pub max_depth: AtomicUsize,
    pub gc_runs: AtomicU32,
}

impl SearchStats {
    pub fn reset(&self) {
        self.iterations.store(0, Ordering::Relaxed);
        self.max_depth.store(0, Ordering::Relaxed);
        self.gc_runs.store(0, Ordering::Relaxed);
    }
}

pub(crate) struct PnsTask {
    pub arena: RwLock<Arena<PnsNode>>,
    pub board: RwLock<Board>,
    pub settings: RwLock<PassSettings>,
    pub store: RwLock<Option<Arc<dyn PositionStore>>>,
    pub gc_limit: GcThreshold,
    pub stats: SearchStats,
}

pub(crate) struct PnsLocal {
    moves: Vec<Move>,
    iters: u64,
    max_depth: usize,
    alloc_failed: bool,
}

/// One descent from the root.
struct Descent<'a> {
    arena: &'a Arena<PnsNode>,
    control: &'a RunControl,
    settings: PassSettings,
    store: Option<&'a dyn PositionStore>,
    local: &'a mut PnsLocal,
}

impl PnsTask {
    pub fn new(board: Board, config: &SolverConfig) -> Self {
        PnsTask {
            arena: RwLock::new(Arena::new(config.chunk_slots)),
            board: RwLock::new(board),
            settings: RwLock::new(PassSettings::new(config, board.to_play(), u64::MAX)),
            store: RwLock::new(None),
            gc_limit: GcThreshold::new(config.gc_min),
            stats: SearchStats::default(),
        }
    }
}

impl SearchTask for PnsTask {
    type Local = PnsLocal;

    fn make_local(&self, _worker: usize) -> PnsLocal {
        PnsLocal { moves: Vec::with_capacity(crate::board::MAX_CELLS), iters: 0, max_depth: 0, alloc_failed: false }
    }

    fn step(&self, local: &mut PnsLocal, control: &RunControl) -> Step {
        let settings = *self.settings.read();
        let board = *self.board.read();
        let store = self.store.read().clone();
        let arena = self.arena.read();

        let Some(root) = arena.root() else {
            return Step::Finished;
        };
        if arena.node(root).is_terminal() {
            return Step::Finished;
        }

        local.iters = 0;
        local.max_depth = 0;
        local.alloc_failed = false;
        let mut descent = Descent { arena: &arena, control, settings, store: store.as_deref(), local };
        let ok = descent.pns(&board, root, 0, INF / 2, INF / 2);

        self.stats.iterations.fetch_add(local.iters, Ordering::Relaxed);
        self.stats.max_depth.fetch_max(local.max_depth, Ordering::Relaxed);

        if arena.node(root).is_terminal() {
            Step::Finished
        } else if !ok && (local.alloc_failed || arena.memory_used() >= settings.mem_limit) {
            Step::NeedGc
        } else {
            Step::Continue
        }
    }

    fn collect_garbage(&self) -> GcVerdict {
        let settings = *self.settings.read();
        let mut arena = self.arena.write();
        let limit = self.gc_limit.get();
        let report = collect_garbage(&mut arena, |n| n.is_terminal() || n.work() < limit, settings.compact);
        let next = self.gc_limit.adapt(report.after, settings.mem_limit);
        self.stats.gc_runs.fetch_add(1, Ordering::Relaxed);

        log::info!(
            "pns gc: limit {limit} -> {next}, kept {}% of tree ({} -> {} bytes), prune {:?}, compact {:?}",
            report.kept_percent(),
            report.before,
            report.after,
            report.prune_time,
            report.compact_time,
        );
        if report.exhausted {
            log::warn!("pns gc: reclaimed under 1% of the tree, ending search");
            GcVerdict::Exhausted
        } else {
            GcVerdict::Resume
        }
    }
}

impl Descent<'_> {
    /// Returns false when the descent could not make progress: the memory
    /// limit was hit or another thread holds the expansion lock.
    fn pns(&mut self, board: &Board, node_ref: NodeRef, depth: usize, tp: u32, td: u32) -> bool {
        self.local.iters += 1;
        self.local.max_depth = self.local.max_depth.max(depth);
        let node = self.arena.node(node_ref);

        let Some((seg, children)) = self.arena.children_of(node) else {
            if node.is_terminal() {
                return true;
            }
            return self.expand(board, node_ref);
        };

        let mut mem;
        loop {
            let (idx, tpc, tdc) = self.select(node, children, tp, td);
            let child = &children[idx];

            let mut next = *board;
            next.play_search(child.mv()).expect("tree move is legal in its position");

            let before = self.local.iters;
            child.add_ref();
            mem = self.pns(&next, seg.node(idx), depth + 1, tpc, tdc);
            child.release_ref();
            child.add_work(self.local.iters - before);

            let (phi, delta) = combine(children);
            let changed = node.set_pd(phi, delta);
            if !self.settings.df && changed {
                break;
            }

            let (phi, delta) = node.pd();
            let keep_going = if self.settings.df { phi < tp && delta < td } else { phi != 0 && delta != 0 };
            if !(self.control.is_running() && mem && keep_going) {
                break;
            }
        }
        mem
    }

    /// Child to descend into, with its thresholds.
    fn select(&self, node: &PnsNode, children: &[PnsNode], tp: u32, td: u32) -> (usize, u32, u32) {
        if !self.settings.df {
            let idx = (0..children.len()).min_by_key(|&i| children[i].delta()).unwrap_or(0);
            return (idx, 0, 0);
        }

        let mut best: Option<(usize, u64)> = None;
        let mut second: Option<(usize, u64)> = None;
        for (i, c) in children.iter().enumerate() {
            let rd = c.ref_delta();
            match best {
                Some((_, b)) if rd >= b => {
                    if second.is_none_or(|(_, s)| rd < s) {
                        second = Some((i, rd));
                    }
                }
                _ => {
                    second = best;
                    best = Some((i, rd));
                }
            }
        }
        let (idx, _) = best.expect("expanded node has children");
        let child = &children[idx];

        let (_, node_delta) = node.pd();
        let tpc = (td as u64 + child.phi() as u64).saturating_sub(node_delta as u64).min((INF / 2) as u64) as u32;
        let tdc = match second {
            Some((j, _)) => {
                let widened = (children[j].delta() as f64 * (1.0 + self.settings.epsilon)) as u64 + 1;
                widened.min(tp as u64) as u32
            }
            None => tp,
        };
        (idx, tpc, tdc)
    }

    fn expand(&mut self, board: &Board, node_ref: NodeRef) -> bool {
        let node = self.arena.node(node_ref);
        if self.arena.memory_used() >= self.settings.mem_limit {
            return false;
        }
        let handle = node.children();
        if !handle.try_lock() {
            return false;
        }

        self.local.moves.clear();
        self.local.moves.extend(board.move_iter(true));
        // finished positions are always seeded terminal
        assert!(!self.local.moves.is_empty(), "expanding a position without moves:\n{board}");

        let Some(seg) = self.arena.alloc(self.local.moves.len() as u32, node_ref) else {
            handle.unlock();
            self.local.alloc_failed = true;
            return false;
        };

        let dists = (self.settings.lbdist && self.settings.ab == 0).then(|| LbDists::new(board));
        let children = self.arena.segment(seg);
        for (child, &mv) in children.iter().zip(&self.local.moves) {
            let (phi, delta) = seed_child(board, mv, &self.settings, self.store, dists.as_ref());
            child.init(mv, phi, delta);
        }
        handle.publish(seg);

        let (phi, delta) = combine(children);
        node.set_pd(phi, delta);
        true
    }
}

/// Initial (phi, delta) of the child reached by `mv`, from the exact result
/// of the move, the position store, or a shallow probe. Unresolved children
/// get the probe's node count (or the distance bound) as weight.
pub(crate) fn seed_child(
    board: &Board,
    mv: Move,
    settings: &PassSettings,
    store: Option<&dyn PositionStore>,
    dists: Option<&LbDists>,
) -> (u32, u32) {
    let mover = board.to_play();
    let mut weight = 1;

    let mut outcome = board.test_win(mv);
    if !outcome.is_decided() && mv.is_coord() {
        if let Some(rec) = store.and_then(|s| s.get(board.test_hash(mv))) {
            outcome = rec.outcome;
        }
    }
    if !outcome.is_decided() && settings.ab > 0 {
        let mut next = *board;
        if next.play_search(mv).is_ok() {
            let (probed, nodes) = alphabeta::mover_result(&next, settings.ab, mover);
            outcome = probed.unwrap_or(Outcome::Unknown);
            weight = nodes.max(1);
        }
    } else if let (Some(d), true) = (dists, mv.is_coord()) {
        weight = d.get_for(mv, mover).max(1);
    }

    match outcome {
        Outcome::Win(p) if p == mover => (LOSS, 0),
        Outcome::Win(_) => (0, LOSS),
        // the child's side to move is the mover's opponent
        Outcome::Draw if settings.assign == mover => (DRAW, 0),
        Outcome::Draw => (0, DRAW),
        Outcome::Unknown => {
            let w = weight.min(MAX_PN);
            (w, w)
        }
    }
}
