//! Worker side of the player: one rollout per step.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

use parking_lot::RwLock;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use super::node::{MctsNode, score};
use crate::arena::{Arena, ArenaNode, GcThreshold, NodeRef, collect_garbage};
use crate::board::{Board, MAX_CELLS};
use crate::config::PlayerConfig;
use crate::sync::{GcVerdict, RunControl, SearchTask, Step};
use crate::types::{Move, Outcome, Player};

#[derive(Debug, Default)]
pub(crate) struct PlayerStats {
    pub rollouts: AtomicU64,
    pub max_depth: AtomicUsize,
    pub gc_runs: AtomicU32,
}

impl PlayerStats {
    pub fn reset(&self) {
        self.rollouts.store(0, Ordering::Relaxed);
        self.max_depth.store(0, Ordering::Relaxed);
        self.gc_runs.store(0, Ordering::Relaxed);
    }
}

pub(crate) struct MctsTask {
    pub arena: RwLock<Arena<MctsNode>>,
    pub board: RwLock<Board>,
    pub config: RwLock<PlayerConfig>,
    pub mem_limit: AtomicU64,
    /// rollouts started in this run, checked against `max_runs`
    pub runs: AtomicU64,
    pub gc_limit: GcThreshold,
    pub stats: PlayerStats,
}

pub(crate) struct MctsLocal {
    rng: Xoshiro256PlusPlus,
    path: Vec<NodeRef>,
    moves: Vec<Move>,
}

enum Expand {
    Done,
    /// another worker holds the lock
    Busy,
    NoMemory,
}

impl MctsTask {
    pub fn new(board: Board, config: &PlayerConfig) -> Self {
        MctsTask {
            arena: RwLock::new(Arena::new(config.chunk_slots)),
            board: RwLock::new(board),
            config: RwLock::new(config.clone()),
            mem_limit: AtomicU64::new(u64::MAX),
            runs: AtomicU64::new(0),
            gc_limit: GcThreshold::new(config.gc_min),
            stats: PlayerStats::default(),
        }
    }
}

impl SearchTask for MctsTask {
    type Local = MctsLocal;

    fn make_local(&self, worker: usize) -> MctsLocal {
        let seed = self.config.read().seed ^ (worker as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
        MctsLocal {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            path: Vec::with_capacity(MAX_CELLS),
            moves: Vec::with_capacity(MAX_CELLS),
        }
    }

    fn step(&self, local: &mut MctsLocal, control: &RunControl) -> Step {
        let config = self.config.read().clone();
        let mem_limit = self.mem_limit.load(Ordering::Relaxed);
        let start = *self.board.read();
        let arena = self.arena.read();

        let Some(root) = arena.root() else {
            return Step::Finished;
        };
        if arena.node(root).proven().is_decided() {
            return Step::Finished;
        }
        if config.max_runs > 0 && self.runs.fetch_add(1, Ordering::Relaxed) >= config.max_runs {
            return Step::Finished;
        }

        let mut board = start;
        let mut need_gc = false;
        local.path.clear();
        local.path.push(root);
        let mut node_ref = root;

        while control.is_running() && !board.is_over() {
            let node = arena.node(node_ref);
            if node.proven().is_decided() {
                break;
            }
            if let Some((seg, children)) = arena.children_of(node) {
                let idx = select(children, node.visits(), board.to_play(), &config, &mut local.rng);
                board.play_search(children[idx].mv()).expect("tree move is legal in its position");
                node_ref = seg.node(idx);
                local.path.push(node_ref);
                continue;
            }
            if node.visits() < config.expand_visits {
                break;
            }
            if arena.memory_used() >= mem_limit {
                need_gc = true;
                break;
            }
            match expand(&arena, &board, node_ref, &mut local.moves) {
                Expand::Done => continue,
                Expand::Busy => break,
                Expand::NoMemory => {
                    need_gc = true;
                    break;
                }
            }
        }

        let leaf = arena.node(node_ref).proven();
        let result = if leaf.is_decided() { leaf } else { rollout(&mut board, &mut local.rng, &mut local.moves) };
        backup(&arena, &local.path, start.to_play(), &board, result, config.rave_factor > 0.0);
        backup_proof(&arena, &local.path, start.to_play());

        self.stats.rollouts.fetch_add(1, Ordering::Relaxed);
        self.stats.max_depth.fetch_max(local.path.len() - 1, Ordering::Relaxed);

        if arena.node(root).proven().is_decided() {
            Step::Finished
        } else if need_gc {
            Step::NeedGc
        } else {
            Step::Continue
        }
    }

    fn collect_garbage(&self) -> GcVerdict {
        let compact = self.config.read().compact;
        let mem_limit = self.mem_limit.load(Ordering::Relaxed);
        let mut arena = self.arena.write();
        let limit = self.gc_limit.get();
        let report =
            collect_garbage(&mut arena, |n| n.proven().is_decided() || u64::from(n.visits()) < limit, compact);
        let next = self.gc_limit.adapt(report.after, mem_limit);
        self.stats.gc_runs.fetch_add(1, Ordering::Relaxed);

        log::info!(
            "mcts gc: limit {limit} -> {next}, kept {}% of tree ({} -> {} bytes), prune {:?}, compact {:?}",
            report.kept_percent(),
            report.before,
            report.after,
            report.prune_time,
            report.compact_time,
        );
        if report.exhausted {
            log::warn!("mcts gc: reclaimed under 1% of the tree, ending search");
            GcVerdict::Exhausted
        } else {
            GcVerdict::Resume
        }
    }
}

/// Child with the highest UCT/RAVE value. Scanning starts at a random
/// offset so equal values spread across workers.
pub(crate) fn select<R: Rng>(
    children: &[MctsNode],
    parent_visits: u32,
    side: Player,
    config: &PlayerConfig,
    rng: &mut R,
) -> usize {
    let len = children.len();
    let offset = rng.random_range(0..len);
    let log_n = f64::from(parent_visits.max(1)).ln();

    let mut best = offset;
    let mut best_value = f64::NEG_INFINITY;
    for k in 0..len {
        let i = (offset + k) % len;
        let value = child_value(&children[i], side, log_n, config);
        if value > best_value {
            best = i;
            best_value = value;
        }
    }
    best
}

/// Value of `child` for `side`, the player choosing among the children.
fn child_value(child: &MctsNode, side: Player, log_n: f64, config: &PlayerConfig) -> f64 {
    match child.proven() {
        Outcome::Win(p) if p == side => return f64::INFINITY,
        Outcome::Win(_) => return -1.0,
        Outcome::Draw => return 0.5,
        Outcome::Unknown => {}
    }

    let n = child.visits();
    if n == 0 {
        return config.fpurgency;
    }
    let mut value = child.exp.avg();
    if config.rave_factor > 0.0 && child.rave.num() > 0 {
        let beta = config.rave_factor / (config.rave_factor + f64::from(n));
        value = (1.0 - beta) * value + beta * child.rave.avg();
    }
    if config.explore > 0.0 {
        value += config.explore * (log_n / f64::from(n)).sqrt();
    }
    value
}

fn expand(arena: &Arena<MctsNode>, board: &Board, node_ref: NodeRef, moves: &mut Vec<Move>) -> Expand {
    let node = arena.node(node_ref);
    if !node.children().try_lock() {
        return Expand::Busy;
    }
    moves.clear();
    moves.extend(board.move_iter(false));
    assert!(!moves.is_empty(), "expanding a finished position");

    let Some(seg) = arena.alloc(moves.len() as u32, node_ref) else {
        node.children().unlock();
        return Expand::NoMemory;
    };
    for (child, &mv) in arena.segment(seg).iter().zip(moves.iter()) {
        child.init(mv, board.test_win(mv));
    }
    node.children().publish(seg);
    Expand::Done
}

/// Play random moves to the end of the game.
pub(crate) fn rollout<R: Rng>(board: &mut Board, rng: &mut R, moves: &mut Vec<Move>) -> Outcome {
    if board.is_over() {
        return board.winner();
    }
    moves.clear();
    moves.extend(board.move_iter(false).filter(|m| m.is_coord()));
    moves.shuffle(rng);
    for &mv in moves.iter() {
        board.play_search(mv).expect("rollout cell is empty");
        if board.is_over() {
            break;
        }
    }
    match board.winner() {
        Outcome::Unknown => Outcome::Draw,
        o => o,
    }
}

/// Side that moved into `path[depth]`.
#[inline]
fn mover_at(to_play: Player, depth: usize) -> Player {
    if depth % 2 == 0 { to_play.opponent() } else { to_play }
}

/// Add the rollout result along `path`. With RAVE, every child whose cell
/// the side to move ended up owning gets an all-moves-as-first update.
fn backup(arena: &Arena<MctsNode>, path: &[NodeRef], to_play: Player, end: &Board, result: Outcome, rave: bool) {
    for (depth, &r) in path.iter().enumerate() {
        let node = arena.node(r);
        let mover = mover_at(to_play, depth);
        node.exp.add(score(result, mover));

        if !rave {
            continue;
        }
        let side = mover.opponent();
        let Some((_, children)) = arena.children_of(node) else { continue };
        let points = score(result, side);
        for child in children {
            if end.owner(child.mv()) == Some(side) {
                child.rave.add(points);
            }
        }
    }
}

/// Propagate proven outcomes from the deepest node up.
fn backup_proof(arena: &Arena<MctsNode>, path: &[NodeRef], to_play: Player) {
    for (depth, &r) in path.iter().enumerate().rev() {
        let node = arena.node(r);
        if node.proven().is_decided() {
            continue;
        }
        let Some((_, children)) = arena.children_of(node) else { break };
        let side = mover_at(to_play, depth).opponent();

        let mut all_proven = true;
        let mut any_draw = false;
        let mut proven = Outcome::Unknown;
        for child in children {
            match child.proven() {
                Outcome::Win(p) if p == side => {
                    proven = Outcome::Win(side);
                    break;
                }
                Outcome::Win(_) => {}
                Outcome::Draw => any_draw = true,
                Outcome::Unknown => all_proven = false,
            }
        }
        if !proven.is_decided() && all_proven {
            proven = if any_draw { Outcome::Draw } else { Outcome::Win(side.opponent()) };
        }
        if !proven.is_decided() {
            break;
        }
        node.set_proven(proven);
    }
}
