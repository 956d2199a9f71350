//! Multi-threaded depth-first proof-number search.
//!
//! Workers share one tree in an [`Arena`](crate::arena::Arena). Each run is a
//! pass with draws counted as wins for one side; [`TieMode::Both`] runs a
//! pass for each side and merges them with [`combine_passes`].

mod alphabeta;
mod node;
mod outcome;
mod search;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

pub use self::alphabeta::{Probe, probe};
pub use self::node::{DRAW, INF, LOSS, PnsNode, combine};
pub use self::outcome::{PassOutcome, SolveOutcome, combine_passes};
use self::search::{PassSettings, PnsTask, seed_child};
use crate::arena::{Arena, ArenaNode, NodeRef};
use crate::board::{Board, BoardOptions};
use crate::config::SolverConfig;
use crate::error::{ConfigResult, MoveResult, RecordResult};
use crate::record::{GameRecord, RecordNode};
use crate::store::{PositionStore, StoreRecord, reconcile};
use crate::sync::{TimerService, WorkerPool};
use crate::types::{Move, Player};

/// Which side draws are counted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TieMode {
    /// one pass per side, merged
    Both,
    Assign(Player),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveResult {
    pub outcome: SolveOutcome,
    /// `Move::NONE` when no move could be recommended
    pub best: Move,
    pub pv: Vec<Move>,
    /// live tree slots at the end
    pub nodes: u64,
    pub iterations: u64,
    pub max_depth: usize,
    pub gc_runs: u32,
    pub elapsed: Duration,
}

/// Root result of one pass.
#[derive(Debug, Clone)]
struct PassReport {
    outcome: PassOutcome,
    best: Move,
    pv: Vec<Move>,
}

pub struct PnsSolver {
    opts: BoardOptions,
    history: Vec<Move>,
    config: SolverConfig,
    timer: Arc<TimerService>,
    pool: WorkerPool<PnsTask>,
    /// draw assignment the current tree was built with
    tree_assign: Option<Player>,
}

impl PnsSolver {
    /// Fails without spawning workers if `opts` or `config` is out of range.
    pub fn new(opts: BoardOptions, config: SolverConfig, timer: Arc<TimerService>) -> ConfigResult<Self> {
        opts.validate()?;
        config.validate()?;
        let board = Board::with_options(opts);
        let task = Arc::new(PnsTask::new(board, &config));
        let pool = WorkerPool::new("pns", task, config.threads);
        Ok(PnsSolver { opts, history: Vec::new(), config, timer, pool, tree_assign: None })
    }

    fn task(&self) -> &PnsTask {
        self.pool.task()
    }

    pub fn board(&self) -> Board {
        *self.task().board.read()
    }

    pub fn history(&self) -> &[Move] {
        &self.history
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SolverConfig) -> ConfigResult<()> {
        config.validate()?;
        self.pool.set_threads(config.threads);
        if config.ties != self.config.ties || config.df != self.config.df {
            self.clear_tree();
        }
        self.config = config;
        Ok(())
    }

    pub fn set_store(&mut self, store: Option<Arc<dyn PositionStore>>) {
        *self.task().store.write() = store;
    }

    /// Start over from the position after `moves`.
    pub fn set_position(&mut self, moves: &[Move]) -> MoveResult<()> {
        let board = Board::from_moves(self.opts, moves)?;
        self.install(board, moves.to_vec());
        Ok(())
    }

    pub fn play(&mut self, mv: Move) -> MoveResult<()> {
        let mut board = self.board();
        board.play(mv)?;
        let mut history = std::mem::take(&mut self.history);
        history.push(mv);
        self.install(board, history);
        Ok(())
    }

    fn install(&mut self, board: Board, history: Vec<Move>) {
        *self.task().board.write() = board;
        self.history = history;
        self.clear_tree();
    }

    fn clear_tree(&mut self) {
        self.task().arena.write().clear();
        self.task().gc_limit.reset();
        self.tree_assign = None;
    }

    /// Live slots of the search tree.
    pub fn tree_size(&self) -> u64 {
        self.task().arena.read().live_slots()
    }

    /// Solve the current position within `time` and `memory` bytes of tree.
    pub fn solve(&mut self, time: Duration, memory: u64) -> SolveResult {
        let start = Instant::now();
        let deadline = start + time;
        let board = self.board();
        let me = board.to_play();
        self.task().stats.reset();

        let (outcome, report) = if board.is_over() {
            let outcome = SolveOutcome::from_outcome(board.winner(), me);
            (outcome, PassReport { outcome: PassOutcome::Unknown, best: Move::NONE, pv: Vec::new() })
        } else {
            match self.config.ties {
                TieMode::Assign(p) => {
                    let r = self.run_pass(p, deadline, memory);
                    let outcome = if p == me {
                        combine_passes(Some(r.outcome), None)
                    } else {
                        combine_passes(None, Some(r.outcome))
                    };
                    (outcome, r)
                }
                TieMode::Both => {
                    let a = self.run_pass(me, deadline, memory);
                    if a.outcome.is_decisive() || Instant::now() >= deadline {
                        (combine_passes(Some(a.outcome), None), a)
                    } else {
                        let b = self.run_pass(me.opponent(), deadline, memory);
                        let outcome = combine_passes(Some(a.outcome), Some(b.outcome));
                        let keep_a = matches!(outcome, SolveOutcome::Draw | SolveOutcome::WinOrDraw)
                            || (outcome == SolveOutcome::WinCurrent && a.outcome == PassOutcome::Win);
                        (outcome, if keep_a { a } else { b })
                    }
                }
            }
        };

        if outcome.is_exact() {
            self.record_result(&board, outcome, report.best);
        }

        let stats = &self.task().stats;
        let result = SolveResult {
            outcome,
            best: report.best,
            pv: report.pv,
            nodes: self.tree_size(),
            iterations: stats.iterations.load(Ordering::Relaxed),
            max_depth: stats.max_depth.load(Ordering::Relaxed),
            gc_runs: stats.gc_runs.load(Ordering::Relaxed),
            elapsed: start.elapsed(),
        };
        log::info!(
            "pns solve: {} best {} after {:?}, {} iterations, {} nodes, depth {}, {} gc",
            result.outcome,
            result.best,
            result.elapsed,
            result.iterations,
            result.nodes,
            result.max_depth,
            result.gc_runs
        );
        result
    }

    fn record_result(&self, board: &Board, outcome: SolveOutcome, best: Move) {
        let Some(store) = self.task().store.read().clone() else { return };
        let hash = board.hash();
        let fresh = outcome.to_outcome(board.to_play());
        if reconcile(store.as_ref(), hash, fresh) {
            let work = {
                let arena = self.task().arena.read();
                arena.root().map_or(0, |r| arena.node(r).work())
            };
            store.set(hash, StoreRecord { outcome: fresh, work, best });
        }
    }

    fn run_pass(&mut self, assign: Player, deadline: Instant, memory: u64) -> PassReport {
        if self.tree_assign != Some(assign) {
            self.clear_tree();
            self.tree_assign = Some(assign);
        }
        *self.task().settings.write() = PassSettings::new(&self.config, assign, memory);

        let root = self.task().arena.read().ensure_root();
        let Some(root) = root else {
            log::warn!("pns: no room for the root node");
            return PassReport { outcome: PassOutcome::Unknown, best: Move::NONE, pv: Vec::new() };
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        let terminal = self.task().arena.read().node(root).is_terminal();
        if !terminal && !remaining.is_zero() {
            if let Err(err) = self.pool.run(&self.timer, remaining) {
                log::error!("pns pass aborted: {err}");
                self.clear_tree();
                return PassReport { outcome: PassOutcome::Unknown, best: Move::NONE, pv: Vec::new() };
            }
        }

        let board = self.board();
        let arena = self.task().arena.read();
        let report = match arena.root() {
            Some(root) => {
                let (phi, delta) = arena.node(root).pd();
                let pv = principal_variation(&arena, root, &board);
                PassReport { outcome: PassOutcome::from_pd(phi, delta), best: pv.first().copied().unwrap_or(Move::NONE), pv }
            }
            None => PassReport { outcome: PassOutcome::Unknown, best: Move::NONE, pv: Vec::new() },
        };
        log::debug!("pns pass (draws to {assign}): {:?}, best {}", report.outcome, report.best);
        report
    }

    /// Best line through the current tree.
    pub fn principal_variation(&self) -> Vec<Move> {
        let board = self.board();
        let arena = self.task().arena.read();
        arena.root().map(|root| principal_variation(&arena, root, &board)).unwrap_or_default()
    }

    /// Export the tree, keeping children with at least `min_work` descents.
    pub fn export_record(&self, min_work: u64) -> GameRecord {
        let board = self.board();
        let arena = self.task().arena.read();
        let mut record = GameRecord::new(board.size());
        record.moves = self.history.clone();
        if let Some(root) = arena.root() {
            record.tree = export_children(&arena, arena.node(root), board.to_play(), min_work);
        }
        record
    }

    /// Replace the position and tree with `record`.
    pub fn import_record(&mut self, record: &GameRecord) -> RecordResult<()> {
        let board = record.replay(self.opts)?;
        self.install(board, record.moves.clone());
        let assign = match self.config.ties {
            TieMode::Assign(p) => p,
            TieMode::Both => board.to_play(),
        };
        self.tree_assign = Some(assign);
        let settings = PassSettings::new(&self.config, assign, u64::MAX);
        *self.task().settings.write() = settings;

        let arena = self.task().arena.read();
        if let Some(root) = arena.ensure_root() {
            import_children(&arena, &board, root, &record.tree, &settings);
        }
        Ok(())
    }
}

/// Child to follow from `board` whose pass result is `pass`.
///
/// Among proven children a move that ends the game on the spot comes first,
/// then the one that took the least work to prove.
fn best_child<'a>(board: &Board, children: &'a [PnsNode], pass: PassOutcome) -> Option<&'a PnsNode> {
    let quickest = |c: &&PnsNode| (!board.test_win(c.mv()).is_decided(), c.work());
    match pass {
        PassOutcome::Win => children.iter().filter(|c| c.pd() == (LOSS, 0)).min_by_key(quickest),
        PassOutcome::DrawWin => children.iter().filter(|c| c.delta() == 0).min_by_key(quickest),
        PassOutcome::Loss | PassOutcome::DrawLoss => children.iter().max_by_key(|c| c.work()),
        PassOutcome::Unknown => {
            children.iter().min_by(|a, b| a.delta().cmp(&b.delta()).then(b.work().cmp(&a.work())))
        }
    }
}

fn principal_variation(arena: &Arena<PnsNode>, root: NodeRef, board: &Board) -> Vec<Move> {
    let mut pv = Vec::new();
    let mut board = *board;
    let mut node = arena.node(root);
    while let Some((_, children)) = arena.children_of(node) {
        let (phi, delta) = node.pd();
        let Some(child) = best_child(&board, children, PassOutcome::from_pd(phi, delta)) else { break };
        pv.push(child.mv());
        if board.play_search(child.mv()).is_err() {
            break;
        }
        node = child;
    }
    pv
}

fn export_children(arena: &Arena<PnsNode>, node: &PnsNode, mover: Player, min_work: u64) -> Vec<RecordNode> {
    let Some((_, children)) = arena.children_of(node) else {
        return Vec::new();
    };
    children
        .iter()
        .filter(|c| c.work() >= min_work)
        .map(|c| {
            let mut rn = RecordNode::new(c.mv(), mover);
            rn.visits = c.work();
            rn.outcome = c.outcome(mover);
            rn.proof = Some(c.pd());
            rn.children = export_children(arena, c, mover.opponent(), min_work);
            rn
        })
        .collect()
}

fn import_children(
    arena: &Arena<PnsNode>,
    board: &Board,
    node_ref: NodeRef,
    records: &[RecordNode],
    settings: &PassSettings,
) {
    if records.is_empty() || board.is_over() {
        return;
    }
    let node = arena.node(node_ref);
    if !node.children().try_lock() {
        return;
    }
    let moves: Vec<Move> = board.move_iter(true).collect();
    let Some(seg) = arena.alloc(moves.len() as u32, node_ref) else {
        node.children().unlock();
        return;
    };
    let children = arena.segment(seg);
    for (child, &mv) in children.iter().zip(&moves) {
        let (phi, delta) = seed_child(board, mv, settings, None, None);
        child.init(mv, phi, delta);
    }
    node.children().publish(seg);

    for rec in records {
        let Some(i) = moves.iter().position(|&m| m == rec.mv) else {
            log::debug!("import: {} is not a move of this position", rec.mv);
            continue;
        };
        let child = &children[i];
        child.set_work(rec.visits);
        // a move that ends the game keeps its exact value
        if board.test_win(rec.mv).is_decided() || child.is_terminal() {
            continue;
        }
        if let Some((phi, delta)) = rec.proof {
            child.force_pd(phi, delta);
        }
        let mut next = *board;
        if next.play_search(rec.mv).is_ok() {
            import_children(arena, &next, seg.node(i), &rec.children, settings);
        }
    }

    let (phi, delta) = combine(children);
    node.set_pd(phi, delta);
}
