//! Monte-Carlo tree search player (UCT with RAVE).
//!
//! Shares the arena, worker pool and GC protocol with the solver. Proven
//! wins and losses found at expansion are backed up through the tree, and
//! the subtree of a played move is kept as the next root.

mod node;
mod search;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

pub use self::node::{MctsNode, Stat};
use self::search::MctsTask;
use crate::arena::{Arena, NodeRef};
use crate::board::{Board, BoardOptions};
use crate::config::PlayerConfig;
use crate::error::{ConfigResult, MoveResult, RecordResult};
use crate::record::{GameRecord, RecordNode};
use crate::sync::{TimerService, WorkerPool};
use crate::types::{Move, Outcome, Player};

#[derive(Debug, Clone, PartialEq)]
pub struct GenMoveResult {
    /// `Move::NONE` once the game is over
    pub best: Move,
    /// proven result of the position, if any
    pub outcome: Outcome,
    /// mean score of `best` for the side to move
    pub value: f64,
    /// visits of `best`
    pub visits: u32,
    pub rollouts: u64,
    pub nodes: u64,
    pub max_depth: usize,
    pub gc_runs: u32,
    pub pv: Vec<Move>,
    pub elapsed: Duration,
}

pub struct MctsPlayer {
    opts: BoardOptions,
    history: Vec<Move>,
    config: PlayerConfig,
    timer: Arc<TimerService>,
    pool: WorkerPool<MctsTask>,
}

impl MctsPlayer {
    pub fn new(opts: BoardOptions, config: PlayerConfig, timer: Arc<TimerService>) -> ConfigResult<Self> {
        opts.validate()?;
        config.validate()?;
        let board = Board::with_options(opts);
        let task = Arc::new(MctsTask::new(board, &config));
        let pool = WorkerPool::new("mcts", task, config.threads);
        Ok(MctsPlayer { opts, history: Vec::new(), config, timer, pool })
    }

    fn task(&self) -> &MctsTask {
        self.pool.task()
    }

    pub fn board(&self) -> Board {
        *self.task().board.read()
    }

    pub fn history(&self) -> &[Move] {
        &self.history
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Worker seeds only take effect for workers spawned afterwards.
    pub fn set_config(&mut self, config: PlayerConfig) -> ConfigResult<()> {
        config.validate()?;
        *self.task().config.write() = config.clone();
        self.pool.set_threads(config.threads);
        self.config = config;
        Ok(())
    }

    pub fn set_position(&mut self, moves: &[Move]) -> MoveResult<()> {
        let board = Board::from_moves(self.opts, moves)?;
        *self.task().board.write() = board;
        self.history = moves.to_vec();
        self.clear_tree();
        Ok(())
    }

    /// Play `mv`. With `keep_tree` the matching child becomes the new root.
    pub fn play(&mut self, mv: Move) -> MoveResult<()> {
        let mut board = self.board();
        board.play(mv)?;
        *self.task().board.write() = board;
        self.history.push(mv);

        let kept = self.config.keep_tree && {
            let arena = self.task().arena.read();
            match find_child(&arena, mv) {
                Some(child) => arena.promote_to_root(child).is_some(),
                None => false,
            }
        };
        if kept {
            log::debug!("mcts: kept subtree of {mv}, {} slots live", self.tree_size());
        } else {
            self.clear_tree();
        }
        Ok(())
    }

    fn clear_tree(&mut self) {
        self.task().arena.write().clear();
        self.task().gc_limit.reset();
    }

    pub fn tree_size(&self) -> u64 {
        self.task().arena.read().live_slots()
    }

    /// Search for `time` with at most `memory` bytes of tree and pick a move.
    pub fn genmove(&mut self, time: Duration, memory: u64) -> GenMoveResult {
        let start = Instant::now();
        let board = self.board();
        let task = self.task();
        task.stats.reset();
        task.runs.store(0, Ordering::Relaxed);
        task.mem_limit.store(memory, Ordering::Relaxed);

        if board.is_over() {
            return GenMoveResult {
                best: Move::NONE,
                outcome: board.winner(),
                value: 0.0,
                visits: 0,
                rollouts: 0,
                nodes: self.tree_size(),
                max_depth: 0,
                gc_runs: 0,
                pv: Vec::new(),
                elapsed: start.elapsed(),
            };
        }

        let root = task.arena.read().ensure_root();
        match root {
            Some(root) => {
                let proven = task.arena.read().node(root).proven().is_decided();
                if !proven && !time.is_zero() {
                    if let Err(err) = self.pool.run(&self.timer, time) {
                        log::error!("mcts search aborted: {err}");
                        task.arena.write().clear();
                        task.gc_limit.reset();
                    }
                }
            }
            None => log::warn!("mcts: no room for the root node"),
        }

        let side = board.to_play();
        let (outcome, best, value, visits, pv) = {
            let arena = task.arena.read();
            match arena.root() {
                Some(root) => {
                    let node = arena.node(root);
                    match arena.children_of(node).and_then(|(_, c)| best_child(c, side)) {
                        Some(child) => (
                            node.proven(),
                            child.mv(),
                            child.exp.avg(),
                            child.visits(),
                            principal_variation(&arena, root, side),
                        ),
                        None => (node.proven(), Move::NONE, 0.0, 0, Vec::new()),
                    }
                }
                None => (Outcome::Unknown, Move::NONE, 0.0, 0, Vec::new()),
            }
        };
        let best = if best == Move::NONE { board.move_iter(false).next().unwrap_or(Move::NONE) } else { best };

        let stats = &task.stats;
        let result = GenMoveResult {
            best,
            outcome,
            value,
            visits,
            rollouts: stats.rollouts.load(Ordering::Relaxed),
            nodes: self.tree_size(),
            max_depth: stats.max_depth.load(Ordering::Relaxed),
            gc_runs: stats.gc_runs.load(Ordering::Relaxed),
            pv,
            elapsed: start.elapsed(),
        };
        log::info!(
            "mcts genmove: {} ({:.3}, {} visits) after {:?}, {} rollouts, {} nodes, depth {}, {} gc",
            result.best,
            result.value,
            result.visits,
            result.elapsed,
            result.rollouts,
            result.nodes,
            result.max_depth,
            result.gc_runs
        );
        result
    }

    /// Most visited line through the tree.
    pub fn principal_variation(&self) -> Vec<Move> {
        let side = self.board().to_play();
        let arena = self.task().arena.read();
        arena.root().map(|root| principal_variation(&arena, root, side)).unwrap_or_default()
    }

    /// Export the tree, keeping children with at least `min_visits` rollouts.
    pub fn export_record(&self, min_visits: u32) -> GameRecord {
        let board = self.board();
        let arena = self.task().arena.read();
        let mut record = GameRecord::new(board.size());
        record.moves = self.history.clone();
        if let Some(root) = arena.root() {
            record.tree = export_children(&arena, arena.node(root), board.to_play(), min_visits);
        }
        record
    }

    /// Load the position of `record`. The search tree starts empty.
    pub fn import_record(&mut self, record: &GameRecord) -> RecordResult<()> {
        let board = record.replay(self.opts)?;
        *self.task().board.write() = board;
        self.history = record.moves.clone();
        self.clear_tree();
        Ok(())
    }
}

fn find_child(arena: &Arena<MctsNode>, mv: Move) -> Option<NodeRef> {
    let root = arena.root()?;
    let (seg, children) = arena.children_of(arena.node(root))?;
    children.iter().position(|c| c.mv() == mv).map(|i| seg.node(i))
}

/// A proven win if there is one, otherwise the most visited child that is
/// not a proven loss.
fn best_child(children: &[MctsNode], side: Player) -> Option<&MctsNode> {
    if let Some(win) = children.iter().find(|c| c.proven() == Outcome::Win(side)) {
        return Some(win);
    }
    children
        .iter()
        .filter(|c| c.proven() != Outcome::Win(side.opponent()))
        .max_by_key(|c| c.visits())
        .or_else(|| children.iter().max_by_key(|c| c.visits()))
}

fn principal_variation(arena: &Arena<MctsNode>, root: NodeRef, mut side: Player) -> Vec<Move> {
    let mut pv = Vec::new();
    let mut node = arena.node(root);
    while let Some((_, children)) = arena.children_of(node) {
        let Some(child) = best_child(children, side) else { break };
        if child.visits() == 0 && !child.proven().is_decided() {
            break;
        }
        pv.push(child.mv());
        node = child;
        side = side.opponent();
    }
    pv
}

fn export_children(arena: &Arena<MctsNode>, node: &MctsNode, mover: Player, min_visits: u32) -> Vec<RecordNode> {
    let Some((_, children)) = arena.children_of(node) else {
        return Vec::new();
    };
    children
        .iter()
        .filter(|c| c.visits() >= min_visits)
        .map(|c| {
            let mut rn = RecordNode::new(c.mv(), mover);
            rn.visits = u64::from(c.visits());
            rn.outcome = c.proven();
            rn.children = export_children(arena, c, mover.opponent(), min_visits);
            rn
        })
        .collect()
}
