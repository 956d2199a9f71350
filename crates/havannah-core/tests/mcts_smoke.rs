//! Player scenarios: proven wins, run budgets, tree reuse and GC.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use havannah_core::mcts::{GenMoveResult, MctsPlayer};
use havannah_core::record::{parse_sgf, write_sgf};
use havannah_core::{BoardOptions, ConfigError, Move, Outcome, Player, PlayerConfig, TimerService};

const LONG: Duration = Duration::from_secs(30);

fn mv(x: i8, y: i8) -> Move {
    Move::new(x, y)
}

fn player(size: usize, config: PlayerConfig) -> MctsPlayer {
    MctsPlayer::new(BoardOptions::with_size(size), config, Arc::new(TimerService::new())).unwrap()
}

fn budget(runs: u64) -> PlayerConfig {
    PlayerConfig { max_runs: runs, chunk_slots: 4096, ..PlayerConfig::default() }
}

fn assert_legal(p: &MctsPlayer, r: &GenMoveResult) {
    assert!(p.board().valid_move(r.best), "{} is not legal", r.best);
}

#[test]
fn test_finds_the_fork() {
    let moves = [mv(1, 1), mv(5, 5), mv(1, 0), mv(3, 3), mv(0, 1), mv(5, 2), mv(1, 2), mv(3, 6), mv(1, 3), mv(6, 4)];
    let mut p = player(4, budget(1_000));
    p.set_position(&moves).unwrap();
    let r = p.genmove(LONG, u64::MAX);
    assert_eq!(r.best, mv(1, 4));
    assert_eq!(r.outcome, Outcome::Win(Player::One));
    assert_eq!(r.pv.first(), Some(&mv(1, 4)));
}

#[test]
fn test_run_budget_stops_search() {
    let mut p = player(5, budget(300));
    let r = p.genmove(LONG, u64::MAX);
    assert_eq!(r.rollouts, 300);
    assert!(r.elapsed < LONG);
    assert_legal(&p, &r);
    assert!(r.visits > 0);
    assert!((0.0..=1.0).contains(&r.value));
}

#[test]
fn test_several_threads_share_the_tree() {
    let config = PlayerConfig { threads: 4, explore: 0.3, ..budget(2_000) };
    let mut p = player(5, config);
    let r = p.genmove(LONG, u64::MAX);
    assert!(r.rollouts >= 2_000);
    assert!(r.nodes > 1);
    assert_legal(&p, &r);
}

#[test]
fn test_play_keeps_the_subtree() {
    let mut p = player(5, budget(2_000));
    let r = p.genmove(LONG, u64::MAX);
    let before = p.tree_size();
    p.play(r.best).unwrap();
    let after = p.tree_size();
    assert!(after > 1, "subtree of {} was dropped", r.best);
    assert!(after < before);
    assert_eq!(p.history(), &[r.best]);

    let next = p.genmove(LONG, u64::MAX);
    assert_legal(&p, &next);
}

#[test]
fn test_play_without_reuse_clears() {
    let mut p = player(5, PlayerConfig { keep_tree: false, ..budget(500) });
    let r = p.genmove(LONG, u64::MAX);
    p.play(r.best).unwrap();
    assert_eq!(p.tree_size(), 0);
}

#[test]
fn test_memory_limit_triggers_gc() {
    let config = PlayerConfig { threads: 2, chunk_slots: 1024, ..budget(5_000) };
    let mut p = player(6, config);
    let r = p.genmove(Duration::from_secs(5), 64 * 1024);
    assert!(r.gc_runs >= 1);
    assert_legal(&p, &r);
}

#[test]
fn test_gc_with_several_threads_returns_on_time() {
    let budget = Duration::from_millis(400);
    let (tx, rx) = crossbeam_channel::bounded(1);
    thread::spawn(move || {
        let config = PlayerConfig { threads: 4, chunk_slots: 1024, ..PlayerConfig::default() };
        let mut p = player(6, config);
        let results: Vec<_> = (0..3).map(|_| p.genmove(budget, 64 * 1024)).collect();
        let legal = results.iter().all(|r| p.board().valid_move(r.best));
        let _ = tx.send((results, legal));
    });
    let (results, legal) = rx.recv_timeout(Duration::from_secs(60)).expect("4-thread genmove under a 64 KiB limit hung");
    assert!(legal);
    assert!(results.iter().any(|r| r.gc_runs >= 1), "{results:?}");
    for r in &results {
        assert!(r.elapsed < budget + Duration::from_secs(10), "{r:?}");
    }
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = PlayerConfig { chunk_slots: 100, ..PlayerConfig::default() };
    let err = MctsPlayer::new(BoardOptions::with_size(4), config, Arc::new(TimerService::new())).err();
    assert!(matches!(err, Some(ConfigError::Invalid { field: "player.chunk_slots", .. })), "{err:?}");

    let config = PlayerConfig { expand_visits: 0, ..PlayerConfig::default() };
    assert!(MctsPlayer::new(BoardOptions::with_size(4), config, Arc::new(TimerService::new())).is_err());
}

#[test]
fn test_finished_game_has_no_move() {
    let moves = [mv(0, 0), mv(3, 3), mv(1, 0), mv(5, 5), mv(2, 0), mv(4, 4), mv(3, 0)];
    let mut p = player(4, budget(100));
    p.set_position(&moves).unwrap();
    let r = p.genmove(LONG, u64::MAX);
    assert_eq!(r.best, Move::NONE);
    assert_eq!(r.outcome, Outcome::Win(Player::One));
    assert_eq!(r.rollouts, 0);
}

#[test]
fn test_export_record_round_trip() {
    let mut p = player(4, budget(500));
    p.set_position(&[mv(3, 3)]).unwrap();
    p.genmove(LONG, u64::MAX);

    let record = p.export_record(10);
    assert_eq!(record.moves, vec![mv(3, 3)]);
    assert!(!record.tree.is_empty());
    assert!(record.tree.iter().all(|n| n.visits >= 10 && n.mover == Player::Two));

    let parsed = parse_sgf(&write_sgf(&record)).unwrap();
    assert_eq!(parsed.moves, record.moves);
    assert_eq!(parsed.tree.len(), record.tree.len());

    let mut fresh = player(4, budget(10));
    fresh.import_record(&parsed).unwrap();
    assert_eq!(fresh.board().num_moves(), 1);
    assert_eq!(fresh.tree_size(), 0);
}
