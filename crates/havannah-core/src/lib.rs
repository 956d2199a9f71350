//! Havannah solver core
//!
//! - [`board`]: 六角盤面、union-find による連結管理、勝利判定、対称性ハッシュ
//! - [`distance`]: 接続までの下界距離（探索の順序付け用）
//! - [`arena`]: 探索木用のセグメント化アリーナ（CAS bump 割り当て、フリーリスト、コンパクション）
//! - [`sync`]: ワーカースレッドの run / GC / stop 状態機械とタイマーサービス
//! - [`pns`]: 多スレッド depth-first proof-number search ソルバー
//! - [`mcts`]: UCT/RAVE プレイヤー
//! - [`record`]: 括弧付き棋譜形式の読み書き

pub mod arena;
pub mod board;
pub mod config;
pub mod distance;
pub mod error;
pub mod mcts;
pub mod pns;
pub mod record;
pub mod store;
pub mod sync;
pub mod types;
pub mod util;

pub use board::{Board, BoardOptions, MoveIterator};
pub use config::{CompactParams, PlayerConfig, SolverConfig};
pub use error::{ConfigError, MoveError, ParseError, RecordError, SearchError};
pub use mcts::{GenMoveResult, MctsPlayer};
pub use pns::{PnsSolver, SolveOutcome, SolveResult, TieMode};
pub use sync::TimerService;
pub use types::{Move, Outcome, Player, WinType};
