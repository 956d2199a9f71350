//! 基本型（指し手・プレイヤー・勝敗）

mod moves;
mod player;

pub use moves::Move;
pub use player::{Outcome, Player, WinType};
