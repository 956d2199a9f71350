//! プレイヤーと勝敗

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// 手番（先手 = One, 後手 = Two）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Player {
    One = 1,
    Two = 2,
}

impl Player {
    /// プレイヤーの数
    pub const NUM: usize = 2;

    /// 相手番を返す
    #[inline]
    pub const fn opponent(self) -> Player {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }

    /// インデックスとして使用（配列アクセス用）
    #[inline]
    pub const fn index(self) -> usize {
        self as usize - 1
    }

    /// Cell の owner フィールド表現からの変換
    #[inline]
    pub const fn from_u8(v: u8) -> Option<Player> {
        match v {
            1 => Some(Player::One),
            2 => Some(Player::Two),
            _ => None,
        }
    }
}

impl std::ops::Not for Player {
    type Output = Player;

    #[inline]
    fn not(self) -> Player {
        self.opponent()
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Player::One => f.write_str("p1"),
            Player::Two => f.write_str("p2"),
        }
    }
}

/// Game result as seen from outside the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Outcome {
    #[default]
    Unknown,
    Draw,
    Win(Player),
}

impl Outcome {
    #[inline]
    pub const fn is_decided(self) -> bool {
        !matches!(self, Outcome::Unknown)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Outcome::Unknown => "unknown",
            Outcome::Draw => "draw",
            Outcome::Win(Player::One) => "p1",
            Outcome::Win(Player::Two) => "p2",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(Outcome::Unknown),
            "draw" => Ok(Outcome::Draw),
            "p1" => Ok(Outcome::Win(Player::One)),
            "p2" => Ok(Outcome::Win(Player::Two)),
            _ => Err(ParseError::InvalidOutcome(s.to_string())),
        }
    }
}

/// 勝ち方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WinType {
    #[default]
    None,
    /// 3 辺以上に接続
    Fork,
    /// 2 隅以上に接続
    Bridge,
    /// 少なくとも 1 マスを囲む環
    Ring,
}
