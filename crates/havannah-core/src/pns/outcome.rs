use std::fmt;

use super::node::{DRAW, LOSS};
use crate::types::{Outcome, Player};

/// Result of a solve, from the side to move at the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolveOutcome {
    WinCurrent,
    LossCurrent,
    Draw,
    WinOrDraw,
    LossOrDraw,
    /// budget ran out
    Unknown,
}

impl SolveOutcome {
    /// Exact result known.
    pub fn is_exact(self) -> bool {
        matches!(self, SolveOutcome::WinCurrent | SolveOutcome::LossCurrent | SolveOutcome::Draw)
    }

    /// Game outcome when exact.
    pub fn to_outcome(self, current: Player) -> Outcome {
        match self {
            SolveOutcome::WinCurrent => Outcome::Win(current),
            SolveOutcome::LossCurrent => Outcome::Win(current.opponent()),
            SolveOutcome::Draw => Outcome::Draw,
            _ => Outcome::Unknown,
        }
    }

    pub fn from_outcome(outcome: Outcome, current: Player) -> SolveOutcome {
        match outcome {
            Outcome::Win(p) if p == current => SolveOutcome::WinCurrent,
            Outcome::Win(_) => SolveOutcome::LossCurrent,
            Outcome::Draw => SolveOutcome::Draw,
            Outcome::Unknown => SolveOutcome::Unknown,
        }
    }
}

impl fmt::Display for SolveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SolveOutcome::WinCurrent => "win",
            SolveOutcome::LossCurrent => "loss",
            SolveOutcome::Draw => "draw",
            SolveOutcome::WinOrDraw => "win-or-draw",
            SolveOutcome::LossOrDraw => "loss-or-draw",
            SolveOutcome::Unknown => "unknown",
        })
    }
}

/// Root result of one pass, with draws assigned to one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Win,
    /// win that relies on an assigned draw
    DrawWin,
    Loss,
    /// loss that relies on an assigned draw
    DrawLoss,
    Unknown,
}

impl PassOutcome {
    pub fn from_pd(phi: u32, delta: u32) -> PassOutcome {
        match (phi, delta) {
            (0, LOSS) => PassOutcome::Win,
            (0, DRAW) => PassOutcome::DrawWin,
            (LOSS, 0) => PassOutcome::Loss,
            (DRAW, 0) => PassOutcome::DrawLoss,
            _ => PassOutcome::Unknown,
        }
    }

    /// No second pass can change this.
    pub fn is_decisive(self) -> bool {
        matches!(self, PassOutcome::Win | PassOutcome::Loss)
    }
}

/// Merge the pass with draws given to the root mover (`mine`) and the pass
/// with draws given to the opponent (`theirs`). A pass that did not run is
/// `None`.
///
/// | mine    | theirs   | result     |
/// |---------|----------|------------|
/// | Win     | any      | WinCurrent |
/// | any     | Win      | WinCurrent |
/// | Loss    | any      | LossCurrent|
/// | any     | Loss     | LossCurrent|
/// | DrawWin | DrawLoss | Draw       |
/// | DrawWin | other    | WinOrDraw  |
/// | other   | DrawLoss | LossOrDraw |
/// | other   | other    | Unknown    |
pub fn combine_passes(mine: Option<PassOutcome>, theirs: Option<PassOutcome>) -> SolveOutcome {
    use PassOutcome::*;
    match (mine, theirs) {
        (Some(Win), _) | (_, Some(Win)) => SolveOutcome::WinCurrent,
        (Some(Loss), _) | (_, Some(Loss)) => SolveOutcome::LossCurrent,
        (Some(DrawWin), Some(DrawLoss)) => SolveOutcome::Draw,
        (Some(DrawWin), _) => SolveOutcome::WinOrDraw,
        (_, Some(DrawLoss)) => SolveOutcome::LossOrDraw,
        _ => SolveOutcome::Unknown,
    }
}
