//! Solver and player tunables.
//!
//! Every struct deserializes from TOML with missing fields defaulted, and
//! `HAVANNAH_*` environment variables override individual fields after
//! loading.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::board::BoardOptions;
use crate::error::{ConfigError, ConfigResult};
use crate::pns::TieMode;
use crate::util::{env_flag, env_var};

/// Default arena chunk, in node slots.
pub const DEFAULT_CHUNK_SLOTS: u32 = 1 << 20;

/// Arena compaction trade-off.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactParams {
    /// fraction of empty trailing chunks returned to the system
    pub release: f64,
    /// fraction of chunks only swept into freelists, never moved
    pub lazy: f64,
}

impl Default for CompactParams {
    fn default() -> Self {
        CompactParams { release: 1.0, lazy: 0.25 }
    }
}

impl CompactParams {
    pub fn validate(&self) -> ConfigResult<()> {
        check_fraction("compact.release", self.release)?;
        check_fraction("compact.lazy", self.lazy)
    }
}

fn check_fraction(field: &'static str, v: f64) -> ConfigResult<()> {
    if (0.0..=1.0).contains(&v) {
        Ok(())
    } else {
        Err(ConfigError::Invalid { field, reason: format!("{v} not in 0.0..=1.0") })
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field, reason: reason.into() }
}

/// Proof-number solver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub threads: usize,
    /// depth-first thresholds; false runs most-proving-node descents
    pub df: bool,
    /// threshold widening for the second-best child
    pub epsilon: f64,
    /// alpha-beta probe depth used to seed new leaves (0 = off)
    pub ab: u8,
    /// seed new leaves from the distance estimator
    pub lbdist: bool,
    pub ties: TieMode,
    /// floor of the adaptive GC work threshold
    pub gc_min: u64,
    pub compact: CompactParams,
    pub chunk_slots: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            threads: 1,
            df: true,
            epsilon: 0.25,
            ab: 2,
            lbdist: false,
            ties: TieMode::Both,
            gc_min: 5,
            compact: CompactParams::default(),
            chunk_slots: DEFAULT_CHUNK_SLOTS,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.threads == 0 {
            return Err(invalid("solver.threads", "must be at least 1"));
        }
        if !(0.0..=16.0).contains(&self.epsilon) {
            return Err(invalid("solver.epsilon", format!("{} not in 0.0..=16.0", self.epsilon)));
        }
        if self.ab > 2 {
            return Err(invalid("solver.ab", format!("{} not in 0..=2", self.ab)));
        }
        if self.chunk_slots < crate::arena::MAX_SEGMENT {
            return Err(invalid("solver.chunk_slots", format!("must be at least {}", crate::arena::MAX_SEGMENT)));
        }
        self.compact.validate()
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_var("HAVANNAH_THREADS") {
            self.threads = v;
        }
        if let Some(v) = env_flag("HAVANNAH_PNS_DF") {
            self.df = v;
        }
        if let Some(v) = env_var("HAVANNAH_PNS_EPSILON") {
            self.epsilon = v;
        }
        if let Some(v) = env_var("HAVANNAH_PNS_AB") {
            self.ab = v;
        }
        if let Some(v) = env_flag("HAVANNAH_PNS_LBDIST") {
            self.lbdist = v;
        }
        if let Some(v) = env_var("HAVANNAH_GC_MIN") {
            self.gc_min = v;
        }
        if let Some(v) = env_var("HAVANNAH_CHUNK_SLOTS") {
            self.chunk_slots = v;
        }
    }
}

/// Monte-Carlo player settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub threads: usize,
    /// UCT exploration constant
    pub explore: f64,
    /// RAVE weight; 0 disables RAVE
    pub rave_factor: f64,
    /// value of a never visited child
    pub fpurgency: f64,
    /// visits before a leaf grows children
    pub expand_visits: u32,
    /// stop after this many rollouts (0 = time only)
    pub max_runs: u64,
    /// reuse the subtree of the played move
    pub keep_tree: bool,
    pub gc_min: u64,
    pub compact: CompactParams,
    pub chunk_slots: u32,
    pub seed: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            threads: 1,
            explore: 0.0,
            rave_factor: 500.0,
            fpurgency: 1.0,
            expand_visits: 1,
            max_runs: 0,
            keep_tree: true,
            gc_min: 5,
            compact: CompactParams::default(),
            chunk_slots: DEFAULT_CHUNK_SLOTS,
            seed: 0x5eed,
        }
    }
}

impl PlayerConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.threads == 0 {
            return Err(invalid("player.threads", "must be at least 1"));
        }
        if self.explore < 0.0 || self.rave_factor < 0.0 {
            return Err(invalid("player.explore", "weights must be non-negative"));
        }
        if self.expand_visits == 0 {
            return Err(invalid("player.expand_visits", "must be at least 1"));
        }
        if self.chunk_slots < crate::arena::MAX_SEGMENT {
            return Err(invalid("player.chunk_slots", format!("must be at least {}", crate::arena::MAX_SEGMENT)));
        }
        self.compact.validate()
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_var("HAVANNAH_THREADS") {
            self.threads = v;
        }
        if let Some(v) = env_var("HAVANNAH_MCTS_EXPLORE") {
            self.explore = v;
        }
        if let Some(v) = env_var("HAVANNAH_MCTS_RAVE") {
            self.rave_factor = v;
        }
        if let Some(v) = env_var("HAVANNAH_MCTS_MAX_RUNS") {
            self.max_runs = v;
        }
        if let Some(v) = env_var("HAVANNAH_SEED") {
            self.seed = v;
        }
        if let Some(v) = env_var("HAVANNAH_CHUNK_SLOTS") {
            self.chunk_slots = v;
        }
    }
}

/// Everything the tools binary reads from a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub board: BoardOptions,
    pub solver: SolverConfig,
    pub player: PlayerConfig,
}

impl FileConfig {
    pub fn from_toml(text: &str) -> ConfigResult<Self> {
        let cfg: FileConfig = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.board.validate()?;
        self.solver.validate()?;
        self.player.validate()
    }
}
