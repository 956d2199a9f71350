//! Solve a Havannah position with proof-number search, or play it out with
//! the Monte-Carlo player.
//!
//! 使用例:
//!   havannah_solve --size 4 --moves "b2 f6 a2" --time 30
//!   havannah_solve --size 5 --mode play --time 2 --threads 4

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};

use havannah_core::config::FileConfig;
use havannah_core::record::{GameRecord, parse_sgf, write_sgf};
use havannah_core::store::MemoryStore;
use havannah_core::util::panic::install_panic_hook;
use havannah_core::{MctsPlayer, Move, PnsSolver, TimerService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// prove the position with PNS
    Solve,
    /// play the game out with MCTS
    Play,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Board size (4..=10); overrides the config file
    #[arg(short, long)]
    size: Option<usize>,

    /// Moves to play first, space separated (e.g. "e5 d4 swap")
    #[arg(short, long, default_value = "")]
    moves: String,

    /// Enable the swap rule
    #[arg(long)]
    swap: bool,

    #[arg(long, value_enum, default_value_t = Mode::Solve)]
    mode: Mode,

    /// Seconds per solve, or per move in play mode
    #[arg(short, long, default_value_t = 10.0)]
    time: f64,

    /// Tree memory limit in MiB
    #[arg(long, default_value_t = 1024)]
    memory: u64,

    /// Worker threads; overrides the config file
    #[arg(long)]
    threads: Option<usize>,

    /// TOML config with [board], [solver] and [player] tables
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Start from this game record instead of --moves
    #[arg(long)]
    record: Option<PathBuf>,

    /// Write the resulting record here
    #[arg(long)]
    save: Option<PathBuf>,

    /// Minimum work (solve) or visits (play) of exported tree nodes
    #[arg(long, default_value_t = 100)]
    min_export: u64,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, log_level));
    builder
        .format(|buf, record| writeln!(buf, "[{}] {}: {}", record.level(), record.target(), record.args()))
        .write_style(env_logger::WriteStyle::Never)
        .target(env_logger::Target::Stderr)
        .init();
    install_panic_hook();

    if let Err(e) = run(args) {
        log::error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

fn load_config(args: &Args) -> Result<FileConfig> {
    let mut cfg = match &args.config {
        Some(path) => FileConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => FileConfig::default(),
    };
    cfg.solver.apply_env_overrides();
    cfg.player.apply_env_overrides();
    if let Some(size) = args.size {
        cfg.board.size = size;
    }
    if args.swap {
        cfg.board.swap = true;
    }
    if let Some(threads) = args.threads {
        cfg.solver.threads = threads;
        cfg.player.threads = threads;
    }
    cfg.validate().context("invalid configuration")?;
    Ok(cfg)
}

fn parse_moves(text: &str) -> Result<Vec<Move>> {
    text.split_whitespace()
        .map(|m| m.parse::<Move>().with_context(|| format!("bad move {m:?}")))
        .collect()
}

fn load_record(path: &Path) -> Result<GameRecord> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_sgf(&text).with_context(|| format!("parsing {}", path.display()))
}

fn save_record(path: &Path, record: &GameRecord) -> Result<()> {
    std::fs::write(path, write_sgf(record)).with_context(|| format!("writing {}", path.display()))?;
    log::info!("record written to {}", path.display());
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let mut cfg = load_config(&args)?;
    let record = args.record.as_deref().map(load_record).transpose()?;
    if let Some(r) = &record {
        cfg.board.size = r.size;
    }
    let moves = parse_moves(&args.moves)?;
    if !args.time.is_finite() || args.time <= 0.0 {
        bail!("--time must be positive");
    }
    let time = Duration::from_secs_f64(args.time);
    let memory = args.memory.saturating_mul(1024 * 1024);
    let timer = Arc::new(TimerService::new());

    match args.mode {
        Mode::Solve => {
            let mut solver = PnsSolver::new(cfg.board, cfg.solver, timer)?;
            solver.set_store(Some(Arc::new(MemoryStore::new())));
            match &record {
                Some(r) => solver.import_record(r)?,
                None => solver.set_position(&moves)?,
            }
            println!("{}", solver.board());

            let result = solver.solve(time, memory);
            let pv: Vec<String> = result.pv.iter().map(Move::to_string).collect();
            println!("result: {}", result.outcome);
            println!("best:   {}", result.best);
            println!("pv:     {}", pv.join(" "));
            println!(
                "stats:  {:?}, {} iterations, {} nodes, depth {}, {} gc",
                result.elapsed, result.iterations, result.nodes, result.max_depth, result.gc_runs
            );
            if let Some(path) = &args.save {
                save_record(path, &solver.export_record(args.min_export))?;
            }
        }
        Mode::Play => {
            let mut player = MctsPlayer::new(cfg.board, cfg.player, timer)?;
            match &record {
                Some(r) => player.import_record(r)?,
                None => player.set_position(&moves)?,
            }
            while !player.board().is_over() {
                let result = player.genmove(time, memory);
                let side = player.board().to_play();
                println!(
                    "{:>3}. {side} {} ({:.3}, {} visits, {} rollouts)",
                    player.board().num_moves() + 1,
                    result.best,
                    result.value,
                    result.visits,
                    result.rollouts
                );
                player.play(result.best)?;
            }
            let board = player.board();
            println!("{board}");
            println!("result: {} by {:?}", board.winner(), board.win_type());
            if let Some(path) = &args.save {
                let min_visits = u32::try_from(args.min_export).unwrap_or(u32::MAX);
                save_record(path, &player.export_record(min_visits))?;
            }
        }
    }
    Ok(())
}
