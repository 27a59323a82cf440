//! chess-correlation: how often do a player's moves match the engines?

mod console;

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;

use chess_correlation_core::batch::{collect_pgn_inputs, BatchRunner, BatchSummary, FailurePolicy};
use chess_correlation_core::book::PolyglotBook;
use chess_correlation_core::config::{LimitConfig, RunConfig};
use chess_correlation_core::correlation::CorrelationEngine;
use chess_correlation_core::engine::{CancelToken, EngineOptions, EnginePool, EngineSpec};
use chess_correlation_core::Result;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::console::ConsoleObserver;

/// Exit status after an interrupted run
const EXIT_CANCELLED: u8 = 130;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// PGN file, or directory of .pgn files
    pgn: PathBuf,

    /// TOML run configuration; flags override its values
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// UCI engine executable (repeat for several engines)
    #[arg(short, long = "engine", value_name = "PATH")]
    engines: Vec<PathBuf>,

    /// Polyglot opening book; positions found in it are not scored
    #[arg(short, long, value_name = "FILE")]
    book: Option<PathBuf>,

    /// Lines requested from each engine
    #[arg(short, long, value_name = "N")]
    multipv: Option<u32>,

    /// Thinking time per position
    #[arg(short, long, value_name = "SECONDS", conflicts_with = "depth")]
    time: Option<f64>,

    /// Search depth per position
    #[arg(short, long, value_name = "PLIES")]
    depth: Option<u32>,

    /// Hash size for every engine
    #[arg(long, value_name = "MB")]
    hash: Option<u32>,

    /// Search threads for every engine
    #[arg(long, value_name = "N")]
    threads: Option<u32>,

    /// Extra UCI option for every engine
    #[arg(long = "option", value_name = "NAME=VALUE")]
    options: Vec<String>,

    /// Walk games from the last move back to the first
    #[arg(long)]
    backward: bool,

    /// Write a log per PGN file into this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Print one JSON object per game instead of text
    #[arg(long)]
    json: bool,

    /// Stop the whole run when an engine fails instead of skipping the game
    #[arg(long)]
    abort_on_engine_failure: bool,
}

impl Cli {
    /// Layers command line values over the configuration file
    fn apply_to(&self, config: &mut RunConfig) -> Result<()> {
        if !self.engines.is_empty() {
            config.engines = self.engines.iter().map(EngineSpec::new).collect();
        }

        let mut shared = EngineOptions {
            hash_mb: self.hash,
            threads: self.threads,
            ..Default::default()
        };
        for pair in &self.options {
            shared.insert_pair(pair)?;
        }
        for engine in &mut config.engines {
            engine.options.merge(&shared);
            engine.options.validate()?;
        }

        if self.book.is_some() {
            config.book = self.book.clone();
        }
        if self.multipv.is_some() {
            config.pv_count = self.multipv;
        }
        if let Some(seconds) = self.time {
            config.limit = Some(LimitConfig::Time(seconds));
        }
        if let Some(plies) = self.depth {
            config.limit = Some(LimitConfig::Depth(plies));
        }
        if self.backward {
            config.backward = true;
        }
        if self.log_dir.is_some() {
            config.log_dir = self.log_dir.clone();
        }
        Ok(())
    }

    fn failure_policy(&self) -> FailurePolicy {
        if self.abort_on_engine_failure {
            FailurePolicy::AbortBatch
        } else {
            FailurePolicy::SkipGame
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    match run(&cli) {
        Ok(summary) if summary.cancelled => {
            warn!(
                finished = summary.reports.len(),
                "interrupted, results above are complete games only"
            );
            ExitCode::from(EXIT_CANCELLED)
        }
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<BatchSummary> {
    let mut config = match &cli.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    cli.apply_to(&mut config)?;
    let settings = config.analysis_settings()?;

    let inputs = collect_pgn_inputs(&cli.pgn)?;
    let book = config.book.as_ref().map(PolyglotBook::open).transpose()?;
    if let (Some(path), Some(book)) = (&config.book, &book) {
        info!(book = %path.display(), entries = book.len(), "opening book loaded");
    }

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        if let Err(e) = ctrlc::set_handler(move || cancel.cancel()) {
            warn!(error = %e, "cannot install Ctrl-C handler");
        }
    }

    let mut pool = EnginePool::launch(&config.engines, &cancel)?;
    let mut observer = ConsoleObserver::new(io::stdout(), settings.pv_count, cli.json, pool.names())
        .with_log_dir(config.log_dir.clone())
        .with_inline_status(io::stdout().is_terminal());

    let summary = {
        let engine = CorrelationEngine::new(&mut pool, &book, settings);
        BatchRunner::new(engine, cancel)
            .with_policy(cli.failure_policy())
            .run(&inputs, &mut observer)?
    };
    pool.shutdown();

    if !summary.skipped.is_empty() {
        warn!(skipped = summary.skipped.len(), "some games could not be analysed");
    }
    Ok(summary)
}
