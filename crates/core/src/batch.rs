//! Runs the correlation over every game of one or more PGN files

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::book::OpeningBook;
use crate::correlation::{AnalysisObserver, CorrelationEngine, GameStart};
use crate::engine::{AnalysisEngine, CancelToken};
use crate::error::{Error, Result};
use crate::parser::{parse_pgn_file, parse_pgn_string, GameRecord};
use crate::report::GameReport;

/// What an engine failure during a game does to the rest of the batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Report the game as skipped and carry on with the next one
    #[default]
    SkipGame,
    /// Stop the whole batch with the engine error
    AbortBatch,
}

/// A game (or a whole file) that produced no report
#[derive(Debug, Clone, Serialize)]
pub struct SkippedGame {
    pub source: String,
    /// `None` when the file itself could not be read
    pub game_index: Option<usize>,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    /// Finished games, in file and game order
    pub reports: Vec<GameReport>,
    pub skipped: Vec<SkippedGame>,
    /// Set when the run was interrupted; `reports` holds every game finished before that
    pub cancelled: bool,
}

/// Expands `path` into the PGN files to analyse.
///
/// A file is taken as is, a directory contributes its `*.pgn` files in
/// name order.
pub fn collect_pgn_inputs<P: AsRef<Path>>(path: P) -> Result<Vec<PathBuf>> {
    let path = path.as_ref();
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(Error::Configuration(format!(
            "PGN input {} does not exist",
            path.display()
        )));
    }

    let dir = path.to_str().ok_or_else(|| {
        Error::Configuration(format!("PGN directory {} is not valid UTF-8", path.display()))
    })?;
    let pattern = format!("{}/*.pgn", glob::Pattern::escape(dir));
    let entries = glob::glob(&pattern)
        .map_err(|e| Error::Configuration(format!("bad PGN pattern {}: {}", pattern, e)))?;

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(file) if file.is_file() => files.push(file),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "unreadable directory entry"),
        }
    }
    files.sort();

    if files.is_empty() {
        warn!(dir = %path.display(), "no .pgn files found");
    }
    Ok(files)
}

/// Drives a [`CorrelationEngine`] over whole files, isolating per-game failures
pub struct BatchRunner<'a, E, B: ?Sized> {
    engine: CorrelationEngine<'a, E, B>,
    cancel: CancelToken,
    policy: FailurePolicy,
}

impl<'a, E, B> BatchRunner<'a, E, B>
where
    E: AnalysisEngine + Send,
    B: OpeningBook + ?Sized,
{
    pub fn new(engine: CorrelationEngine<'a, E, B>, cancel: CancelToken) -> Self {
        BatchRunner {
            engine,
            cancel,
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn run(
        &mut self,
        inputs: &[PathBuf],
        observer: &mut dyn AnalysisObserver,
    ) -> Result<BatchSummary> {
        let mut summary = BatchSummary::default();

        for path in inputs {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            observer.on_file_start(path);
            self.run_file(path, observer, &mut summary)?;
            observer.on_file_end(path);
        }

        info!(
            games = summary.reports.len(),
            skipped = summary.skipped.len(),
            cancelled = summary.cancelled,
            "batch finished"
        );
        Ok(summary)
    }

    /// Analyses the games of an in-memory PGN as if read from `source`
    pub fn run_pgn(
        &mut self,
        source: &str,
        pgn: &str,
        observer: &mut dyn AnalysisObserver,
    ) -> Result<BatchSummary> {
        let mut summary = BatchSummary::default();
        let games = parse_pgn_string(pgn)?;
        self.run_games(source, games, observer, &mut summary)?;
        Ok(summary)
    }

    fn run_file(
        &mut self,
        path: &Path,
        observer: &mut dyn AnalysisObserver,
        summary: &mut BatchSummary,
    ) -> Result<()> {
        let source = path.display().to_string();
        match parse_pgn_file(path) {
            Ok(games) => self.run_games(&source, games, observer, summary),
            Err(e) => {
                skip(observer, summary, SkippedGame {
                    source,
                    game_index: None,
                    reason: e.to_string(),
                });
                Ok(())
            }
        }
    }

    fn run_games(
        &mut self,
        source: &str,
        games: Vec<Result<GameRecord>>,
        observer: &mut dyn AnalysisObserver,
        summary: &mut BatchSummary,
    ) -> Result<()> {
        for (i, game) in games.into_iter().enumerate() {
            let index = i + 1;
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                return Ok(());
            }

            let game = match game {
                Ok(game) => game,
                Err(e) => {
                    skip(observer, summary, SkippedGame {
                        source: source.to_string(),
                        game_index: Some(index),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            observer.on_game_start(&GameStart {
                source,
                index,
                header: &game.header,
                plies: game.move_count(),
            });

            match self.engine.correlate(&game, observer) {
                Ok(correlation) => {
                    let report = GameReport::new(
                        source,
                        index,
                        game.header.clone(),
                        self.engine.settings(),
                        self.engine.engine_names(),
                        correlation,
                    );
                    observer.on_game_finished(&report);
                    summary.reports.push(report);
                }
                Err(e) if e.is_cancelled() || self.cancel.is_cancelled() => {
                    info!(source, game = index, "analysis interrupted");
                    summary.cancelled = true;
                    return Ok(());
                }
                Err(Error::Engine(failure)) if self.policy == FailurePolicy::AbortBatch => {
                    return Err(Error::Engine(failure));
                }
                Err(e) => {
                    skip(observer, summary, SkippedGame {
                        source: source.to_string(),
                        game_index: Some(index),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn skip(observer: &mut dyn AnalysisObserver, summary: &mut BatchSummary, skipped: SkippedGame) {
    observer.on_game_skipped(&skipped);
    summary.skipped.push(skipped);
}
