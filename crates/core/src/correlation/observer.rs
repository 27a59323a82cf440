//! Progress and result events emitted while analysing games
//!
//! The analysis never prints; it hands events to an observer and the caller
//! decides where they go (console, log file, nowhere).

use std::path::Path;

use shakmaty::Color;
use tracing::{debug, info, warn};

use crate::batch::SkippedGame;
use crate::engine::AnalysisResult;
use crate::parser::GameHeader;
use crate::report::GameReport;

/// A game about to be analysed
#[derive(Debug, Clone, Copy)]
pub struct GameStart<'a> {
    pub source: &'a str,
    /// 1-based position of the game in its file
    pub index: usize,
    pub header: &'a GameHeader,
    pub plies: usize,
}

/// A ply skipped because its position is in the opening book
#[derive(Debug, Clone)]
pub struct BookPly {
    pub ply: usize,
    pub fullmove: u32,
    pub side: Color,
    pub san: String,
}

/// A ply that was compared against the engines
#[derive(Debug, Clone)]
pub struct PlyReport {
    /// 0-based index into the game's moves
    pub ply: usize,
    pub total_plies: usize,
    pub percent_complete: u32,
    pub fullmove: u32,
    pub side: Color,
    pub san: String,
    /// Every engine's lines, in pool order
    pub analyses: Vec<AnalysisResult>,
    pub matched: bool,
}

pub trait AnalysisObserver {
    fn on_file_start(&mut self, _path: &Path) {}

    fn on_file_end(&mut self, _path: &Path) {}

    fn on_game_start(&mut self, _game: &GameStart<'_>) {}

    fn on_book_ply(&mut self, _ply: &BookPly) {}

    fn on_ply_scored(&mut self, _report: &PlyReport) {}

    fn on_game_finished(&mut self, _report: &GameReport) {}

    fn on_game_skipped(&mut self, _skipped: &SkippedGame) {}
}

/// Drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl AnalysisObserver for NoopObserver {}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl AnalysisObserver for TracingObserver {
    fn on_file_start(&mut self, path: &Path) {
        info!(file = %path.display(), "analysing file");
    }

    fn on_game_start(&mut self, game: &GameStart<'_>) {
        info!(
            source = game.source,
            game = game.index,
            plies = game.plies,
            "{}",
            game.header.summary()
        );
    }

    fn on_book_ply(&mut self, ply: &BookPly) {
        debug!(ply = ply.ply, fullmove = ply.fullmove, san = %ply.san, "book move");
    }

    fn on_ply_scored(&mut self, report: &PlyReport) {
        for analysis in &report.analyses {
            if let Some(best) = analysis.best() {
                debug!(
                    progress = report.percent_complete,
                    fullmove = report.fullmove,
                    engine = %analysis.engine,
                    best = %best.uci(),
                    played = %report.san,
                    "analysed"
                );
            }
        }
    }

    fn on_game_finished(&mut self, report: &GameReport) {
        info!(
            game = report.game_index,
            white = %report.correlation.white,
            black = %report.correlation.black,
            "game analysed"
        );
    }

    fn on_game_skipped(&mut self, skipped: &SkippedGame) {
        warn!(source = %skipped.source, game = ?skipped.game_index, reason = %skipped.reason, "game skipped");
    }
}
