//! Test doubles shared by the unit tests

use std::collections::HashMap;

use shakmaty::fen::Fen;
use shakmaty::san::San;
use shakmaty::uci::UciMove;
use shakmaty::{Chess, EnPassantMode, Move, Position};

use crate::batch::SkippedGame;
use crate::board::Board;
use crate::book::{BookEntry, PolyglotBook};
use crate::correlation::{AnalysisObserver, BookPly, GameStart, PlyReport};
use crate::engine::{
    AnalysisEngine, AnalysisLimit, AnalysisResult, EngineFailure, EngineFailureKind,
    EngineOptions, EngineRecommendation,
};
use crate::parser::{parse_pgn_string, GameRecord};
use crate::report::GameReport;

type Responder = Box<dyn FnMut(&Chess, u32) -> Result<Vec<String>, EngineFailureKind> + Send>;

pub(crate) fn fen_key(position: &Chess) -> String {
    Fen::from_position(position, EnPassantMode::Legal).to_string()
}

/// In-process engine answering from a closure
pub(crate) struct ScriptedEngine {
    name: String,
    responder: Responder,
    configured: Option<EngineOptions>,
    games_started: usize,
    queries: usize,
    shutdowns: usize,
    closed: bool,
}

impl ScriptedEngine {
    pub(crate) fn new<F>(name: &str, responder: F) -> Self
    where
        F: FnMut(&Chess, u32) -> Result<Vec<String>, EngineFailureKind> + Send + 'static,
    {
        ScriptedEngine {
            name: name.to_string(),
            responder: Box::new(responder),
            configured: None,
            games_started: 0,
            queries: 0,
            shutdowns: 0,
            closed: false,
        }
    }

    /// Always suggests `moves`, which must be legal wherever it is asked
    pub(crate) fn constant(name: &str, moves: &[&str]) -> Self {
        let moves: Vec<String> = moves.iter().map(|m| m.to_string()).collect();
        Self::new(name, move |_, _| Ok(moves.clone()))
    }

    pub(crate) fn failing<F>(name: &str, kind: F) -> Self
    where
        F: Fn() -> EngineFailureKind + Send + 'static,
    {
        Self::new(name, move |_, _| Err(kind()))
    }

    /// Answers from a FEN-keyed table; unknown positions are protocol errors
    pub(crate) fn from_table(name: &str, table: HashMap<String, Vec<String>>) -> Self {
        Self::new(name, move |position, _| {
            table
                .get(&fen_key(position))
                .cloned()
                .ok_or_else(|| EngineFailureKind::Protocol("unscripted position".into()))
        })
    }

    pub(crate) fn configured(&self) -> Option<&EngineOptions> {
        self.configured.as_ref()
    }

    pub(crate) fn games_started(&self) -> usize {
        self.games_started
    }

    pub(crate) fn queries(&self) -> usize {
        self.queries
    }

    pub(crate) fn shutdowns(&self) -> usize {
        self.shutdowns
    }
}

impl AnalysisEngine for ScriptedEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&mut self, options: &EngineOptions) -> Result<(), EngineFailure> {
        self.configured = Some(options.clone());
        Ok(())
    }

    fn new_game(&mut self) -> Result<(), EngineFailure> {
        self.games_started += 1;
        Ok(())
    }

    fn analyze(
        &mut self,
        board: &Board,
        _limit: &AnalysisLimit,
        pv_count: u32,
    ) -> Result<AnalysisResult, EngineFailure> {
        self.queries += 1;
        let position = board.position();
        let moves = (self.responder)(position, pv_count)
            .map_err(|kind| EngineFailure::new(self.name.clone(), kind))?;

        let recommendations = moves
            .iter()
            .take(pv_count as usize)
            .enumerate()
            .map(|(i, uci)| {
                let pv = uci
                    .parse::<UciMove>()
                    .map(|m| vec![m])
                    .map_err(|_| format!("bad scripted move {}", uci))?;
                EngineRecommendation::from_line(i as u32 + 1, position, pv, None)
            })
            .collect::<Result<Vec<_>, String>>()
            .map_err(|msg| EngineFailure::new(self.name.clone(), EngineFailureKind::Protocol(msg)))?;

        Ok(AnalysisResult {
            engine: self.name.clone(),
            recommendations,
        })
    }

    fn shutdown(&mut self) {
        if !self.closed {
            self.closed = true;
            self.shutdowns += 1;
        }
    }
}

/// Positions before each of `sans`, played from the initial position
pub(crate) fn positions_before(sans: &[&str]) -> Vec<Chess> {
    let mut position = Chess::default();
    let mut positions = Vec::with_capacity(sans.len());
    for san in sans {
        let mv = san.parse::<San>().unwrap().to_move(&position).unwrap();
        positions.push(position.clone());
        position = position.play(mv).unwrap();
    }
    positions
}

/// FEN table mapping the position before `sans[i]` to `replies[i]`
pub(crate) fn script_game(sans: &[&str], replies: &[&[&str]]) -> HashMap<String, Vec<String>> {
    positions_before(sans)
        .iter()
        .zip(replies)
        .map(|(position, moves)| {
            (
                fen_key(position),
                moves.iter().map(|m| m.to_string()).collect(),
            )
        })
        .collect()
}

/// Builds a game record from bare SAN moves
pub(crate) fn game_of(white: &str, black: &str, sans: &[&str]) -> GameRecord {
    let pgn = format!(
        "[White \"{}\"]\n[Black \"{}\"]\n\n{} *\n",
        white,
        black,
        sans.join(" ")
    );
    parse_pgn_string(&pgn)
        .unwrap()
        .into_iter()
        .next()
        .unwrap()
        .unwrap()
}

/// Polyglot move encoding of a non-castling move
pub(crate) fn polyglot_move(mv: &Move) -> u16 {
    let from = mv.from().map_or(0, |sq| usize::from(sq) as u16);
    let to = usize::from(mv.to()) as u16;
    (from << 6) | to
}

/// Book holding each position with one of its legal moves
pub(crate) fn book_of(positions: &[Chess]) -> PolyglotBook {
    PolyglotBook::from_entries(
        positions
            .iter()
            .map(|p| {
                let mv = p
                    .legal_moves()
                    .into_iter()
                    .find(|m| !m.is_castle())
                    .unwrap();
                BookEntry {
                    key: PolyglotBook::key(p),
                    raw_move: polyglot_move(&mv),
                    weight: 1,
                    learn: 0,
                }
            })
            .collect(),
    )
}

#[derive(Default)]
pub(crate) struct RecordingObserver {
    pub(crate) files: Vec<String>,
    pub(crate) games_started: usize,
    pub(crate) book: Vec<BookPly>,
    pub(crate) scored: Vec<PlyReport>,
    pub(crate) finished: Vec<GameReport>,
    pub(crate) skipped: Vec<SkippedGame>,
}

impl AnalysisObserver for RecordingObserver {
    fn on_file_start(&mut self, path: &std::path::Path) {
        self.files.push(path.display().to_string());
    }

    fn on_game_start(&mut self, _game: &GameStart<'_>) {
        self.games_started += 1;
    }

    fn on_book_ply(&mut self, ply: &BookPly) {
        self.book.push(ply.clone());
    }

    fn on_ply_scored(&mut self, report: &PlyReport) {
        self.scored.push(report.clone());
    }

    fn on_game_finished(&mut self, report: &GameReport) {
        self.finished.push(report.clone());
    }

    fn on_game_skipped(&mut self, skipped: &SkippedGame) {
        self.skipped.push(skipped.clone());
    }
}
