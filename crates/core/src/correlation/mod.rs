//! Move correlation between a player's moves and engine recommendations
//!
//! Walks a game one ply at a time, skips book positions, asks every engine
//! for its best lines on the position before the move and records whether
//! the move actually played was among them.

mod observer;
mod progress;
mod tally;

use serde::Serialize;
use shakmaty::{Move, Position};

use crate::board::Board;
use crate::book::OpeningBook;
use crate::engine::{AnalysisEngine, AnalysisLimit, AnalysisResult, EnginePool};
use crate::error::{Error, Result};
use crate::parser::{GameRecord, PlayedMove};

pub use observer::{AnalysisObserver, BookPly, GameStart, NoopObserver, PlyReport, TracingObserver};
pub use progress::percent_complete;
pub use tally::{correlation_percent, CorrelationResult, GameTally, SideCorrelation};

/// Order in which a game's plies are visited
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// From the first move, pushing each move after scoring it
    #[default]
    Forward,
    /// From the final position, popping each move before scoring it
    Backward,
}

/// Fixed for a whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisSettings {
    pub limit: AnalysisLimit,
    /// Lines requested from each engine
    pub pv_count: u32,
    pub direction: Direction,
}

impl AnalysisSettings {
    pub fn new(limit: AnalysisLimit, pv_count: u32, direction: Direction) -> Result<Self> {
        if pv_count == 0 {
            return Err(Error::Configuration(
                "number of lines per engine must be at least 1".into(),
            ));
        }
        Ok(AnalysisSettings {
            limit,
            pv_count,
            direction,
        })
    }
}

/// Every move any engine suggested for one position, all lines included
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    moves: Vec<Move>,
}

impl CandidateSet {
    pub fn from_results(results: &[AnalysisResult]) -> Self {
        CandidateSet {
            moves: results.iter().flat_map(|r| r.moves().cloned()).collect(),
        }
    }

    pub fn contains(&self, mv: &Move) -> bool {
        self.moves.contains(mv)
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }
}

/// Scores games against an engine pool
pub struct CorrelationEngine<'a, E, B: ?Sized> {
    pool: &'a mut EnginePool<E>,
    book: &'a B,
    settings: AnalysisSettings,
}

impl<'a, E, B> CorrelationEngine<'a, E, B>
where
    E: AnalysisEngine + Send,
    B: OpeningBook + ?Sized,
{
    pub fn new(pool: &'a mut EnginePool<E>, book: &'a B, settings: AnalysisSettings) -> Self {
        CorrelationEngine {
            pool,
            book,
            settings,
        }
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    pub fn engine_names(&self) -> Vec<String> {
        self.pool.names()
    }

    /// Correlates one game.
    ///
    /// An engine failure aborts this game only; nothing outside the game's
    /// own tally is touched.
    pub fn correlate(
        &mut self,
        game: &GameRecord,
        observer: &mut dyn AnalysisObserver,
    ) -> Result<CorrelationResult> {
        self.pool.new_game()?;

        let total = game.move_count();
        let mut tally = GameTally::default();

        match self.settings.direction {
            Direction::Forward => {
                let mut board = game.initial_board();
                for played in &game.moves {
                    self.score_ply(&board, played, total, &mut tally, observer)?;
                    board.push(played.mv.clone())?;
                }
            }
            Direction::Backward => {
                let mut board = game.final_board()?;
                for played in game.moves.iter().rev() {
                    board.pop().ok_or_else(|| {
                        Error::MalformedGame("ran out of moves while walking back".into())
                    })?;
                    self.score_ply(&board, played, total, &mut tally, observer)?;
                }
            }
        }

        Ok(tally.into_result(game.header.white.clone(), game.header.black.clone()))
    }

    /// Scores the move `played` from the board's current position
    fn score_ply(
        &mut self,
        board: &Board,
        played: &PlayedMove,
        total: usize,
        tally: &mut GameTally,
        observer: &mut dyn AnalysisObserver,
    ) -> Result<()> {
        let position = board.position();
        let ply = board.ply();
        let side = position.turn();

        if self.book.contains(position) {
            tally.record_book();
            observer.on_book_ply(&BookPly {
                ply,
                fullmove: board.fullmove_number(),
                side,
                san: played.san.clone(),
            });
            return Ok(());
        }

        let percent = percent_complete(ply, total, self.settings.direction);
        let analyses =
            self.pool
                .analyze_all(board, &self.settings.limit, self.settings.pv_count)?;
        let matched = CandidateSet::from_results(&analyses).contains(&played.mv);
        tally.record(side, matched);

        observer.on_ply_scored(&PlyReport {
            ply,
            total_plies: total,
            percent_complete: percent,
            fullmove: board.fullmove_number(),
            side,
            san: played.san.clone(),
            analyses,
            matched,
        });
        Ok(())
    }
}
