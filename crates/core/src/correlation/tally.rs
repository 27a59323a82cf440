//! Per-colour tallies and their reduction into percentages

use std::fmt;

use serde::Serialize;
use shakmaty::Color;

/// `100 * matches / total`, rounded to 2 decimals. `None` when there is nothing to measure.
pub fn correlation_percent(outcomes: &[bool]) -> Option<f64> {
    if outcomes.is_empty() {
        return None;
    }
    let matched = outcomes.iter().filter(|m| **m).count();
    let percent = 100.0 * matched as f64 / outcomes.len() as f64;
    Some((percent * 100.0).round() / 100.0)
}

/// Match outcomes of one game, split by the side that moved
#[derive(Debug, Clone, Default)]
pub struct GameTally {
    white: Vec<bool>,
    black: Vec<bool>,
    book_plies: usize,
}

impl GameTally {
    pub fn record(&mut self, side: Color, matched: bool) {
        match side {
            Color::White => self.white.push(matched),
            Color::Black => self.black.push(matched),
        }
    }

    pub fn record_book(&mut self) {
        self.book_plies += 1;
    }

    pub fn outcomes(&self, side: Color) -> &[bool] {
        match side {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    pub fn book_plies(&self) -> usize {
        self.book_plies
    }

    pub fn into_result(self, player_white: Option<String>, player_black: Option<String>) -> CorrelationResult {
        CorrelationResult {
            white: SideCorrelation::from_outcomes(&self.white),
            black: SideCorrelation::from_outcomes(&self.black),
            book_plies: self.book_plies,
            player_white,
            player_black,
        }
    }
}

/// Correlation of one side
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SideCorrelation {
    pub matched: usize,
    pub scored: usize,
    /// `None` when the side had no scored moves
    pub percent: Option<f64>,
}

impl SideCorrelation {
    pub fn from_outcomes(outcomes: &[bool]) -> Self {
        SideCorrelation {
            matched: outcomes.iter().filter(|m| **m).count(),
            scored: outcomes.len(),
            percent: correlation_percent(outcomes),
        }
    }

    pub fn has_data(&self) -> bool {
        self.percent.is_some()
    }
}

impl fmt::Display for SideCorrelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.percent {
            Some(percent) => write!(f, "{:.2}% ({}/{})", percent, self.matched, self.scored),
            None => write!(f, "no data"),
        }
    }
}

/// Outcome of correlating one game
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationResult {
    pub white: SideCorrelation,
    pub black: SideCorrelation,
    pub book_plies: usize,
    pub player_white: Option<String>,
    pub player_black: Option<String>,
}

impl CorrelationResult {
    pub fn side(&self, color: Color) -> &SideCorrelation {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }
}
