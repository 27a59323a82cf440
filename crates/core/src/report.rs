//! Per-game correlation reports

use std::fmt;

use serde::Serialize;

use crate::correlation::{AnalysisSettings, CorrelationResult, Direction};
use crate::error::Result;
use crate::parser::GameHeader;

/// Everything printed about one analysed game
#[derive(Debug, Clone, Serialize)]
pub struct GameReport {
    /// PGN file the game came from
    pub source: String,
    /// 1-based position of the game in its file
    pub game_index: usize,
    pub header: GameHeader,
    pub engines: Vec<String>,
    pub pv_count: u32,
    /// Search limit as given to the engines
    pub limit: String,
    pub direction: Direction,
    pub correlation: CorrelationResult,
}

impl GameReport {
    pub fn new(
        source: impl Into<String>,
        game_index: usize,
        header: GameHeader,
        settings: &AnalysisSettings,
        engines: Vec<String>,
        correlation: CorrelationResult,
    ) -> Self {
        GameReport {
            source: source.into(),
            game_index,
            header,
            engines,
            pv_count: settings.pv_count,
            limit: settings.limit.to_string(),
            direction: settings.direction,
            correlation,
        }
    }

    /// Single-line JSON object
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    fn player(name: &Option<String>) -> &str {
        name.as_deref().unwrap_or("Unknown")
    }
}

impl fmt::Display for GameReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = &self.header;
        writeln!(f, "Game {} of {}: {}", self.game_index, self.source, header.summary())?;

        let mut details = Vec::new();
        if let Some(event) = &header.event {
            details.push(format!("Event: {}", event));
        }
        if let Some(date) = &header.date {
            details.push(format!("Date: {}", date));
        }
        match (&header.eco, &header.opening) {
            (Some(eco), Some(opening)) => details.push(format!("Opening: {} {}", eco, opening)),
            (Some(name), None) | (None, Some(name)) => details.push(format!("Opening: {}", name)),
            (None, None) => {}
        }
        if !details.is_empty() {
            writeln!(f, "{}", details.join(" | "))?;
        }

        let engines = if self.engines.is_empty() {
            "none".to_string()
        } else {
            self.engines.join(", ")
        };
        writeln!(
            f,
            "Engines: {} | PVs: {} | Limit: {} | {:?}",
            engines, self.pv_count, self.limit, self.direction
        )?;

        let correlation = &self.correlation;
        writeln!(
            f,
            "White ({}): {}",
            Self::player(&correlation.player_white),
            correlation.white
        )?;
        writeln!(
            f,
            "Black ({}): {}",
            Self::player(&correlation.player_black),
            correlation.black
        )?;
        write!(f, "Book plies: {}", correlation.book_plies)
    }
}
