//! Types for representing engine analysis results

use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;

use serde::Serialize;
use shakmaty::uci::UciMove;
use shakmaty::{Chess, Move};

use crate::error::{Error, Result};

/// Engine score for the side to move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Score {
    /// Centipawn score
    Centipawns(i32),
    /// Forced mate in N moves (negative = side to move gets mated)
    Mate(i32),
}

impl Score {
    /// Converts the score to pawns, clamping mates to +/-100
    pub fn as_pawns(&self) -> f32 {
        match self {
            Score::Centipawns(cp) => *cp as f32 / 100.0,
            Score::Mate(moves) => {
                if *moves > 0 {
                    100.0
                } else {
                    -100.0
                }
            }
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Centipawns(cp) => {
                let score = *cp as f32 / 100.0;
                if score >= 0.0 {
                    write!(f, "+{:.2}", score)
                } else {
                    write!(f, "{:.2}", score)
                }
            }
            Score::Mate(moves) => write!(f, "M{}", moves),
        }
    }
}

/// How long an engine may think about each position.
///
/// Exactly one limit applies to a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisLimit {
    /// Wall-clock time per position
    Time(Duration),
    /// Search depth in plies
    Depth(NonZeroU32),
}

impl AnalysisLimit {
    /// Time limit in (fractional) seconds. Rejects zero, negative and non-finite values.
    pub fn time_secs(seconds: f64) -> Result<Self> {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(Error::Configuration(format!(
                "analysis time must be a positive number of seconds, got {}",
                seconds
            )));
        }
        Ok(AnalysisLimit::Time(Duration::from_secs_f64(seconds)))
    }

    pub fn depth(plies: u32) -> Result<Self> {
        NonZeroU32::new(plies)
            .map(AnalysisLimit::Depth)
            .ok_or_else(|| Error::Configuration("analysis depth must be at least 1".into()))
    }

    /// The UCI `go` command for this limit
    pub fn go_command(&self) -> String {
        match self {
            AnalysisLimit::Time(time) => format!("go movetime {}", time.as_millis().max(1)),
            AnalysisLimit::Depth(depth) => format!("go depth {}", depth),
        }
    }
}

impl fmt::Display for AnalysisLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisLimit::Time(time) => write!(f, "{:.2}s per move", time.as_secs_f64()),
            AnalysisLimit::Depth(depth) => write!(f, "depth {}", depth),
        }
    }
}

/// One ranked line from one engine
#[derive(Debug, Clone)]
pub struct EngineRecommendation {
    /// 1 = best line
    pub rank: u32,
    /// First move of the line, legal in the analysed position
    pub mv: Move,
    /// Score reported for the line, if any
    pub score: Option<Score>,
    /// Principal variation in UCI notation, starting with `mv`
    pub pv: Vec<UciMove>,
}

impl EngineRecommendation {
    /// Builds a recommendation from a UCI line, checking the first move against `position`.
    pub fn from_line(
        rank: u32,
        position: &Chess,
        pv: Vec<UciMove>,
        score: Option<Score>,
    ) -> std::result::Result<Self, String> {
        let first = pv
            .first()
            .ok_or_else(|| format!("line {} has an empty principal variation", rank))?;
        let mv = first
            .to_move(position)
            .map_err(|_| format!("line {} starts with illegal move {}", rank, first))?;
        Ok(EngineRecommendation { rank, mv, score, pv })
    }

    /// The first move in UCI notation
    pub fn uci(&self) -> String {
        self.pv.first().map(|m| m.to_string()).unwrap_or_default()
    }

    /// Returns a brief summary of the line
    pub fn summary(&self) -> String {
        let score = self
            .score
            .map(|s| s.to_string())
            .unwrap_or_else(|| "?".to_string());
        format!(
            "PV#{} {} | {} | {}",
            self.rank,
            self.uci(),
            score,
            self.pv
                .iter()
                .take(5)
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        )
    }
}

/// All lines one engine returned for one position, best first
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub engine: String,
    pub recommendations: Vec<EngineRecommendation>,
}

impl AnalysisResult {
    pub fn best(&self) -> Option<&EngineRecommendation> {
        self.recommendations.first()
    }

    pub fn moves(&self) -> impl Iterator<Item = &Move> {
        self.recommendations.iter().map(|r| &r.mv)
    }
}
