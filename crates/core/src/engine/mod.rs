//! Chess engine integration
//!
//! Provides the engine client interface, a UCI process client and a pool
//! that fans analysis requests out to several engines.

pub mod analysis;
pub mod cancel;
pub mod info;
pub mod options;
pub mod pool;
pub mod uci;

use std::time::Duration;

use thiserror::Error;

use crate::board::Board;

pub use analysis::{AnalysisLimit, AnalysisResult, EngineRecommendation, Score};
pub use cancel::CancelToken;
pub use options::{EngineOptions, EngineSpec, EngineTimeouts};
pub use pool::EnginePool;
pub use uci::UciEngine;

/// Why an engine call failed
#[derive(Error, Debug)]
pub enum EngineFailureKind {
    /// The process exited or closed its pipes
    #[error("engine process died")]
    ProcessDied,
    /// The engine answered with something that does not follow the protocol
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("no answer after {waited:?}")]
    Timeout { waited: Duration },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("analysis cancelled")]
    Cancelled,
}

/// A failed engine call, naming the engine
#[derive(Error, Debug)]
#[error("engine '{engine}' failed: {kind}")]
pub struct EngineFailure {
    pub engine: String,
    #[source]
    pub kind: EngineFailureKind,
}

impl EngineFailure {
    pub fn new(engine: impl Into<String>, kind: EngineFailureKind) -> Self {
        EngineFailure {
            engine: engine.into(),
            kind,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, EngineFailureKind::Cancelled)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, EngineFailureKind::Timeout { .. })
    }
}

/// An engine that can analyse positions
///
/// Implementations must answer with between 1 and `pv_count` lines, best
/// first, or fail. Failing is never reported as an empty answer.
pub trait AnalysisEngine {
    /// Engine identity for logs and reports
    fn name(&self) -> &str;

    /// Applies options once, before any analysis
    fn configure(&mut self, options: &EngineOptions) -> Result<(), EngineFailure>;

    /// Tells the engine that the next positions belong to a new game
    fn new_game(&mut self) -> Result<(), EngineFailure> {
        Ok(())
    }

    /// Analyses the board's current position. The moves that led to it are
    /// there for engines that track repetitions.
    fn analyze(
        &mut self,
        board: &Board,
        limit: &AnalysisLimit,
        pv_count: u32,
    ) -> Result<AnalysisResult, EngineFailure>;

    /// Releases the engine. Calling it more than once has no effect.
    fn shutdown(&mut self) {}
}
