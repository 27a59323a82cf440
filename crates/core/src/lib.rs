//! Chess move correlation core library
//!
//! Measures how often each player's moves match the lines recommended by
//! one or more UCI engines, ignoring positions found in an opening book.

pub mod batch;
pub mod board;
pub mod book;
pub mod config;
pub mod correlation;
pub mod engine;
pub mod error;
pub mod parser;
pub mod report;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{collect_pgn_inputs, BatchRunner, BatchSummary, FailurePolicy, SkippedGame};
pub use book::{EmptyBook, OpeningBook, PolyglotBook};
pub use config::RunConfig;
pub use correlation::{
    AnalysisObserver, AnalysisSettings, CorrelationEngine, CorrelationResult, Direction,
};
pub use engine::{AnalysisLimit, CancelToken, EnginePool, EngineSpec};
pub use error::{Error, Result};
pub use report::GameReport;
