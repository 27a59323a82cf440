//! A fixed, ordered set of engines queried together

use std::thread;

use tracing::{info, warn};

use super::analysis::{AnalysisLimit, AnalysisResult};
use super::cancel::CancelToken;
use super::options::{EngineOptions, EngineSpec};
use super::uci::UciEngine;
use super::{AnalysisEngine, EngineFailure};
use crate::board::Board;
use crate::error::{Error, Result};

/// Engines that answer every analysis request together.
///
/// Order only matters for iteration and logging; every engine's lines count
/// equally when scoring.
pub struct EnginePool<E> {
    engines: Vec<E>,
}

impl EnginePool<UciEngine> {
    /// Starts and configures every engine in `specs`.
    ///
    /// If one engine fails, the engines already started are shut down when the
    /// partially built pool is dropped, and the whole launch fails.
    pub fn launch(specs: &[EngineSpec], cancel: &CancelToken) -> Result<Self> {
        if specs.is_empty() {
            warn!("no engines configured, every scored move will count as a miss");
        }

        let mut engines = Vec::with_capacity(specs.len());
        for spec in specs {
            spec.options.validate()?;
            let mut engine = UciEngine::launch(spec, cancel.clone())?;
            engine.configure(&spec.options).map_err(|failure| {
                Error::Configuration(format!("could not configure engine: {}", failure))
            })?;
            engines.push(engine);
        }

        let pool = EnginePool::new(engines);
        info!(engines = %pool.names().join(", "), "engine pool ready");
        Ok(pool)
    }
}

impl<E: AnalysisEngine + Send> EnginePool<E> {
    pub fn new(engines: Vec<E>) -> Self {
        EnginePool { engines }
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.engines.iter().map(|e| e.name().to_string()).collect()
    }

    pub fn engines(&self) -> &[E] {
        &self.engines
    }

    /// Applies the same options to every engine
    pub fn configure_all(&mut self, options: &EngineOptions) -> std::result::Result<(), EngineFailure> {
        self.engines
            .iter_mut()
            .try_for_each(|engine| engine.configure(options))
    }

    pub fn new_game(&mut self) -> std::result::Result<(), EngineFailure> {
        self.engines.iter_mut().try_for_each(|engine| engine.new_game())
    }

    /// Asks every engine about the board's position and returns their answers in pool order.
    ///
    /// Engines run concurrently when there is more than one; all of them are
    /// joined before anything is returned. The first failure in pool order
    /// fails the whole request.
    pub fn analyze_all(
        &mut self,
        board: &Board,
        limit: &AnalysisLimit,
        pv_count: u32,
    ) -> std::result::Result<Vec<AnalysisResult>, EngineFailure> {
        if self.engines.len() <= 1 {
            return self
                .engines
                .iter_mut()
                .map(|engine| engine.analyze(board, limit, pv_count))
                .collect();
        }

        let answers: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = self
                .engines
                .iter_mut()
                .map(|engine| scope.spawn(move || engine.analyze(board, limit, pv_count)))
                .collect();

            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(answer) => answer,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        });

        answers.into_iter().collect()
    }

    /// Shuts every engine down. Safe to call more than once.
    pub fn shutdown(&mut self) {
        for engine in &mut self.engines {
            engine.shutdown();
        }
    }
}
