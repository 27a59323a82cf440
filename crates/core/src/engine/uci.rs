//! UCI engine interface
//!
//! Spawns an engine as a subprocess and communicates via the UCI protocol.
//! A reader thread forwards stdout lines over a channel so every wait can be
//! bounded by a deadline and interrupted by cancellation.

use std::collections::{BTreeMap, HashSet};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use shakmaty::fen::Fen;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, EnPassantMode};
use tracing::{debug, info, warn};

use super::analysis::{AnalysisLimit, AnalysisResult, EngineRecommendation};
use super::cancel::CancelToken;
use super::info::{parse_bestmove, InfoLine};
use super::options::{EngineOptions, EngineSpec, EngineTimeouts};
use super::{AnalysisEngine, EngineFailure, EngineFailureKind};
use crate::board::Board;
use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const QUIT_TIMEOUT: Duration = Duration::from_millis(300);
const QUIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A running UCI engine process
pub struct UciEngine {
    name: String,
    process: Child,
    stdin: ChildStdin,
    lines: Receiver<String>,
    /// Option names announced during the handshake
    advertised: HashSet<String>,
    /// MultiPV value currently set on the engine
    multipv: u32,
    timeouts: EngineTimeouts,
    cancel: CancelToken,
    closed: bool,
}

impl UciEngine {
    /// Starts the engine and completes the UCI handshake.
    ///
    /// Any failure here is a configuration error: the run cannot start with
    /// an engine that does not come up.
    pub fn launch(spec: &EngineSpec, cancel: CancelToken) -> Result<Self> {
        let mut process = Command::new(&spec.path)
            .args(&spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                Error::Configuration(format!(
                    "failed to start engine {}: {}",
                    spec.path.display(),
                    e
                ))
            })?;

        let (stdin, stdout) = match (process.stdin.take(), process.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                reap(&mut process);
                return Err(Error::Configuration(format!(
                    "engine {} has no stdin/stdout pipe",
                    spec.path.display()
                )));
            }
        };

        let (tx, rx) = mpsc::channel::<String>();
        let reader = thread::Builder::new()
            .name(format!("uci-{}", spec.label()))
            .spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    match line {
                        Ok(line) => {
                            if tx.send(line).is_err() {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
            });
        if let Err(e) = reader {
            reap(&mut process);
            return Err(Error::Configuration(format!(
                "failed to start reader for engine {}: {}",
                spec.path.display(),
                e
            )));
        }

        let mut engine = UciEngine {
            name: spec.label(),
            process,
            stdin,
            lines: rx,
            advertised: HashSet::new(),
            multipv: 1,
            timeouts: spec.timeouts,
            cancel,
            closed: false,
        };

        engine.handshake(spec.name.is_none()).map_err(|kind| {
            Error::Configuration(format!(
                "engine {} failed the UCI handshake: {}",
                spec.path.display(),
                kind
            ))
        })?;

        info!(engine = %engine.name, path = %spec.path.display(), "engine ready");
        Ok(engine)
    }

    /// Option names the engine announced
    pub fn advertised_options(&self) -> &HashSet<String> {
        &self.advertised
    }

    fn failure(&self, kind: EngineFailureKind) -> EngineFailure {
        EngineFailure::new(self.name.clone(), kind)
    }

    /// Sends a command to the engine
    fn send(&mut self, cmd: &str) -> std::result::Result<(), EngineFailureKind> {
        debug!(engine = %self.name, cmd, "engine <");
        writeln!(self.stdin, "{}", cmd)
            .and_then(|_| self.stdin.flush())
            .map_err(|e| match e.kind() {
                ErrorKind::BrokenPipe => EngineFailureKind::ProcessDied,
                _ => EngineFailureKind::Io(e),
            })
    }

    /// Reads the next line, giving up once `budget` has passed since `started`
    fn recv_line(
        &self,
        started: Instant,
        budget: Duration,
    ) -> std::result::Result<String, EngineFailureKind> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(EngineFailureKind::Cancelled);
            }
            let elapsed = started.elapsed();
            if elapsed >= budget {
                return Err(EngineFailureKind::Timeout { waited: elapsed });
            }

            match self.lines.recv_timeout((budget - elapsed).min(POLL_INTERVAL)) {
                Ok(line) => {
                    let line = line.trim().to_string();
                    debug!(engine = %self.name, line = %line, "engine >");
                    return Ok(line);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(EngineFailureKind::ProcessDied);
                }
            }
        }
    }

    fn handshake(&mut self, adopt_id_name: bool) -> std::result::Result<(), EngineFailureKind> {
        self.send("uci")?;
        let started = Instant::now();
        loop {
            let line = self.recv_line(started, self.timeouts.handshake())?;
            if let Some(name) = line.strip_prefix("id name ") {
                if adopt_id_name && !name.trim().is_empty() {
                    self.name = name.trim().to_string();
                }
            } else if let Some(rest) = line.strip_prefix("option ") {
                if let Some(name) = parse_option_name(rest) {
                    self.advertised.insert(name);
                }
            } else if line == "uciok" {
                break;
            }
        }
        if self.advertised.contains("UCI_AnalyseMode") {
            self.set_option("UCI_AnalyseMode", "true")?;
        }
        self.sync_ready()
    }

    fn sync_ready(&mut self) -> std::result::Result<(), EngineFailureKind> {
        self.send("isready")?;
        let started = Instant::now();
        loop {
            if self.recv_line(started, self.timeouts.handshake())? == "readyok" {
                return Ok(());
            }
        }
    }

    fn set_option(&mut self, name: &str, value: &str) -> std::result::Result<(), EngineFailureKind> {
        self.send(&format!("setoption name {} value {}", name, value))
    }

    /// Only sends well-known options the engine actually supports
    fn set_option_if_available(
        &mut self,
        name: &str,
        value: &str,
    ) -> std::result::Result<(), EngineFailureKind> {
        if self.advertised.is_empty() || self.advertised.contains(name) {
            self.set_option(name, value)
        } else {
            debug!(engine = %self.name, option = name, "option not supported, skipped");
            Ok(())
        }
    }

    fn set_multipv(&mut self, pv_count: u32) -> std::result::Result<(), EngineFailureKind> {
        if self.multipv == pv_count {
            return Ok(());
        }
        if pv_count > 1 && !self.advertised.is_empty() && !self.advertised.contains("MultiPV") {
            warn!(engine = %self.name, "engine does not announce MultiPV, sending it anyway");
        }
        self.set_option("MultiPV", &pv_count.to_string())?;
        self.multipv = pv_count;
        Ok(())
    }

    fn apply_options(&mut self, options: &EngineOptions) -> std::result::Result<(), EngineFailureKind> {
        if let Some(hash) = options.hash_mb {
            self.set_option_if_available("Hash", &hash.to_string())?;
        }
        if let Some(threads) = options.threads {
            self.set_option_if_available("Threads", &threads.to_string())?;
        }
        for (name, value) in &options.extra {
            self.set_option(name, value)?;
        }
        self.sync_ready()
    }

    fn search(
        &mut self,
        board: &Board,
        limit: &AnalysisLimit,
        pv_count: u32,
    ) -> std::result::Result<Vec<EngineRecommendation>, EngineFailureKind> {
        self.set_multipv(pv_count)?;
        self.send(&position_command(board))?;
        self.send(&limit.go_command())?;

        let budget = match limit {
            AnalysisLimit::Time(time) => *time + self.timeouts.search_margin(),
            AnalysisLimit::Depth(_) => self.timeouts.depth_search(),
        };
        let started = Instant::now();
        let mut lines: BTreeMap<u32, InfoLine> = BTreeMap::new();

        loop {
            let line = match self.recv_line(started, budget) {
                Ok(line) => line,
                Err(kind @ (EngineFailureKind::Timeout { .. } | EngineFailureKind::Cancelled)) => {
                    self.abandon_search();
                    return Err(kind);
                }
                Err(kind) => return Err(kind),
            };

            if let Some(best) = parse_bestmove(&line) {
                let best = best.map_err(EngineFailureKind::Protocol)?;
                return collect_recommendations(board.position(), lines, best, pv_count);
            }

            if let Some(info) = InfoLine::parse(&line) {
                // Later lines of the same rank come from deeper iterations
                if !info.pv.is_empty() && info.rank() <= pv_count {
                    lines.insert(info.rank(), info);
                }
            }
        }
    }

    /// Stops a search that is no longer wanted and drains its `bestmove`
    fn abandon_search(&mut self) {
        if self.send("stop").is_err() {
            return;
        }
        let deadline = Instant::now() + self.timeouts.search_margin();
        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            match self.lines.recv_timeout(remaining) {
                Ok(line) if line.trim_start().starts_with("bestmove") => return,
                Ok(_) => continue,
                Err(_) => return,
            }
        }
    }
}

impl AnalysisEngine for UciEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&mut self, options: &EngineOptions) -> std::result::Result<(), EngineFailure> {
        self.apply_options(options).map_err(|kind| self.failure(kind))
    }

    fn new_game(&mut self) -> std::result::Result<(), EngineFailure> {
        self.send("ucinewgame")
            .and_then(|_| self.sync_ready())
            .map_err(|kind| self.failure(kind))
    }

    fn analyze(
        &mut self,
        board: &Board,
        limit: &AnalysisLimit,
        pv_count: u32,
    ) -> std::result::Result<AnalysisResult, EngineFailure> {
        let recommendations = self
            .search(board, limit, pv_count)
            .map_err(|kind| self.failure(kind))?;
        Ok(AnalysisResult {
            engine: self.name.clone(),
            recommendations,
        })
    }

    /// Asks the engine to quit, then kills it if it does not exit in time
    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let _ = self.send("quit");
        let deadline = Instant::now() + QUIT_TIMEOUT;
        while Instant::now() < deadline {
            if let Ok(Some(status)) = self.process.try_wait() {
                debug!(engine = %self.name, %status, "engine exited");
                return;
            }
            thread::sleep(QUIT_POLL_INTERVAL);
        }

        warn!(engine = %self.name, "engine did not quit, killing it");
        reap(&mut self.process);
    }
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn reap(process: &mut Child) {
    let _ = process.kill();
    let _ = process.wait();
}

/// Turns the collected `info` lines into ranked recommendations
/// `position fen <start> moves ...`, so the engine sees the game history
fn position_command(board: &Board) -> String {
    let mut cmd = format!(
        "position fen {}",
        Fen::from_position(board.start(), EnPassantMode::Legal)
    );
    if board.ply() > 0 {
        cmd.push_str(" moves");
        for mv in board.moves() {
            cmd.push(' ');
            cmd.push_str(&mv.clone().to_uci(CastlingMode::Standard).to_string());
        }
    }
    cmd
}

fn collect_recommendations(
    position: &Chess,
    lines: BTreeMap<u32, InfoLine>,
    best: Option<UciMove>,
    pv_count: u32,
) -> std::result::Result<Vec<EngineRecommendation>, EngineFailureKind> {
    let Some(best) = best else {
        return Err(EngineFailureKind::Protocol(
            "engine reported no move for a position with legal moves".into(),
        ));
    };

    if lines.is_empty() {
        let only = EngineRecommendation::from_line(1, position, vec![best], None)
            .map_err(EngineFailureKind::Protocol)?;
        return Ok(vec![only]);
    }

    lines
        .into_iter()
        .take(pv_count as usize)
        .map(|(rank, info)| {
            EngineRecommendation::from_line(rank, position, info.pv, info.score)
                .map_err(EngineFailureKind::Protocol)
        })
        .collect()
}

/// Extracts the name from `option name <Name...> type ...`
fn parse_option_name(line: &str) -> Option<String> {
    let mut tokens = line.split_whitespace();
    tokens.by_ref().find(|tok| *tok == "name")?;
    let parts: Vec<&str> = tokens.take_while(|tok| *tok != "type").collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}
