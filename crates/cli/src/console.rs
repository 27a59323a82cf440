//! Console and per-file log output

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chess_correlation_core::batch::SkippedGame;
use chess_correlation_core::correlation::{
    AnalysisObserver, BookPly, GameStart, PlyReport, TracingObserver,
};
use chess_correlation_core::engine::{AnalysisResult, EngineRecommendation};
use chess_correlation_core::report::GameReport;
use tracing::warn;

/// One progress line per engine line, e.g. `42%|#12|PV#: 2|+0.35|BM: e2e4|Engine: Stockfish 16`
pub fn status_line(
    report: &PlyReport,
    analysis: &AnalysisResult,
    line: &EngineRecommendation,
    show_rank: bool,
) -> String {
    let score = line
        .score
        .map(|s| s.to_string())
        .unwrap_or_else(|| "?".to_string());
    let rank = if show_rank {
        format!("PV#: {}|", line.rank)
    } else {
        String::new()
    };
    format!(
        "{}%|#{}|{}{}|BM: {}|Engine: {}",
        report.percent_complete,
        report.fullmove,
        rank,
        score,
        line.uci(),
        analysis.engine
    )
}

/// Prints progress and reports, mirroring them into `<log_dir>/<pgn stem>.log`
pub struct ConsoleObserver<W: Write> {
    out: W,
    json: bool,
    /// Overwrite the status line in place instead of printing one per line
    inline_status: bool,
    show_rank: bool,
    engines: Vec<String>,
    log_dir: Option<PathBuf>,
    log: Option<BufWriter<File>>,
    tracing: TracingObserver,
}

impl<W: Write> ConsoleObserver<W> {
    pub fn new(out: W, pv_count: u32, json: bool, engines: Vec<String>) -> Self {
        ConsoleObserver {
            out,
            json,
            inline_status: false,
            show_rank: pv_count > 1,
            engines,
            log_dir: None,
            log: None,
            tracing: TracingObserver,
        }
    }

    pub fn with_log_dir(mut self, log_dir: Option<PathBuf>) -> Self {
        self.log_dir = log_dir;
        self
    }

    pub fn with_inline_status(mut self, inline: bool) -> Self {
        self.inline_status = inline;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn print(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{}", text) {
            warn!(error = %e, "cannot write to stdout");
        }
    }

    /// Replaces the current terminal line with `status`
    fn overwrite_status(&mut self, status: &str) {
        if let Err(e) = write!(self.out, "\r\x1b[K{}", status).and_then(|_| self.out.flush()) {
            warn!(error = %e, "cannot write to stdout");
        }
    }

    fn log(&mut self, text: &str) {
        if let Some(log) = &mut self.log {
            if let Err(e) = writeln!(log, "{}", text) {
                warn!(error = %e, "cannot write analysis log, disabling it");
                self.log = None;
            }
        }
    }

    fn open_log(&mut self, pgn: &Path) -> io::Result<()> {
        let Some(dir) = &self.log_dir else {
            return Ok(());
        };
        fs::create_dir_all(dir)?;
        let stem = pgn
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "games".to_string());
        let file = File::create(dir.join(format!("{}.log", stem)))?;
        self.log = Some(BufWriter::new(file));
        Ok(())
    }

    fn end_status(&mut self) {
        if self.inline_status && !self.json {
            self.print("");
        }
    }
}

impl<W: Write> AnalysisObserver for ConsoleObserver<W> {
    fn on_file_start(&mut self, path: &Path) {
        self.tracing.on_file_start(path);
        if let Err(e) = self.open_log(path) {
            warn!(file = %path.display(), error = %e, "cannot open analysis log");
        }

        let engines = self
            .engines
            .iter()
            .map(|e| format!("'{}'", e))
            .collect::<Vec<_>>()
            .join(", ");
        let banner = format!("Analysis of: '{}' with {}", path.display(), engines);
        if !self.json {
            self.print(&banner);
        }
        self.log(&banner);
    }

    fn on_file_end(&mut self, path: &Path) {
        self.tracing.on_file_end(path);
        if let Some(mut log) = self.log.take() {
            if let Err(e) = log.flush() {
                warn!(file = %path.display(), error = %e, "cannot flush analysis log");
            }
        }
    }

    fn on_game_start(&mut self, game: &GameStart<'_>) {
        self.tracing.on_game_start(game);
        let line = format!("Game {}: {}", game.index, game.header.summary());
        if !self.json {
            self.print(&line);
        }
        self.log(&line);
    }

    fn on_book_ply(&mut self, ply: &BookPly) {
        self.tracing.on_book_ply(ply);
    }

    fn on_ply_scored(&mut self, report: &PlyReport) {
        self.tracing.on_ply_scored(report);
        for analysis in &report.analyses {
            for line in &analysis.recommendations {
                let status = status_line(report, analysis, line, self.show_rank);
                if !self.json {
                    if self.inline_status && !self.show_rank {
                        self.overwrite_status(&status);
                    } else {
                        self.print(&status);
                    }
                }
                self.log(&status);
            }
        }
    }

    fn on_game_finished(&mut self, report: &GameReport) {
        self.tracing.on_game_finished(report);
        self.end_status();

        let text = report.to_string();
        if self.json {
            match report.to_json() {
                Ok(json) => self.print(&json),
                Err(e) => warn!(error = %e, "cannot serialise report"),
            }
        } else {
            self.print(&text);
            self.print("");
        }
        self.log(&text);
    }

    fn on_game_skipped(&mut self, skipped: &SkippedGame) {
        self.tracing.on_game_skipped(skipped);
        self.end_status();

        let line = match skipped.game_index {
            Some(index) => format!("Game {} skipped: {}", index, skipped.reason),
            None => format!("{} skipped: {}", skipped.source, skipped.reason),
        };
        self.log(&line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_correlation_core::correlation::{
        AnalysisSettings, CorrelationResult, Direction, SideCorrelation,
    };
    use chess_correlation_core::engine::{AnalysisLimit, Score};
    use chess_correlation_core::parser::GameHeader;
    use shakmaty::uci::UciMove;
    use shakmaty::{Chess, Color};

    fn ply_report() -> PlyReport {
        let position = Chess::default();
        let line = |rank, uci: &str, score| {
            EngineRecommendation::from_line(
                rank,
                &position,
                vec![uci.parse::<UciMove>().unwrap()],
                score,
            )
            .unwrap()
        };
        PlyReport {
            ply: 0,
            total_plies: 40,
            percent_complete: 0,
            fullmove: 1,
            side: Color::White,
            san: "e4".into(),
            analyses: vec![AnalysisResult {
                engine: "Stockfish".into(),
                recommendations: vec![
                    line(1, "e2e4", Some(Score::Centipawns(35))),
                    line(2, "d2d4", None),
                ],
            }],
            matched: true,
        }
    }

    #[test]
    fn test_status_lines() {
        let report = ply_report();
        let analysis = &report.analyses[0];
        assert_eq!(
            status_line(&report, analysis, &analysis.recommendations[0], false),
            "0%|#1|+0.35|BM: e2e4|Engine: Stockfish"
        );
        assert_eq!(
            status_line(&report, analysis, &analysis.recommendations[1], true),
            "0%|#1|PV#: 2|?|BM: d2d4|Engine: Stockfish"
        );
    }

    fn game_report() -> GameReport {
        let settings =
            AnalysisSettings::new(AnalysisLimit::depth(10).unwrap(), 2, Direction::Forward)
                .unwrap();
        let correlation = CorrelationResult {
            white: SideCorrelation::from_outcomes(&[true]),
            black: SideCorrelation::from_outcomes(&[]),
            book_plies: 0,
            player_white: Some("Alice".into()),
            player_black: Some("Bob".into()),
        };
        GameReport::new(
            "games.pgn",
            1,
            GameHeader::default(),
            &settings,
            vec!["Stockfish".into()],
            correlation,
        )
    }

    #[test]
    fn test_text_output() {
        let mut console = ConsoleObserver::new(Vec::new(), 2, false, vec!["Stockfish".into()]);
        console.on_file_start(Path::new("games.pgn"));
        console.on_ply_scored(&ply_report());
        console.on_game_finished(&game_report());

        let out = String::from_utf8(console.into_inner()).unwrap();
        assert!(out.starts_with("Analysis of: 'games.pgn' with 'Stockfish'\n"));
        assert!(out.contains("0%|#1|PV#: 1|+0.35|BM: e2e4|Engine: Stockfish\n"));
        assert!(out.contains("White (Alice): 100.00% (1/1)"));
        assert!(out.contains("Black (Bob): no data"));
    }

    #[test]
    fn test_inline_status_overwrites_the_line() {
        let mut console = ConsoleObserver::new(Vec::new(), 1, false, vec!["Stockfish".into()])
            .with_inline_status(true);
        let mut report = ply_report();
        report.analyses[0].recommendations.truncate(1);
        console.on_ply_scored(&report);
        console.on_game_finished(&game_report());

        let out = String::from_utf8(console.into_inner()).unwrap();
        assert!(out.starts_with("\r\x1b[K0%|#1|+0.35|BM: e2e4|Engine: Stockfish\n"));
    }

    /// Writer whose every write fails
    struct Closed;

    impl Write for Closed {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn test_write_failures_do_not_stop_logging() {
        let dir = std::env::temp_dir().join(format!("chess-correlation-closed-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);

        let mut console = ConsoleObserver::new(Closed, 1, false, vec!["Stockfish".into()])
            .with_log_dir(Some(dir.clone()))
            .with_inline_status(true);
        let pgn = Path::new("closed.pgn");
        console.on_file_start(pgn);
        console.on_ply_scored(&ply_report());
        console.on_game_finished(&game_report());
        console.on_file_end(pgn);

        let log = fs::read_to_string(dir.join("closed.log")).unwrap();
        assert!(log.contains("0%|#1|+0.35|BM: e2e4|Engine: Stockfish"));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_json_output_is_one_line_per_game() {
        let mut console = ConsoleObserver::new(Vec::new(), 2, true, vec!["Stockfish".into()]);
        console.on_file_start(Path::new("games.pgn"));
        console.on_ply_scored(&ply_report());
        console.on_game_finished(&game_report());

        let out = String::from_utf8(console.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 1);
        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["correlation"]["white"]["percent"], 100.0);
    }

    #[test]
    fn test_log_file_mirrors_output() {
        let dir = std::env::temp_dir().join(format!("chess-correlation-log-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);

        let mut console = ConsoleObserver::new(io::sink(), 1, false, vec!["Stockfish".into()])
            .with_log_dir(Some(dir.clone()));
        let pgn = Path::new("/games/club.pgn");
        console.on_file_start(pgn);
        console.on_ply_scored(&ply_report());
        console.on_game_finished(&game_report());
        console.on_file_end(pgn);

        let log = fs::read_to_string(dir.join("club.log")).unwrap();
        assert!(log.contains("Analysis of: '/games/club.pgn'"));
        assert!(log.contains("0%|#1|+0.35|BM: e2e4|Engine: Stockfish"));
        assert!(log.contains("Black (Bob): no data"));
        fs::remove_dir_all(&dir).unwrap();
    }
}
