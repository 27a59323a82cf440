//! Parsing of UCI `info` lines

use shakmaty::uci::UciMove;

use super::analysis::Score;

/// The parts of an `info` line needed to rank analysis lines
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfoLine {
    pub depth: Option<u32>,
    /// 1-based line index; engines omit it when MultiPV is 1
    pub multipv: Option<u32>,
    pub score: Option<Score>,
    /// Score is only a lower or upper bound
    pub bound: bool,
    pub nodes: Option<u64>,
    pub time_ms: Option<u64>,
    pub pv: Vec<UciMove>,
}

impl InfoLine {
    /// Parses an `info ...` line. Returns `None` for anything else.
    ///
    /// Unparsable moves inside the `pv` field end the variation there.
    pub fn parse(line: &str) -> Option<InfoLine> {
        let mut parts = line.split_whitespace();
        if parts.next() != Some("info") {
            return None;
        }

        let parts: Vec<&str> = parts.collect();
        let mut info = InfoLine::default();
        let mut i = 0;

        while i < parts.len() {
            match parts[i] {
                "depth" => {
                    info.depth = parts.get(i + 1).and_then(|v| v.parse().ok());
                    i += 2;
                }
                "multipv" => {
                    info.multipv = parts.get(i + 1).and_then(|v| v.parse().ok());
                    i += 2;
                }
                "nodes" => {
                    info.nodes = parts.get(i + 1).and_then(|v| v.parse().ok());
                    i += 2;
                }
                "time" => {
                    info.time_ms = parts.get(i + 1).and_then(|v| v.parse().ok());
                    i += 2;
                }
                "score" => {
                    let value = parts.get(i + 2).and_then(|v| v.parse::<i32>().ok());
                    info.score = match (parts.get(i + 1), value) {
                        (Some(&"cp"), Some(cp)) => Some(Score::Centipawns(cp)),
                        (Some(&"mate"), Some(m)) => Some(Score::Mate(m)),
                        _ => info.score,
                    };
                    i += 3;
                    if matches!(parts.get(i), Some(&"lowerbound") | Some(&"upperbound")) {
                        info.bound = true;
                        i += 1;
                    }
                }
                "pv" => {
                    // Everything after "pv" is the principal variation
                    info.pv = parts[i + 1..]
                        .iter()
                        .map_while(|m| m.parse::<UciMove>().ok())
                        .collect();
                    break;
                }
                // Free text until the end of the line
                "string" => break,
                _ => {
                    i += 1;
                }
            }
        }

        Some(info)
    }

    /// Line rank, defaulting to 1
    pub fn rank(&self) -> u32 {
        self.multipv.unwrap_or(1)
    }
}

/// Parses `bestmove <move> [ponder <move>]`. `Ok(None)` means the engine had no move.
pub fn parse_bestmove(line: &str) -> Option<Result<Option<UciMove>, String>> {
    let rest = line.strip_prefix("bestmove")?;
    let token = match rest.split_whitespace().next() {
        Some(token) => token,
        None => return Some(Err("bestmove without a move".to_string())),
    };
    if token == "(none)" || token == "0000" {
        return Some(Ok(None));
    }
    Some(
        token
            .parse::<UciMove>()
            .map(Some)
            .map_err(|_| format!("unparsable bestmove '{}'", token)),
    )
}
