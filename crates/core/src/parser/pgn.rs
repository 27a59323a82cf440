//! PGN file parsing functionality

use pgn_reader::{RawTag, SanPlus, Skip, Visitor};
use serde::Serialize;
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, Move, Position};
use std::fs;
use std::io::Cursor;
use std::ops::ControlFlow;
use std::path::Path;

use crate::board::Board;
use crate::error::{Error, Result};

/// Header tags of a game
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GameHeader {
    pub event: Option<String>,
    pub site: Option<String>,
    pub date: Option<String>,
    pub round: Option<String>,
    pub white: Option<String>,
    pub black: Option<String>,
    pub result: Option<String>,
    pub white_elo: Option<u16>,
    pub black_elo: Option<u16>,
    pub eco: Option<String>,
    pub opening: Option<String>,
    /// Start position when the game does not begin from the initial position
    pub fen: Option<String>,
}

impl GameHeader {
    pub fn summary(&self) -> String {
        let white = self.white.as_deref().unwrap_or("Unknown");
        let black = self.black.as_deref().unwrap_or("Unknown");
        let result = self.result.as_deref().unwrap_or("*");
        format!("{} vs {} - {}", white, black, result)
    }
}

/// A move as recorded in the game
#[derive(Debug, Clone)]
pub struct PlayedMove {
    pub san: String,
    pub mv: Move,
}

/// Represents a parsed chess game
#[derive(Debug, Clone)]
pub struct GameRecord {
    pub header: GameHeader,
    pub start: Chess,
    pub moves: Vec<PlayedMove>,
}

impl GameRecord {
    pub fn move_count(&self) -> usize {
        self.moves.len()
    }

    pub fn summary(&self) -> String {
        self.header.summary()
    }

    /// Board at the start position
    pub fn initial_board(&self) -> Board {
        Board::new(self.start.clone())
    }

    /// Board after every recorded move
    pub fn final_board(&self) -> Result<Board> {
        Board::replayed(self.start.clone(), self.moves.iter().map(|m| m.mv.clone()))
    }
}

struct GameMoves {
    header: GameHeader,
    start: Chess,
    moves: Vec<PlayedMove>,
    current_position: Chess,
    error: Option<String>,
}

struct GameParser;

impl Visitor for GameParser {
    type Tags = GameHeader;
    type Movetext = GameMoves;
    type Output = Result<GameRecord>;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, Self::Tags> {
        ControlFlow::Continue(GameHeader::default())
    }

    fn tag(
        &mut self,
        tags: &mut Self::Tags,
        name: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        let name_str = String::from_utf8_lossy(name);
        let value_str = value.decode_utf8_lossy().to_string();

        match name_str.as_ref() {
            "Event" => tags.event = Some(value_str),
            "Site" => tags.site = Some(value_str),
            "Date" => tags.date = Some(value_str),
            "Round" => tags.round = Some(value_str),
            "White" => tags.white = Some(value_str),
            "Black" => tags.black = Some(value_str),
            "Result" => tags.result = Some(value_str),
            "WhiteElo" => tags.white_elo = value_str.parse().ok(),
            "BlackElo" => tags.black_elo = value_str.parse().ok(),
            "ECO" => tags.eco = Some(value_str),
            "Opening" => tags.opening = Some(value_str),
            "FEN" => tags.fen = Some(value_str),
            _ => {}
        }

        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, header: Self::Tags) -> ControlFlow<Self::Output, Self::Movetext> {
        let (start, error) = match header.fen.as_deref().map(start_position) {
            None => (Chess::default(), None),
            Some(Ok(position)) => (position, None),
            Some(Err(reason)) => (Chess::default(), Some(reason)),
        };

        ControlFlow::Continue(GameMoves {
            header,
            current_position: start.clone(),
            start,
            moves: Vec::new(),
            error,
        })
    }

    fn san(&mut self, movetext: &mut Self::Movetext, san: SanPlus) -> ControlFlow<Self::Output> {
        if movetext.error.is_some() {
            return ControlFlow::Continue(());
        }

        let san_str = san.san.to_string();
        let ply = movetext.moves.len() + 1;

        match san.san.to_move(&movetext.current_position) {
            Ok(m) => match movetext.current_position.clone().play(m.clone()) {
                Ok(new_pos) => {
                    movetext.current_position = new_pos;
                    movetext.moves.push(PlayedMove { san: san_str, mv: m });
                }
                Err(_) => {
                    movetext.error = Some(format!("illegal move {} at ply {}", san_str, ply));
                }
            },
            Err(_) => {
                movetext.error = Some(format!("illegal move {} at ply {}", san_str, ply));
            }
        }

        ControlFlow::Continue(())
    }

    fn begin_variation(
        &mut self,
        _movetext: &mut Self::Movetext,
    ) -> ControlFlow<Self::Output, Skip> {
        ControlFlow::Continue(Skip(true))
    }

    fn end_game(&mut self, movetext: Self::Movetext) -> Self::Output {
        if let Some(reason) = movetext.error {
            return Err(Error::MalformedGame(format!(
                "{}: {}",
                movetext.header.summary(),
                reason
            )));
        }

        Ok(GameRecord {
            header: movetext.header,
            start: movetext.start,
            moves: movetext.moves,
        })
    }
}

fn start_position(fen: &str) -> std::result::Result<Chess, String> {
    let parsed: Fen = fen
        .parse()
        .map_err(|e| format!("invalid FEN tag '{}': {}", fen, e))?;
    parsed
        .into_position(CastlingMode::Standard)
        .map_err(|e| format!("impossible FEN position '{}': {}", fen, e))
}

/// Reads every game of a PGN file.
///
/// The outer error means the file itself could not be read; each game is
/// parsed independently so one malformed game does not hide the others.
pub fn parse_pgn_file<P: AsRef<Path>>(path: P) -> Result<Vec<Result<GameRecord>>> {
    let contents = fs::read_to_string(path)?;
    parse_pgn_string(&contents)
}

pub fn parse_pgn_string(pgn: &str) -> Result<Vec<Result<GameRecord>>> {
    let mut parser = GameParser;
    let mut games = Vec::new();

    let cursor = Cursor::new(pgn.as_bytes());
    let mut reader = pgn_reader::Reader::new(cursor);

    while let Some(game) = reader.read_game(&mut parser)? {
        games.push(game);
    }

    Ok(games)
}
