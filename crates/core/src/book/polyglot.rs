//! Polyglot (.bin) opening book reader

use std::fs;
use std::path::Path;

use serde::Serialize;
use shakmaty::uci::UciMove;
use shakmaty::zobrist::Zobrist64;
use shakmaty::{Chess, EnPassantMode, Move, Position};
use tracing::info;

use super::OpeningBook;
use crate::error::{Error, Result};

const ENTRY_SIZE: usize = 16;
const FILES: &[u8] = b"abcdefgh";
const PROMOTIONS: &[&str] = &["", "n", "b", "r", "q"];

/// One book entry: a move known for a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BookEntry {
    pub key: u64,
    /// Raw Polyglot move encoding
    pub raw_move: u16,
    pub weight: u16,
    pub learn: u32,
}

impl BookEntry {
    /// Decodes one big-endian 16 byte record
    fn parse(bytes: &[u8]) -> Option<Self> {
        Some(BookEntry {
            key: u64::from_be_bytes(bytes.get(0..8)?.try_into().ok()?),
            raw_move: u16::from_be_bytes(bytes.get(8..10)?.try_into().ok()?),
            weight: u16::from_be_bytes(bytes.get(10..12)?.try_into().ok()?),
            learn: u32::from_be_bytes(bytes.get(12..16)?.try_into().ok()?),
        })
    }

    /// The move in UCI notation, with castling written king-to-destination
    pub fn uci(&self) -> String {
        let square = |shift: u16| {
            let file = FILES[usize::from((self.raw_move >> shift) & 7)] as char;
            let rank = ((self.raw_move >> (shift + 3)) & 7) as u8 + b'1';
            format!("{}{}", file, rank as char)
        };
        let from = square(6);
        let mut to = square(0);
        let promotion = PROMOTIONS
            .get(usize::from((self.raw_move >> 12) & 7))
            .copied()
            .unwrap_or("");

        // Polyglot encodes castling as the king capturing its own rook
        to = match (from.as_str(), to.as_str()) {
            ("e1", "h1") => "g1".to_string(),
            ("e1", "a1") => "c1".to_string(),
            ("e8", "h8") => "g8".to_string(),
            ("e8", "a8") => "c8".to_string(),
            _ => to,
        };

        format!("{}{}{}", from, to, promotion)
    }

    /// Resolves the entry's move in `position`, if it is legal there
    pub fn to_move(&self, position: &Chess) -> Option<Move> {
        self.uci()
            .parse::<UciMove>()
            .ok()
            .and_then(|uci| uci.to_move(position).ok())
    }
}

/// An in-memory Polyglot book, sorted by position key
#[derive(Debug, Clone, Default)]
pub struct PolyglotBook {
    entries: Vec<BookEntry>,
}

impl PolyglotBook {
    /// Loads a book file. Failures are configuration errors since the run cannot start without it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| {
            Error::Configuration(format!("cannot read opening book {}: {}", path.display(), e))
        })?;
        let book = Self::from_bytes(&bytes).map_err(|e| match e {
            Error::Configuration(msg) => {
                Error::Configuration(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;
        info!(path = %path.display(), entries = book.len(), "loaded opening book");
        Ok(book)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % ENTRY_SIZE != 0 {
            return Err(Error::Configuration(format!(
                "opening book size {} is not a multiple of {} bytes",
                bytes.len(),
                ENTRY_SIZE
            )));
        }
        let entries = bytes
            .chunks_exact(ENTRY_SIZE)
            .filter_map(BookEntry::parse)
            .collect();
        Ok(Self::from_entries(entries))
    }

    pub fn from_entries(mut entries: Vec<BookEntry>) -> Self {
        if !entries.windows(2).all(|w| w[0].key <= w[1].key) {
            entries.sort_by_key(|e| e.key);
        }
        PolyglotBook { entries }
    }

    /// Polyglot key of a position
    pub fn key(position: &Chess) -> u64 {
        position.zobrist_hash::<Zobrist64>(EnPassantMode::Legal).0
    }

    /// All entries for `position`; empty when it is not a book position
    pub fn entries(&self, position: &Chess) -> &[BookEntry] {
        let key = Self::key(position);
        let start = self.entries.partition_point(|e| e.key < key);
        let end = self.entries.partition_point(|e| e.key <= key);
        &self.entries[start..end]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl OpeningBook for PolyglotBook {
    /// Only entries with a positive weight and a move legal in `position` count
    fn contains(&self, position: &Chess) -> bool {
        self.entries(position)
            .iter()
            .any(|e| e.weight >= 1 && e.to_move(position).is_some())
    }
}
