//! Opening book lookup
//!
//! Positions found in the book are treated as theory and are not scored.

mod polyglot;

use shakmaty::Chess;

pub use polyglot::{BookEntry, PolyglotBook};

/// Answers whether a position is a known book position
pub trait OpeningBook {
    fn contains(&self, position: &Chess) -> bool;
}

/// A book with no positions, used when no book file is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyBook;

impl OpeningBook for EmptyBook {
    fn contains(&self, _position: &Chess) -> bool {
        false
    }
}

impl<B: OpeningBook + ?Sized> OpeningBook for &B {
    fn contains(&self, position: &Chess) -> bool {
        (**self).contains(position)
    }
}

impl<B: OpeningBook> OpeningBook for Option<B> {
    fn contains(&self, position: &Chess) -> bool {
        self.as_ref().map_or(false, |book| book.contains(position))
    }
}
