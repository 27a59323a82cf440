//! Board state with forward push and backward pop of moves

use shakmaty::{Chess, Color, Move, Position};

use crate::error::{Error, Result};

/// A position plus the stack of moves that led to it from a start position.
///
/// Every pushed move keeps the position it was played from, so popping is
/// just discarding the top of the stack.
#[derive(Debug, Clone)]
pub struct Board {
    start: Chess,
    history: Vec<(Chess, Move)>,
    current: Chess,
}

impl Board {
    pub fn new(start: Chess) -> Self {
        Board {
            current: start.clone(),
            start,
            history: Vec::new(),
        }
    }

    /// Builds a board at the position reached after playing `moves` from `start`.
    pub fn replayed<I>(start: Chess, moves: I) -> Result<Self>
    where
        I: IntoIterator<Item = Move>,
    {
        let mut board = Board::new(start);
        for mv in moves {
            board.push(mv)?;
        }
        Ok(board)
    }

    /// Plays a legal move on the board.
    pub fn push(&mut self, mv: Move) -> Result<()> {
        let next = self.current.clone().play(mv.clone()).map_err(|_| {
            Error::MalformedGame(format!(
                "illegal move at ply {}: {:?}",
                self.ply(),
                mv
            ))
        })?;
        let previous = std::mem::replace(&mut self.current, next);
        self.history.push((previous, mv));
        Ok(())
    }

    /// Undoes the last pushed move and returns it.
    pub fn pop(&mut self) -> Option<Move> {
        let (previous, mv) = self.history.pop()?;
        self.current = previous;
        Some(mv)
    }

    pub fn position(&self) -> &Chess {
        &self.current
    }

    pub fn start(&self) -> &Chess {
        &self.start
    }

    /// Moves pushed since the start position, oldest first
    pub fn moves(&self) -> impl Iterator<Item = &Move> {
        self.history.iter().map(|(_, mv)| mv)
    }

    /// Number of moves pushed since the start position.
    pub fn ply(&self) -> usize {
        self.history.len()
    }

    pub fn turn(&self) -> Color {
        self.current.turn()
    }

    pub fn fullmove_number(&self) -> u32 {
        self.current.fullmoves().get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shakmaty::san::San;

    fn san_move(pos: &Chess, san: &str) -> Move {
        san.parse::<San>().unwrap().to_move(pos).unwrap()
    }

    #[test]
    fn test_push_and_pop_restore_positions() {
        let mut board = Board::new(Chess::default());
        let e4 = san_move(board.position(), "e4");
        board.push(e4.clone()).unwrap();
        assert_eq!(board.turn(), Color::Black);
        assert_eq!(board.ply(), 1);

        let e5 = san_move(board.position(), "e5");
        board.push(e5.clone()).unwrap();
        assert_eq!(board.fullmove_number(), 2);

        assert_eq!(board.pop(), Some(e5));
        assert_eq!(board.turn(), Color::Black);
        assert_eq!(board.pop(), Some(e4));
        assert_eq!(board.position().board(), Chess::default().board());
        assert_eq!(board.turn(), Color::White);
        assert_eq!(board.pop(), None);
    }

    #[test]
    fn test_replayed_reaches_final_position() {
        let start = Chess::default();
        let e4 = san_move(&start, "e4");
        let after_e4 = start.clone().play(e4.clone()).unwrap();
        let c5 = san_move(&after_e4, "c5");

        let board = Board::replayed(start, vec![e4, c5]).unwrap();
        assert_eq!(board.ply(), 2);
        assert_eq!(board.turn(), Color::White);
        assert_eq!(board.start().board(), Chess::default().board());
    }

    #[test]
    fn test_illegal_move_is_malformed_game() {
        let start = Chess::default();
        let e4 = san_move(&start, "e4");
        let mut board = Board::new(start);
        board.push(e4.clone()).unwrap();

        // White's move replayed with Black to move
        let err = board.push(e4).unwrap_err();
        assert!(matches!(err, Error::MalformedGame(_)));
        assert_eq!(board.ply(), 1);
    }
}
