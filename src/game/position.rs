use chess::{Board, BoardStatus, ChessMove, Color, MoveGen, Piece, Square};
use std::str::FromStr;
use thiserror::Error;

use crate::game::utils::has_insufficient_material;

/// Halfmoves without a capture or pawn move after which the game is drawn
const SEVENTY_FIVE_MOVE_PLIES: u32 = 150;
const FIVEFOLD: usize = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PositionError {
    #[error("unparsable move `{0}`")]
    Unparsable(String),
    #[error("illegal move `{mv}` at ply {ply}")]
    Illegal { mv: String, ply: usize },
}

/// How a game ended on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Decisive { winner: Color },
    Draw,
}

impl Outcome {
    pub fn result_str(&self) -> &'static str {
        match self {
            Outcome::Decisive { winner: Color::White } => "1-0",
            Outcome::Decisive { winner: Color::Black } => "0-1",
            Outcome::Draw => "1/2-1/2",
        }
    }
}

/// Board state rebuilt by replaying moves from the start position.
///
/// Besides the board it keeps what the rules need that a bare board does
/// not carry: the halfmove clock and the hash of every position seen.
#[derive(Debug, Clone)]
pub struct Position {
    board: Board,
    moves: Vec<ChessMove>,
    hashes: Vec<u64>,
    halfmove_clock: u32,
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

impl Position {
    pub fn start() -> Self {
        Self::from_board(Board::default())
    }

    pub fn from_board(board: Board) -> Self {
        Self {
            board,
            moves: Vec::new(),
            hashes: vec![board.get_hash()],
            halfmove_clock: 0,
        }
    }

    /// Rebuild the position from a space separated UCI move list.
    pub fn replay(moves: &str) -> Result<Self, PositionError> {
        let mut position = Self::start();
        for uci in moves.split_whitespace() {
            position.push_uci(uci)?;
        }
        Ok(position)
    }

    pub fn push_uci(&mut self, uci: &str) -> Result<(), PositionError> {
        let mv = parse_uci(uci).ok_or_else(|| PositionError::Unparsable(uci.to_string()))?;
        if !self.board.legal(mv) {
            return Err(PositionError::Illegal {
                mv: uci.to_string(),
                ply: self.moves.len() + 1,
            });
        }
        self.push(mv);
        Ok(())
    }

    fn push(&mut self, mv: ChessMove) {
        let resets_clock = self.board.piece_on(mv.get_source()) == Some(Piece::Pawn)
            || self.board.piece_on(mv.get_dest()).is_some();
        self.halfmove_clock = if resets_clock { 0 } else { self.halfmove_clock + 1 };
        self.board = self.board.make_move_new(mv);
        self.moves.push(mv);
        self.hashes.push(self.board.get_hash());
    }

    #[cfg(test)]
    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn side_to_move(&self) -> Color {
        self.board.side_to_move()
    }

    #[cfg(test)]
    pub fn moves(&self) -> &[ChessMove] {
        &self.moves
    }

    pub fn legal_moves(&self) -> Vec<ChessMove> {
        MoveGen::new_legal(&self.board).collect()
    }

    pub fn fullmove_number(&self) -> usize {
        self.moves.len() / 2 + 1
    }

    pub fn is_legal(&self, mv: ChessMove) -> bool {
        self.board.legal(mv)
    }

    /// FEN with the real halfmove clock and fullmove number
    pub fn fen(&self) -> String {
        let board_fen = self.board.to_string();
        let fields: Vec<&str> = board_fen.split_whitespace().take(4).collect();
        format!(
            "{} {} {}",
            fields.join(" "),
            self.halfmove_clock,
            self.fullmove_number()
        )
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match self.board.status() {
            BoardStatus::Checkmate => {
                return Some(Outcome::Decisive {
                    winner: !self.side_to_move(),
                })
            }
            BoardStatus::Stalemate => return Some(Outcome::Draw),
            _ => {}
        }
        if has_insufficient_material(&self.board)
            || self.halfmove_clock >= SEVENTY_FIVE_MOVE_PLIES
            || self.repetitions() >= FIVEFOLD
        {
            return Some(Outcome::Draw);
        }
        None
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome().is_some()
    }

    fn repetitions(&self) -> usize {
        let current = self.board.get_hash();
        self.hashes.iter().filter(|hash| **hash == current).count()
    }
}

/// True iff the game is still running and `own_color` is to move.
pub fn is_my_turn(position: &Position, own_color: Color) -> bool {
    !position.is_terminal() && position.side_to_move() == own_color
}

/// Parse a long algebraic move such as `e2e4` or `e7e8q`.
pub fn parse_uci(uci: &str) -> Option<ChessMove> {
    if !uci.is_ascii() || !(4..=5).contains(&uci.len()) {
        return None;
    }
    let source = Square::from_str(&uci[0..2]).ok()?;
    let dest = Square::from_str(&uci[2..4]).ok()?;
    let promotion = match uci.as_bytes().get(4) {
        None => None,
        Some(b'q') => Some(Piece::Queen),
        Some(b'r') => Some(Piece::Rook),
        Some(b'b') => Some(Piece::Bishop),
        Some(b'n') => Some(Piece::Knight),
        Some(_) => return None,
    };
    Some(ChessMove::new(source, dest, promotion))
}
