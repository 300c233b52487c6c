use chess::{BitBoard, Board, Color, Piece, Square};

use crate::game::position::Outcome;
use crate::models::memory::GameResult;

/// Convert a chess color to a string
pub fn color_to_string(color: Color) -> String {
    match color {
        Color::White => "white".to_string(),
        Color::Black => "black".to_string(),
    }
}

/// Classify a finished game from the point of view of `own_color`
pub fn classify(outcome: Outcome, own_color: Color) -> GameResult {
    match outcome {
        Outcome::Decisive { winner } if winner == own_color => GameResult::Win,
        Outcome::Decisive { .. } => GameResult::Loss,
        Outcome::Draw => GameResult::Draw,
    }
}

fn is_light(square: Square) -> bool {
    (square.get_rank().to_index() + square.get_file().to_index()) % 2 == 1
}

/// Check if the board has insufficient material for checkmate
pub fn has_insufficient_material(board: &Board) -> bool {
    let heavy = *board.pieces(Piece::Pawn) | *board.pieces(Piece::Rook) | *board.pieces(Piece::Queen);
    if heavy != BitBoard(0) {
        return false;
    }

    let knights = *board.pieces(Piece::Knight);
    let bishops = *board.pieces(Piece::Bishop);
    let minors = knights | bishops;

    match minors.popcnt() {
        // King vs King, or a single minor piece against a bare king
        0 | 1 => true,
        // King and Bishop vs King and Bishop (bishops on same color)
        2 if knights == BitBoard(0) => {
            let white = bishops & *board.color_combined(Color::White);
            let black = bishops & *board.color_combined(Color::Black);
            if white.popcnt() != 1 || black.popcnt() != 1 {
                return false;
            }
            let mut squares = bishops.into_iter();
            match (squares.next(), squares.next()) {
                (Some(a), Some(b)) => is_light(a) == is_light(b),
                _ => false,
            }
        }
        _ => false,
    }
}
