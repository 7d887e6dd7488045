use cozy_chess::Board;

use crate::position::Position;

/// Parse a FEN string into a Position.
///
/// All six fields are required. The result is a fresh value, so a failed
/// parse never touches any existing position.
pub fn parse_fen(fen: &str) -> Result<Position, FenError> {
    let parts: Vec<&str> = fen.split_whitespace().collect();
    if parts.len() != 6 {
        return Err(FenError::InvalidNotation(format!(
            "expected 6 fields, found {}",
            parts.len()
        )));
    }

    let placement = parts[0];
    let white_kings = placement.chars().filter(|&c| c == 'K').count();
    let black_kings = placement.chars().filter(|&c| c == 'k').count();
    if white_kings != 1 || black_kings != 1 {
        return Err(FenError::InvalidNotation(
            "each side must have exactly one king".to_string(),
        ));
    }

    let board = Board::from_fen(&parts.join(" "), false)
        .map_err(|e| FenError::InvalidNotation(format!("{:?}", e)))?;
    Ok(Position::from_board(board))
}

/// Format a Position as a FEN string
pub fn format_fen(position: &Position) -> String {
    // cozy-chess Display emits standard (non-Shredder) FEN
    position.board().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FenError {
    #[error("Invalid board notation: {0}")]
    InvalidNotation(String),
}
