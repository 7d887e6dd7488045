//! Static evaluation in centipawns, positive for White.

use chess::rules::legal_move_count;
use chess::{PieceColor, PieceKind, Position};

/// Weight of one legal move for the side to move.
pub const MOBILITY_WEIGHT: f64 = 0.2;

pub fn piece_value(kind: PieceKind) -> f64 {
    match kind {
        PieceKind::Pawn => 100.0,
        PieceKind::Knight => 320.0,
        PieceKind::Bishop => 330.0,
        PieceKind::Rook => 500.0,
        PieceKind::Queen => 900.0,
        PieceKind::King => 20_000.0,
    }
}

/// Material balance plus a mobility term for the side to move.
///
/// Terminal positions are not scored specially: a mated side simply has zero
/// mobility.
pub fn evaluate(position: &Position) -> f64 {
    let material: f64 = position
        .pieces()
        .map(|(_, kind, color)| match color {
            PieceColor::White => piece_value(kind),
            PieceColor::Black => -piece_value(kind),
        })
        .sum();

    let mobility = legal_move_count(position) as f64 * MOBILITY_WEIGHT;
    match position.side_to_move() {
        PieceColor::White => material + mobility,
        PieceColor::Black => material - mobility,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(fen: &str) -> Position {
        Position::from_fen(fen).unwrap()
    }

    #[test]
    fn test_initial_position_mobility_only() {
        // 20 legal moves for White, material balanced
        assert!((evaluate(&Position::initial()) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_mobility_sign_follows_side_to_move() {
        let black = pos("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1");
        assert!((evaluate(&black) + 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_material_advantage() {
        // White queen up, black to move with 5 king moves
        let p = pos("4k3/8/8/8/8/8/8/Q3K3 b - - 0 1");
        let expected = 900.0 - 5.0 * MOBILITY_WEIGHT;
        assert!((evaluate(&p) - expected).abs() < 1e-9);
    }
}
