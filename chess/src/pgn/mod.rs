//! Move-list notation: SAN plus turn-numbered transcripts.

pub mod parser;
pub mod san;

use crate::position::Position;
use crate::rules::Move;
use crate::types::PieceColor;

pub use parser::tokenize_move_list;
pub use san::{parse_san, SanError};

/// Export moves played from `start` as a linear, turn-numbered transcript
/// such as `1. f3 e5 2. g4 Qh4#`. A game starting with Black to move opens
/// with `N...`. `result` is appended verbatim when given.
pub fn format_move_list(start: &Position, moves: &[Move], result: Option<&str>) -> String {
    let mut tokens = Vec::with_capacity(moves.len() * 3 / 2 + 1);
    let mut number = start.fullmove_number();
    let mut white_to_move = start.side_to_move() == PieceColor::White;

    for (i, mv) in moves.iter().enumerate() {
        if white_to_move {
            tokens.push(format!("{}.", number));
        } else if i == 0 {
            tokens.push(format!("{}...", number));
        }
        tokens.push(mv.san().to_string());
        if !white_to_move {
            number += 1;
        }
        white_to_move = !white_to_move;
    }

    if let Some(result) = result {
        tokens.push(result.to_string());
    }
    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::apply_move;

    fn play(start: &Position, moves: &[&str]) -> Vec<Move> {
        let mut pos = start.clone();
        let mut played = Vec::new();
        for m in moves {
            let (next, mv) = apply_move(&pos, m.parse().unwrap()).unwrap();
            played.push(mv);
            pos = next;
        }
        played
    }

    #[test]
    fn test_format_fools_mate() {
        let start = Position::initial();
        let moves = play(&start, &["f2f3", "e7e5", "g2g4", "d8h4"]);
        assert_eq!(
            format_move_list(&start, &moves, Some("0-1")),
            "1. f3 e5 2. g4 Qh4# 0-1"
        );
    }

    #[test]
    fn test_format_black_to_move_start() {
        let start =
            Position::from_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1")
                .unwrap();
        let moves = play(&start, &["e7e5", "g1f3"]);
        assert_eq!(format_move_list(&start, &moves, None), "1... e5 2. Nf3");
    }

    #[test]
    fn test_format_empty() {
        assert_eq!(format_move_list(&Position::initial(), &[], None), "");
    }
}
