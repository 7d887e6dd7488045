//! Game status derivation.
//!
//! `GameStatus` is never stored on its own; it is recomputed from a position
//! (plus the repetition history, which a bare position cannot provide)
//! whenever the position changes.

use std::fmt;

use cozy_chess::{BitBoard, Piece};

use crate::position::Position;
use crate::rules;
use crate::types::PieceColor;

/// Half-move clock value at which the fifty-move rule applies.
pub const FIFTY_MOVE_HALFMOVES: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameStatus {
    Playing { in_check: bool },
    Checkmate { winner: PieceColor },
    Stalemate,
    Draw { reason: DrawReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawReason {
    FiftyMoveRule,
    InsufficientMaterial,
    ThreefoldRepetition,
}

impl GameStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Playing { .. })
    }

    /// Transcript result token for a finished game.
    pub fn result_token(&self) -> Option<&'static str> {
        match self {
            Self::Playing { .. } => None,
            Self::Checkmate {
                winner: PieceColor::White,
            } => Some("1-0"),
            Self::Checkmate {
                winner: PieceColor::Black,
            } => Some("0-1"),
            Self::Stalemate | Self::Draw { .. } => Some("1/2-1/2"),
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Playing { in_check: false } => write!(f, "playing"),
            Self::Playing { in_check: true } => write!(f, "check"),
            Self::Checkmate { winner } => write!(f, "checkmate, {} wins", winner),
            Self::Stalemate => write!(f, "stalemate"),
            Self::Draw { reason } => write!(f, "draw by {}", reason),
        }
    }
}

impl fmt::Display for DrawReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FiftyMoveRule => "fifty-move rule",
            Self::InsufficientMaterial => "insufficient material",
            Self::ThreefoldRepetition => "threefold repetition",
        })
    }
}

/// Derive the status of `position`.
///
/// `history_keys` holds the [`Position::key`] of every position reached since
/// the repetition count started, including `position` itself. Pass an empty
/// slice when no history is available; repetition is then never reported.
pub fn derive_status(position: &Position, history_keys: &[u64]) -> GameStatus {
    let in_check = rules::in_check(position);

    if rules::legal_move_count(position) == 0 {
        return if in_check {
            GameStatus::Checkmate {
                winner: position.side_to_move().opposite(),
            }
        } else {
            GameStatus::Stalemate
        };
    }

    if position.halfmove_clock() >= FIFTY_MOVE_HALFMOVES {
        return GameStatus::Draw {
            reason: DrawReason::FiftyMoveRule,
        };
    }

    if insufficient_material(position) {
        return GameStatus::Draw {
            reason: DrawReason::InsufficientMaterial,
        };
    }

    let key = position.key();
    if history_keys.iter().filter(|&&k| k == key).count() >= 3 {
        return GameStatus::Draw {
            reason: DrawReason::ThreefoldRepetition,
        };
    }

    GameStatus::Playing { in_check }
}

/// K v K, K+minor v K, and positions where every remaining minor piece is a
/// bishop on the same square color.
pub fn insufficient_material(position: &Position) -> bool {
    let board = position.board();
    let heavy = board.pieces(Piece::Pawn) | board.pieces(Piece::Rook) | board.pieces(Piece::Queen);
    if !heavy.is_empty() {
        return false;
    }

    let knights = board.pieces(Piece::Knight);
    let bishops = board.pieces(Piece::Bishop);
    let minors = knights.len() + bishops.len();
    if minors <= 1 {
        return true;
    }

    knights.is_empty() && same_square_color(bishops)
}

fn same_square_color(squares: BitBoard) -> bool {
    let mut parities = squares
        .into_iter()
        .map(|sq| (sq.file() as u8 + sq.rank() as u8) % 2);
    match parities.next() {
        Some(first) => parities.all(|p| p == first),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::apply_move;

    fn pos(fen: &str) -> Position {
        Position::from_fen(fen).unwrap()
    }

    #[test]
    fn test_initial_is_playing() {
        assert_eq!(
            derive_status(&Position::initial(), &[]),
            GameStatus::Playing { in_check: false }
        );
    }

    #[test]
    fn test_checkmate() {
        let p = pos("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3");
        let status = derive_status(&p, &[]);
        assert_eq!(
            status,
            GameStatus::Checkmate {
                winner: PieceColor::Black
            }
        );
        assert!(status.is_terminal());
        assert_eq!(status.result_token(), Some("0-1"));
    }

    #[test]
    fn test_stalemate() {
        let p = pos("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1");
        assert_eq!(derive_status(&p, &[]), GameStatus::Stalemate);
    }

    #[test]
    fn test_check_is_playing() {
        let p = pos("4k3/8/8/8/8/8/4R3/4K3 b - - 0 1");
        assert_eq!(
            derive_status(&p, &[]),
            GameStatus::Playing { in_check: true }
        );
    }

    #[test]
    fn test_fifty_move_rule() {
        let p = pos("4k3/8/8/8/8/8/4R3/4K3 w - - 100 80");
        assert_eq!(
            derive_status(&p, &[]),
            GameStatus::Draw {
                reason: DrawReason::FiftyMoveRule
            }
        );
    }

    #[test]
    fn test_insufficient_material_cases() {
        assert!(insufficient_material(&pos("4k3/8/8/8/8/8/8/4K3 w - - 0 1")));
        assert!(insufficient_material(&pos("4k3/8/8/8/8/8/8/4KN2 w - - 0 1")));
        // bishops on c1 and f8 are both dark squares
        assert!(insufficient_material(&pos("4kb2/8/8/8/8/8/8/2B1K3 w - - 0 1")));
        // c1 dark, c8 light
        assert!(!insufficient_material(&pos("2b1k3/8/8/8/8/8/8/2B1K3 w - - 0 1")));
        assert!(!insufficient_material(&pos("4k3/8/8/8/8/8/8/3NKN2 w - - 0 1")));
        assert!(!insufficient_material(&pos("4k3/4p3/8/8/8/8/8/4K3 w - - 0 1")));
        assert_eq!(
            derive_status(&pos("4k3/8/8/8/8/8/8/4K3 w - - 0 1"), &[]),
            GameStatus::Draw {
                reason: DrawReason::InsufficientMaterial
            }
        );
    }

    #[test]
    fn test_threefold_repetition_needs_history() {
        let mut p = Position::initial();
        let mut keys = vec![p.key()];
        for _ in 0..2 {
            for m in ["g1f3", "g8f6", "f3g1", "f6g8"] {
                p = apply_move(&p, m.parse().unwrap()).unwrap().0;
                keys.push(p.key());
            }
        }
        assert_eq!(
            derive_status(&p, &keys),
            GameStatus::Draw {
                reason: DrawReason::ThreefoldRepetition
            }
        );
        assert_eq!(
            derive_status(&p, &[]),
            GameStatus::Playing { in_check: false }
        );
    }
}
