//! Coordinate move notation helpers

use cozy_chess::{File, Move, Piece, Square};

use crate::converters::{parse_piece, parse_square};

/// Convert a cozy_chess castling move (king onto rook) to the king's
/// two-square destination used by UCI and displayed to users.
pub fn convert_cozy_castling_to_uci(mv: Move) -> Move {
    let to_file = if mv.to.file() as u8 > mv.from.file() as u8 {
        File::G
    } else {
        File::C
    };
    Move {
        from: mv.from,
        to: Square::new(to_file, mv.from.rank()),
        promotion: None,
    }
}

/// Parse UCI coordinate text into its parts. Returns `None` on malformed input
/// or a promotion letter that is not one of n/b/r/q.
pub fn parse_uci_move(text: &str) -> Option<(Square, Square, Option<Piece>)> {
    let text = text.trim();
    if !text.is_ascii() || !(4..=5).contains(&text.len()) {
        return None;
    }
    let from = parse_square(&text[0..2])?;
    let to = parse_square(&text[2..4])?;
    let promotion = match text[4..].chars().next() {
        None => None,
        Some(c) => match parse_piece(c)? {
            Piece::Pawn | Piece::King => return None,
            piece => Some(piece),
        },
    };
    Some((from, to, promotion))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        parse_square(s).unwrap()
    }

    #[test]
    fn test_parse_uci_move() {
        assert_eq!(parse_uci_move("e2e4"), Some((sq("e2"), sq("e4"), None)));
        assert_eq!(
            parse_uci_move("a7a8q"),
            Some((sq("a7"), sq("a8"), Some(Piece::Queen)))
        );
        assert_eq!(parse_uci_move("a7a8k"), None);
        assert_eq!(parse_uci_move("e2"), None);
        assert_eq!(parse_uci_move("e2e9"), None);
    }

    #[test]
    fn test_cozy_castling_to_uci() {
        let long = Move {
            from: sq("e8"),
            to: sq("a8"),
            promotion: None,
        };
        assert_eq!(convert_cozy_castling_to_uci(long).to, sq("c8"));
    }
}
