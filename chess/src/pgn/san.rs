use chess_common::{file_to_char, format_piece_upper, format_square, rank_to_char};
use cozy_chess::{Board, Move, Piece, Square};

use crate::position::Position;
use crate::rules::{self, is_castle, is_en_passant, MoveRequest};
use crate::types::PieceKind;

/// Format a legal move as SAN. `legal` must be the full legal move list of
/// `board`, used for disambiguation.
pub(crate) fn format_san(
    board: &Board,
    mv: Move,
    legal: &[Move],
    check: bool,
    checkmate: bool,
) -> String {
    let mut san = String::new();
    let piece = board.piece_on(mv.from).unwrap_or(Piece::Pawn);

    if is_castle(board, mv) {
        if mv.to.file() as u8 > mv.from.file() as u8 {
            san.push_str("O-O");
        } else {
            san.push_str("O-O-O");
        }
    } else {
        let capture = board.piece_on(mv.to).is_some() || is_en_passant(board, mv);

        match piece {
            Piece::Pawn => {
                if capture {
                    san.push(file_to_char(mv.from.file()));
                }
            }
            _ => {
                san.push(format_piece_upper(piece));
                san.push_str(&disambiguation(board, mv, piece, legal));
            }
        }

        if capture {
            san.push('x');
        }
        san.push_str(&format_square(mv.to));

        if let Some(promo) = mv.promotion {
            san.push('=');
            san.push(format_piece_upper(promo));
        }
    }

    if checkmate {
        san.push('#');
    } else if check {
        san.push('+');
    }
    san
}

/// File, rank, or both, whichever is needed to tell `mv` apart from other
/// pieces of the same type that can reach the same square.
fn disambiguation(board: &Board, mv: Move, piece: Piece, legal: &[Move]) -> String {
    let rivals: Vec<Square> = legal
        .iter()
        .filter(|other| {
            other.to == mv.to
                && other.from != mv.from
                && board.piece_on(other.from) == Some(piece)
                && !is_castle(board, **other)
        })
        .map(|other| other.from)
        .collect();

    if rivals.is_empty() {
        String::new()
    } else if rivals.iter().all(|sq| sq.file() != mv.from.file()) {
        file_to_char(mv.from.file()).to_string()
    } else if rivals.iter().all(|sq| sq.rank() != mv.from.rank()) {
        rank_to_char(mv.from.rank()).to_string()
    } else {
        format_square(mv.from)
    }
}

/// Parse Standard Algebraic Notation (SAN) move against the legal moves of
/// `position`. Check/mate suffixes and `!`/`?` annotations are ignored and
/// `0-0` is accepted for castling.
pub fn parse_san(position: &Position, san: &str) -> Result<MoveRequest, SanError> {
    let wanted = normalize(san);
    if wanted.len() < 2 {
        return Err(SanError::InvalidFormat(san.to_string()));
    }

    let moves = rules::legal_moves(position);
    let exact: Vec<_> = moves
        .iter()
        .filter(|m| normalize(m.san()) == wanted)
        .collect();
    if let [only] = exact.as_slice() {
        return Ok(only.request());
    }

    // Loose pass: tolerate a missing capture mark or promotion '='.
    let loose_wanted = loosen(&wanted);
    if loose_wanted.len() < 2 {
        return Err(SanError::InvalidFormat(san.to_string()));
    }
    let loose: Vec<_> = moves
        .iter()
        .filter(|m| loosen(&normalize(m.san())) == loose_wanted)
        .collect();
    match loose.as_slice() {
        [only] => return Ok(only.request()),
        [_, _, ..] => return Err(SanError::AmbiguousMove(san.to_string())),
        [] => {}
    }

    // An under-disambiguated piece move such as "Nd2" with two knights.
    let first = loose_wanted.chars().next().and_then(piece_letter);
    if let (Some(kind), true) = (first, loose_wanted.is_ascii()) {
        let dest = &loose_wanted[loose_wanted.len() - 2..];
        let reaching = moves
            .iter()
            .filter(|m| m.piece() == kind && format_square(m.to()) == dest)
            .count();
        if reaching > 1 {
            return Err(SanError::AmbiguousMove(san.to_string()));
        }
    }

    Err(SanError::NoLegalMove(san.to_string()))
}

fn normalize(san: &str) -> String {
    san.trim()
        .trim_end_matches(['+', '#', '!', '?'])
        .replace("0-0-0", "O-O-O")
        .replace("0-0", "O-O")
}

fn loosen(san: &str) -> String {
    san.chars().filter(|&c| c != 'x' && c != '=').collect()
}

fn piece_letter(c: char) -> Option<PieceKind> {
    match c {
        'N' | 'B' | 'R' | 'Q' | 'K' => PieceKind::from_char(c),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SanError {
    #[error("No legal move found for: {0}")]
    NoLegalMove(String),
    #[error("Ambiguous move: {0}")]
    AmbiguousMove(String),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}
