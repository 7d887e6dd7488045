//! Rules engine: legal move generation, move application and attack queries.
//!
//! Every function here is pure. Positions go in, new positions come out.

use std::fmt;
use std::str::FromStr;

use chess_common::{convert_cozy_castling_to_uci, format_square, parse_uci_move};
use cozy_chess::{
    get_bishop_moves, get_king_moves, get_knight_moves, get_pawn_attacks, get_rook_moves, Board,
    Color, Piece, Square,
};

use crate::pgn::san::format_san;
use crate::position::Position;
use crate::types::{CastleSide, PieceColor, PieceKind};

/// An unvalidated move request from the UI or the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MoveRequest {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceKind>,
}

impl MoveRequest {
    pub fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }

    pub fn with_promotion(mut self, piece: PieceKind) -> Self {
        self.promotion = Some(piece);
        self
    }
}

impl fmt::Display for MoveRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", format_square(self.from), format_square(self.to))?;
        if let Some(piece) = self.promotion {
            write!(f, "{}", piece.to_char_lower())?;
        }
        Ok(())
    }
}

impl FromStr for MoveRequest {
    type Err = ParseMoveError;

    /// Parses UCI coordinate text such as `e2e4` or `e7e8q`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (from, to, promotion) =
            parse_uci_move(s).ok_or_else(|| ParseMoveError(s.trim().to_string()))?;
        Ok(Self {
            from,
            to,
            promotion: promotion.map(PieceKind::from),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid move text: {0}")]
pub struct ParseMoveError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("Illegal move: {0}")]
    IllegalMove(MoveRequest),
    #[error("Promotion piece required for {0}")]
    PromotionRequired(MoveRequest),
}

/// A legal move, as produced by the generator for one specific position.
///
/// There is no public constructor: the only way to obtain a `Move` is from
/// [`legal_moves`], [`legal_moves_from`] or [`apply_move`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Move {
    from: Square,
    to: Square,
    piece: PieceKind,
    color: PieceColor,
    promotion: Option<PieceKind>,
    captured: Option<PieceKind>,
    en_passant: bool,
    castle: Option<CastleSide>,
    check: bool,
    checkmate: bool,
    san: String,
}

impl Move {
    pub fn from(&self) -> Square {
        self.from
    }

    /// Destination square. Castling moves report the king's destination.
    pub fn to(&self) -> Square {
        self.to
    }

    pub fn piece(&self) -> PieceKind {
        self.piece
    }

    pub fn color(&self) -> PieceColor {
        self.color
    }

    pub fn promotion(&self) -> Option<PieceKind> {
        self.promotion
    }

    pub fn captured(&self) -> Option<PieceKind> {
        self.captured
    }

    pub fn is_capture(&self) -> bool {
        self.captured.is_some()
    }

    pub fn is_en_passant(&self) -> bool {
        self.en_passant
    }

    pub fn castle(&self) -> Option<CastleSide> {
        self.castle
    }

    pub fn is_check(&self) -> bool {
        self.check
    }

    pub fn is_checkmate(&self) -> bool {
        self.checkmate
    }

    /// Standard algebraic notation, including check and mate suffixes.
    pub fn san(&self) -> &str {
        &self.san
    }

    /// Coordinate notation (`e2e4`, `e7e8q`, `e1g1`).
    pub fn uci(&self) -> String {
        self.request().to_string()
    }

    pub fn request(&self) -> MoveRequest {
        MoveRequest {
            from: self.from,
            to: self.to,
            promotion: self.promotion,
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.san)
    }
}

/// All legal moves for the side to move.
pub fn legal_moves(position: &Position) -> Vec<Move> {
    let board = position.board();
    let raw = raw_legal_moves(board);
    raw.iter().map(|&mv| describe_move(board, mv, &raw)).collect()
}

/// Legal moves starting on `square`, for highlighting candidate destinations.
pub fn legal_moves_from(position: &Position, square: Square) -> Vec<Move> {
    let board = position.board();
    let raw = raw_legal_moves(board);
    raw.iter()
        .filter(|mv| mv.from == square)
        .map(|&mv| describe_move(board, mv, &raw))
        .collect()
}

/// Validate `request` against the legal moves and play it.
///
/// When the request names a promotion square but no promotion piece, and only
/// promotion moves match, the result is `PromotionRequired` so the caller can
/// prompt and resubmit.
pub fn apply_move(position: &Position, request: MoveRequest) -> Result<(Position, Move), MoveError> {
    let board = position.board();
    let raw = raw_legal_moves(board);

    let candidates: Vec<cozy_chess::Move> = raw
        .iter()
        .copied()
        .filter(|&mv| matches_squares(board, mv, request.from, request.to))
        .collect();

    let chosen = match request.promotion {
        Some(piece) => candidates
            .iter()
            .copied()
            .find(|mv| mv.promotion == Some(Piece::from(piece))),
        None => {
            let plain = candidates.iter().copied().find(|mv| mv.promotion.is_none());
            if plain.is_none() && !candidates.is_empty() {
                return Err(MoveError::PromotionRequired(request));
            }
            plain
        }
    };

    let mv = chosen.ok_or(MoveError::IllegalMove(request))?;
    let described = describe_move(board, mv, &raw);
    let mut next = board.clone();
    next.play_unchecked(mv);
    Ok((Position::from_board(next), described))
}

/// Number of legal moves for the side to move, without building notation.
pub fn legal_move_count(position: &Position) -> usize {
    let mut count = 0;
    position.board().generate_moves(|moves| {
        count += moves.len();
        false
    });
    count
}

/// Every legal successor position paired with the request that reaches it.
/// Skips notation entirely, for use inside search.
pub fn successors(position: &Position) -> Vec<(MoveRequest, Position)> {
    let board = position.board();
    raw_legal_moves(board)
        .into_iter()
        .map(|mv| {
            let mut next = board.clone();
            next.play_unchecked(mv);
            (raw_to_request(board, mv), Position::from_board(next))
        })
        .collect()
}

pub fn find_king_square(position: &Position, color: PieceColor) -> Square {
    position.board().king(Color::from(color))
}

/// Whether the side to move is in check.
pub fn in_check(position: &Position) -> bool {
    !position.board().checkers().is_empty()
}

/// Whether any piece of color `by` attacks `square`.
pub fn is_square_attacked(position: &Position, square: Square, by: PieceColor) -> bool {
    let board = position.board();
    let by = Color::from(by);
    let occupied = board.occupied();
    let theirs = |piece| board.colored_pieces(by, piece);

    let diagonal = theirs(Piece::Bishop) | theirs(Piece::Queen);
    let orthogonal = theirs(Piece::Rook) | theirs(Piece::Queen);

    !(get_pawn_attacks(square, !by) & theirs(Piece::Pawn)).is_empty()
        || !(get_knight_moves(square) & theirs(Piece::Knight)).is_empty()
        || !(get_king_moves(square) & theirs(Piece::King)).is_empty()
        || !(get_bishop_moves(square, occupied) & diagonal).is_empty()
        || !(get_rook_moves(square, occupied) & orthogonal).is_empty()
}

pub(crate) fn raw_legal_moves(board: &Board) -> Vec<cozy_chess::Move> {
    let mut moves = Vec::new();
    board.generate_moves(|mvs| {
        moves.extend(mvs);
        false
    });
    moves
}

/// cozy-chess encodes castling as the king capturing its own rook.
pub(crate) fn is_castle(board: &Board, mv: cozy_chess::Move) -> bool {
    board.piece_on(mv.from) == Some(Piece::King) && board.color_on(mv.to) == board.color_on(mv.from)
}

pub(crate) fn is_en_passant(board: &Board, mv: cozy_chess::Move) -> bool {
    board.piece_on(mv.from) == Some(Piece::Pawn)
        && mv.from.file() != mv.to.file()
        && board.piece_on(mv.to).is_none()
}

fn display_to(board: &Board, mv: cozy_chess::Move) -> Square {
    if is_castle(board, mv) {
        convert_cozy_castling_to_uci(mv).to
    } else {
        mv.to
    }
}

/// Castling accepts both the king's destination and the rook square.
fn matches_squares(board: &Board, mv: cozy_chess::Move, from: Square, to: Square) -> bool {
    mv.from == from && (mv.to == to || display_to(board, mv) == to)
}

fn raw_to_request(board: &Board, mv: cozy_chess::Move) -> MoveRequest {
    MoveRequest {
        from: mv.from,
        to: display_to(board, mv),
        promotion: mv.promotion.map(PieceKind::from),
    }
}

fn describe_move(board: &Board, mv: cozy_chess::Move, legal: &[cozy_chess::Move]) -> Move {
    // generated moves always start on an occupied square
    let piece = board.piece_on(mv.from).unwrap_or(Piece::Pawn);
    let color = board.side_to_move();
    let castle = is_castle(board, mv).then(|| {
        if mv.to.file() as u8 > mv.from.file() as u8 {
            CastleSide::Kingside
        } else {
            CastleSide::Queenside
        }
    });
    let en_passant = is_en_passant(board, mv);
    let captured = if en_passant {
        Some(PieceKind::Pawn)
    } else if castle.is_some() {
        None
    } else {
        board.piece_on(mv.to).map(PieceKind::from)
    };

    let mut after = board.clone();
    after.play_unchecked(mv);
    let check = !after.checkers().is_empty();
    let checkmate = check && !after.generate_moves(|_| true);

    Move {
        from: mv.from,
        to: display_to(board, mv),
        piece: piece.into(),
        color: color.into(),
        promotion: mv.promotion.map(PieceKind::from),
        captured,
        en_passant,
        castle,
        check,
        checkmate,
        san: format_san(board, mv, legal, check, checkmate),
    }
}
