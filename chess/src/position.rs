//! Immutable board position.
//!
//! A `Position` is a value: applying a move produces a new `Position` and the
//! old one is untouched. This lets the session keep per-ply snapshots and lets
//! search branches work on private copies without any shared mutation.

use std::fmt;
use std::str::FromStr;

use cozy_chess::{Board, Color, Piece, Rank, Square};

use crate::fen::{self, FenError};
use crate::types::{PieceColor, PieceKind};

#[derive(Debug, Clone)]
pub struct Position {
    board: Board,
}

/// The four castling availability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CastlingRights {
    pub white_kingside: bool,
    pub white_queenside: bool,
    pub black_kingside: bool,
    pub black_queenside: bool,
}

impl Position {
    /// The standard starting arrangement.
    pub fn initial() -> Self {
        Self {
            board: Board::default(),
        }
    }

    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        fen::parse_fen(fen)
    }

    pub fn to_fen(&self) -> String {
        fen::format_fen(self)
    }

    pub(crate) fn from_board(board: Board) -> Self {
        Self { board }
    }

    pub(crate) fn board(&self) -> &Board {
        &self.board
    }

    pub fn side_to_move(&self) -> PieceColor {
        self.board.side_to_move().into()
    }

    pub fn piece_at(&self, square: Square) -> Option<(PieceKind, PieceColor)> {
        let piece = self.board.piece_on(square)?;
        let color = self.board.color_on(square)?;
        Some((piece.into(), color.into()))
    }

    /// Every occupied square with its piece, in square-index order.
    pub fn pieces(&self) -> impl Iterator<Item = (Square, PieceKind, PieceColor)> + '_ {
        self.board
            .occupied()
            .into_iter()
            .filter_map(move |sq| self.piece_at(sq).map(|(kind, color)| (sq, kind, color)))
    }

    pub fn count(&self, kind: PieceKind, color: PieceColor) -> usize {
        self.board
            .colored_pieces(Color::from(color), Piece::from(kind))
            .len() as usize
    }

    pub fn castling_rights(&self) -> CastlingRights {
        let white = self.board.castle_rights(Color::White);
        let black = self.board.castle_rights(Color::Black);
        CastlingRights {
            white_kingside: white.short.is_some(),
            white_queenside: white.long.is_some(),
            black_kingside: black.short.is_some(),
            black_queenside: black.long.is_some(),
        }
    }

    /// The square a pawn would land on when capturing en passant.
    pub fn en_passant(&self) -> Option<Square> {
        let file = self.board.en_passant()?;
        let rank = match self.board.side_to_move() {
            Color::White => Rank::Sixth,
            Color::Black => Rank::Third,
        };
        Some(Square::new(file, rank))
    }

    pub fn halfmove_clock(&self) -> u32 {
        self.board.halfmove_clock() as u32
    }

    pub fn fullmove_number(&self) -> u32 {
        self.board.fullmove_number() as u32
    }

    /// Zobrist key of the position, used for repetition detection.
    /// Covers placement, side to move, castling and en passant, not the counters.
    pub fn key(&self) -> u64 {
        self.board.hash()
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::initial()
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.to_fen() == other.to_fen()
    }
}

impl Eq for Position {}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_fen())
    }
}

impl FromStr for Position {
    type Err = FenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_fen(s)
    }
}
