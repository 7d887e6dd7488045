//! Conversions between rules-engine types and wire types.

use ::chess::{ClockState, GameStatus, Move, MoveRequest, PieceColor, PieceKind};
use chess_common::{format_square, parse_square};
use chess_proto::{ClockSnapshot, Color, DrawReason, MoveRecord, RemoteStatus};

use crate::session::GameError;

pub fn color_to_proto(color: PieceColor) -> Color {
    match color {
        PieceColor::White => Color::White,
        PieceColor::Black => Color::Black,
    }
}

pub fn move_to_record(mv: &Move) -> MoveRecord {
    MoveRecord {
        from: format_square(mv.from()),
        to: format_square(mv.to()),
        promotion: mv.promotion().map(|p| p.to_char_lower().to_string()),
        san: mv.san().to_string(),
    }
}

/// Rules status, overridden by a fallen flag.
pub fn status_to_proto(status: GameStatus, timeout_winner: Option<Color>) -> RemoteStatus {
    if let Some(winner) = timeout_winner {
        return RemoteStatus::Timeout { winner };
    }
    match status {
        GameStatus::Playing { in_check } => RemoteStatus::Playing { in_check },
        GameStatus::Checkmate { winner } => RemoteStatus::Checkmate {
            winner: color_to_proto(winner),
        },
        GameStatus::Stalemate => RemoteStatus::Stalemate,
        GameStatus::Draw { reason } => RemoteStatus::Draw {
            reason: match reason {
                ::chess::DrawReason::FiftyMoveRule => DrawReason::FiftyMoveRule,
                ::chess::DrawReason::InsufficientMaterial => DrawReason::InsufficientMaterial,
                ::chess::DrawReason::ThreefoldRepetition => DrawReason::ThreefoldRepetition,
            },
        },
    }
}

pub fn clock_to_proto(clock: &ClockState) -> ClockSnapshot {
    ClockSnapshot {
        white_ms: clock.remaining(PieceColor::White),
        black_ms: clock.remaining(PieceColor::Black),
        active: color_to_proto(clock.active()),
        running: clock.is_running(),
        initial_ms: clock.initial_ms(),
        increment_ms: clock.increment_ms(),
    }
}

/// Parse wire coordinates into a move request. Legality is checked later.
pub fn parse_move_request(
    from: &str,
    to: &str,
    promotion: Option<&str>,
) -> Result<MoveRequest, GameError> {
    let from_sq = parse_square(from)
        .ok_or_else(|| GameError::InvalidMove(format!("Invalid square: {}", from)))?;
    let to_sq =
        parse_square(to).ok_or_else(|| GameError::InvalidMove(format!("Invalid square: {}", to)))?;

    let request = MoveRequest::new(from_sq, to_sq);
    match promotion {
        None => Ok(request),
        Some(p) => {
            let mut chars = p.chars();
            let piece = match (chars.next(), chars.next()) {
                (Some(c), None) => PieceKind::from_char(c),
                _ => None,
            }
            .filter(|k| PieceKind::PROMOTIONS.contains(k))
            .ok_or_else(|| GameError::InvalidMove(format!("Invalid promotion piece: {}", p)))?;
            Ok(request.with_promotion(piece))
        }
    }
}
