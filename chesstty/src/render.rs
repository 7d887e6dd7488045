//! Plain-text output for the REPLs.

use chess::{ClockState, File, PieceColor, Position, Rank, Square};
use chess_client::{Color, RemoteGameState, RemoteStatus};

/// Eight ranks of piece letters, White's pieces uppercase, from `perspective`.
pub fn board(position: &Position, perspective: PieceColor) -> String {
    let mut ranks: Vec<Rank> = Rank::ALL.to_vec();
    let mut files: Vec<File> = File::ALL.to_vec();
    match perspective {
        PieceColor::White => ranks.reverse(),
        PieceColor::Black => files.reverse(),
    }

    let mut out = String::new();
    for &rank in &ranks {
        out.push(chess_common::rank_to_char(rank));
        out.push(' ');
        for &file in &files {
            let c = match position.piece_at(Square::new(file, rank)) {
                Some((kind, PieceColor::White)) => kind.to_char_upper(),
                Some((kind, PieceColor::Black)) => kind.to_char_lower(),
                None => '.',
            };
            out.push(' ');
            out.push(c);
        }
        out.push('\n');
    }
    out.push_str("  ");
    for &file in &files {
        out.push(' ');
        out.push(chess_common::file_to_char(file));
    }
    out
}

/// Both clocks, the running one marked with `*`.
pub fn clock_line(clock: &ClockState) -> String {
    let mark = |side: PieceColor| {
        if clock.is_running() && clock.active() == side {
            "*"
        } else {
            ""
        }
    };
    format!(
        "White {}{}  Black {}{}",
        ClockState::format_time(clock.remaining(PieceColor::White)),
        mark(PieceColor::White),
        ClockState::format_time(clock.remaining(PieceColor::Black)),
        mark(PieceColor::Black),
    )
}

pub fn remote_status(status: &RemoteStatus) -> String {
    match status {
        RemoteStatus::Playing { in_check: false } => "playing".to_string(),
        RemoteStatus::Playing { in_check: true } => "check".to_string(),
        RemoteStatus::Checkmate { winner } => format!("checkmate, {} wins", color_name(*winner)),
        RemoteStatus::Stalemate => "stalemate".to_string(),
        RemoteStatus::Draw { reason } => format!("draw ({:?})", reason),
        RemoteStatus::Timeout { winner } => format!("{} wins on time", color_name(*winner)),
    }
}

/// Board, players, clocks and status of a mirrored game.
pub fn remote_game(state: &RemoteGameState, perspective: Color) -> String {
    let mut out = String::new();
    match Position::from_fen(&state.fen) {
        Ok(position) => {
            let perspective = match perspective {
                Color::White => PieceColor::White,
                Color::Black => PieceColor::Black,
            };
            out.push_str(&board(&position, perspective));
        }
        Err(e) => out.push_str(&format!("(unreadable position: {})", e)),
    }
    out.push('\n');

    let seat = |color: Color| {
        let seat = match color {
            Color::White => &state.players.white,
            Color::Black => &state.players.black,
        };
        match seat {
            Some(s) => format!(
                "{}{}",
                s.name.as_deref().unwrap_or("anonymous"),
                if s.connected { "" } else { " (away)" }
            ),
            None => "(open)".to_string(),
        }
    };
    out.push_str(&format!(
        "White: {}  Black: {}  Spectators: {}\n",
        seat(Color::White),
        seat(Color::Black),
        state.spectators
    ));

    if let Some(clock) = &state.clock {
        out.push_str(&format!(
            "Clock: White {}  Black {}\n",
            ClockState::format_time(clock.white_ms),
            ClockState::format_time(clock.black_ms)
        ));
    }
    if let Some(last) = state.history.last() {
        out.push_str(&format!("Last move: {}\n", last.san));
    }
    out.push_str(&format!(
        "{} to move, {}",
        color_name(state.side_to_move),
        remote_status(&state.status)
    ));
    out
}

fn color_name(color: Color) -> &'static str {
    match color {
        Color::White => "White",
        Color::Black => "Black",
    }
}
