use std::path::{Path, PathBuf};

use chess::{ClockState, Game, GameError, PieceColor, Position};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum SessionFileError {
    #[error("Session file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Session file is malformed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Saved game cannot be restored: {0}")]
    Game(#[from] GameError),
}

/// Represents a saved local game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedSession {
    /// Position the game started from.
    pub start_fen: String,
    /// Turn-numbered SAN transcript from `start_fen`.
    pub moves: String,
    /// Live position when saved; informational.
    pub fen: String,
    /// Per-side allotment; `None` for an untimed game.
    pub initial_ms: Option<u64>,
    pub computer: Option<String>,
    pub depth: u32,
    pub timestamp: String,
}

fn session_file_path_in(dir: &Path) -> PathBuf {
    dir.join("saved_session.json")
}

/// Save a session under `dir`, creating it if needed.
pub fn save_session_to(session: &SavedSession, dir: &Path) -> Result<PathBuf, SessionFileError> {
    std::fs::create_dir_all(dir)?;

    let path = session_file_path_in(dir);
    let json = serde_json::to_string_pretty(session)?;
    std::fs::write(&path, json)?;

    Ok(path)
}

/// Load a saved session from `dir`, if one exists.
pub fn load_session_from(dir: &Path) -> Result<Option<SavedSession>, SessionFileError> {
    let path = session_file_path_in(dir);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    Ok(Some(serde_json::from_str(&contents)?))
}

/// Delete the saved session file.
pub fn clear_saved_session_in(dir: &Path) -> Result<(), SessionFileError> {
    let path = session_file_path_in(dir);
    if path.exists() {
        std::fs::remove_file(&path)?;
    }
    Ok(())
}

/// Build a SavedSession from a live game.
pub fn build_saved_session(
    game: &Game,
    timed: bool,
    computer: Option<PieceColor>,
    depth: u32,
) -> SavedSession {
    let timestamp = {
        use std::time::SystemTime;
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default();
        format!("{}", now.as_secs())
    };

    SavedSession {
        start_fen: game.start_position().to_fen(),
        moves: game.move_list(),
        fen: game.to_fen(),
        initial_ms: timed.then(|| game.clock().initial_ms()),
        computer: computer.map(|c| c.to_string()),
        depth,
        timestamp,
    }
}

/// Rebuild the game a session was saved from. Clocks restart from the full
/// allotment; an unfinished game with moves resumes with the clock running.
pub fn restore_game(session: &SavedSession) -> Result<Game, SessionFileError> {
    let start = Position::from_fen(&session.start_fen).map_err(GameError::from)?;
    let mut game = Game::from_move_list(start, &session.moves)?;

    if let Some(initial_ms) = session.initial_ms {
        let mut clock = ClockState::new(initial_ms);
        clock.switch_to(game.position().side_to_move());
        if !game.history().is_empty() && !game.status().is_terminal() {
            clock.start();
        }
        *game.clock_mut() = clock;
    }
    Ok(game)
}
