use std::time::Duration;

use cozy_chess::Square;

use crate::clock::ClockState;
use crate::fen::FenError;
use crate::pgn::{self, SanError};
use crate::position::Position;
use crate::rules::{self, Move, MoveError, MoveRequest};
use crate::status::{derive_status, GameStatus};

/// A single-owner game session: live position, history, redo stack and clock.
///
/// All mutation goes through `&mut self`, so the owner serializes clock ticks
/// and user transitions simply by calling them from one task.
#[derive(Debug, Clone)]
pub struct Game {
    start: Position,
    position: Position,
    history: Vec<HistoryEntry>,
    redo_stack: Vec<MoveRequest>,
    /// Keys of every position since the repetition count started, current included.
    keys: Vec<u64>,
    status: GameStatus,
    phase: GamePhase,
    clock: ClockState,
}

/// One applied move and the position it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub mv: Move,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GamePhase {
    /// No moves played yet.
    Idle,
    InProgress,
    Finished { status: GameStatus },
}

impl Game {
    /// Create a new game from the standard starting position
    pub fn new() -> Self {
        Self::with_clock(Position::initial(), ClockState::default())
    }

    /// Create a game from a FEN string
    pub fn from_fen(fen: &str) -> Result<Self, GameError> {
        let position = Position::from_fen(fen)?;
        Ok(Self::with_clock(position, ClockState::default()))
    }

    pub fn with_clock(start: Position, clock: ClockState) -> Self {
        let mut game = Self {
            keys: vec![start.key()],
            position: start.clone(),
            start,
            history: Vec::new(),
            redo_stack: Vec::new(),
            status: GameStatus::Playing { in_check: false },
            phase: GamePhase::Idle,
            clock,
        };
        game.clock.switch_to(game.position.side_to_move());
        game.refresh_status();
        game
    }

    /// Rebuild a game from a turn-numbered SAN transcript.
    pub fn from_move_list(start: Position, transcript: &str) -> Result<Self, GameError> {
        let mut game = Self::with_clock(start, ClockState::default());
        for token in pgn::tokenize_move_list(transcript) {
            let request = pgn::parse_san(&game.position, &token)?;
            game.make_move(request)?;
        }
        Ok(game)
    }

    /// Get the current board position
    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn start_position(&self) -> &Position {
        &self.start
    }

    /// Get the move history
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Requests undone and available for redo, most recent last.
    pub fn redo_stack(&self) -> &[MoveRequest] {
        &self.redo_stack
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn phase(&self) -> &GamePhase {
        &self.phase
    }

    pub fn clock(&self) -> &ClockState {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut ClockState {
        &mut self.clock
    }

    pub fn last_move(&self) -> Option<&Move> {
        self.history.last().map(|e| &e.mv)
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        rules::legal_moves(&self.position)
    }

    pub fn legal_moves_from(&self, square: Square) -> Vec<Move> {
        rules::legal_moves_from(&self.position, square)
    }

    /// Export position to FEN string
    pub fn to_fen(&self) -> String {
        self.position.to_fen()
    }

    /// The move history as a turn-numbered transcript, with the result token
    /// appended once the game is finished.
    pub fn move_list(&self) -> String {
        let moves: Vec<Move> = self.history.iter().map(|e| e.mv.clone()).collect();
        pgn::format_move_list(&self.start, &moves, self.status.result_token())
    }

    /// Make a move on the board. Clears the redo stack on success.
    ///
    /// `PromotionRequired` and illegal moves leave the game untouched.
    pub fn make_move(&mut self, request: MoveRequest) -> Result<Move, GameError> {
        let mv = self.play(request)?;
        self.redo_stack.clear();
        Ok(mv)
    }

    /// Undo the last move. Returns false if there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(entry) = self.history.pop() else {
            return false;
        };
        let was_finished = matches!(self.phase, GamePhase::Finished { .. });

        self.redo_stack.push(entry.mv.request());
        self.keys.pop();
        self.position = self
            .history
            .last()
            .map(|e| e.position.clone())
            .unwrap_or_else(|| self.start.clone());
        self.clock.switch_to(self.position.side_to_move());
        self.refresh_status();

        // The finishing move paused the clock; reopening the game resumes it.
        if was_finished && self.phase == GamePhase::InProgress {
            self.clock.start();
        }

        tracing::debug!(undone = %entry.mv, "Undid move");
        true
    }

    /// Replay the most recently undone move. Returns false if the redo stack
    /// was empty.
    pub fn redo(&mut self) -> bool {
        let Some(request) = self.redo_stack.pop() else {
            return false;
        };

        match self.play(request) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(%request, error = %e, "Redo failed, keeping redo stack");
                self.redo_stack.push(request);
                false
            }
        }
    }

    /// Back to the standard starting position with fresh clocks.
    pub fn reset(&mut self) {
        self.start = Position::initial();
        self.position = self.start.clone();
        self.history.clear();
        self.redo_stack.clear();
        self.keys = vec![self.position.key()];
        self.clock.reset();
        self.refresh_status();
    }

    /// Replace the position wholesale. History and redo are discarded and the
    /// repetition count restarts at the loaded position. The clock is paused.
    ///
    /// On a parse failure the game is left exactly as it was.
    pub fn load_fen(&mut self, fen: &str) -> Result<(), GameError> {
        let position = Position::from_fen(fen)?;

        self.start = position.clone();
        self.position = position;
        self.history.clear();
        self.redo_stack.clear();
        self.keys = vec![self.position.key()];
        self.clock.pause();
        self.clock.switch_to(self.position.side_to_move());
        self.refresh_status();
        Ok(())
    }

    /// Advance the active side's clock. No-op when the clock is stopped or
    /// the game is finished. Never declares a loss on time.
    pub fn tick(&mut self, elapsed: Duration) {
        if matches!(self.phase, GamePhase::Finished { .. }) {
            return;
        }
        self.clock.tick(elapsed);
    }

    /// Recompute the live position from the start position and history.
    pub fn replay(&self) -> Result<Position, GameError> {
        let mut position = self.start.clone();
        for entry in &self.history {
            position = rules::apply_move(&position, entry.mv.request())?.0;
        }
        Ok(position)
    }

    /// Shared success path of `make_move` and `redo`.
    fn play(&mut self, request: MoveRequest) -> Result<Move, GameError> {
        if matches!(self.phase, GamePhase::Finished { .. }) {
            return Err(GameError::GameOver);
        }

        let (next, mv) = rules::apply_move(&self.position, request)?;
        let mover = self.position.side_to_move();

        self.position = next;
        self.keys.push(self.position.key());
        self.history.push(HistoryEntry {
            mv: mv.clone(),
            position: self.position.clone(),
        });

        if self.history.len() == 1 && !self.clock.is_running() {
            self.clock.start();
        }
        self.clock.credit_increment(mover);
        self.clock.switch_to(self.position.side_to_move());

        self.refresh_status();
        if self.status.is_terminal() {
            self.clock.pause();
            tracing::info!(status = %self.status, "Game finished");
        }

        Ok(mv)
    }

    fn refresh_status(&mut self) {
        self.status = derive_status(&self.position, &self.keys);
        self.phase = if self.status.is_terminal() {
            GamePhase::Finished {
                status: self.status,
            }
        } else if self.history.is_empty() {
            GamePhase::Idle
        } else {
            GamePhase::InProgress
        };
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Illegal move: {0}")]
    IllegalMove(MoveRequest),
    #[error("Promotion piece required for {0}")]
    PromotionRequired(MoveRequest),
    #[error("Game is over")]
    GameOver,
    #[error(transparent)]
    InvalidNotation(#[from] FenError),
    #[error("Move list error: {0}")]
    MoveList(#[from] SanError),
}

impl From<MoveError> for GameError {
    fn from(e: MoveError) -> Self {
        match e {
            MoveError::IllegalMove(r) => Self::IllegalMove(r),
            MoveError::PromotionRequired(r) => Self::PromotionRequired(r),
        }
    }
}
