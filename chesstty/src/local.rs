//! Local play: two humans at one terminal, or a human against the advisor.
//!
//! User input, advisor results and the clock tick are all serialised through
//! one `select!` loop, so the game is only ever touched from one place.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Instant;

use chess::pgn::parse_san;
use chess::{
    ClockState, Game, GameError, GameStatus, MoveRequest, PieceColor, PieceKind, TICK_INTERVAL,
};
use engine::{Advisor, AdvisorEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time;

use crate::render;
use crate::session_file;

const HELP: &str = "\
Commands:
  e2e4, e7e8q, Nf3    play a move (coordinates or SAN)
  moves [square]      list legal moves
  undo / redo         step back or forward
  reset               start over from the initial position
  load <fen>          set up a position
  fen / pgn           show the position or the move list
  board / clock       show the board or the clocks
  hint                ask the advisor for a move
  save / resume       store or restore this game
  discard             delete the saved game
  quit";

#[derive(Debug, Clone)]
pub struct LocalOptions {
    pub fen: Option<String>,
    pub computer: Option<PieceColor>,
    pub depth: u32,
    pub minutes: Option<u64>,
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchPurpose {
    ComputerMove,
    Hint,
}

pub struct LocalSession {
    game: Game,
    timed: bool,
    computer: Option<PieceColor>,
    depth: u32,
    data_dir: PathBuf,
    advisor: Advisor,
    next_request_id: u64,
    search: Option<(u64, SearchPurpose)>,
    pending_promotion: Option<MoveRequest>,
    /// Side whose flag fell. The game is over once set.
    last_tick: Instant,
    out: String,
}

impl LocalSession {
    pub fn new(options: LocalOptions) -> Result<Self, GameError> {
        let mut game = match &options.fen {
            Some(fen) => Game::from_fen(fen)?,
            None => Game::new(),
        };
        if let Some(minutes) = options.minutes {
            let mut clock = ClockState::new(minutes.saturating_mul(60_000));
            clock.switch_to(game.position().side_to_move());
            *game.clock_mut() = clock;
        }

        Ok(Self {
            game,
            timed: options.minutes.is_some(),
            computer: options.computer,
            depth: options.depth,
            data_dir: options.data_dir,
            advisor: Advisor::spawn(),
            next_request_id: 1,
            search: None,
            pending_promotion: None,
            last_tick: Instant::now(),
            out: String::new(),
        })
    }

    #[cfg(test)]
    pub fn game(&self) -> &Game {
        &self.game
    }

    /// Text produced since the last call.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.out)
    }

    /// Show the opening position and let the computer move if it has White.
    pub async fn start(&mut self) {
        self.show_position();
        self.maybe_request_computer_move().await;
    }

    pub async fn handle_line(&mut self, line: &str) -> Flow {
        let line = line.trim();
        if line.is_empty() {
            return Flow::Continue;
        }

        if let Some(request) = self.pending_promotion.take() {
            self.complete_promotion(request, line).await;
            return Flow::Continue;
        }

        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((command, arg)) => (command, arg.trim()),
            None => (line, ""),
        };
        match command {
            "quit" | "exit" => return Flow::Quit,
            "help" | "?" => self.say(HELP),
            "moves" => self.list_moves(arg),
            "undo" => self.undo().await,
            "redo" => self.redo().await,
            "reset" => {
                self.cancel_search().await;
                self.game.reset();
                self.show_position();
                self.maybe_request_computer_move().await;
            }
            "load" => self.load(arg).await,
            "fen" => {
                let fen = self.game.to_fen();
                self.say(&fen);
            }
            "pgn" => {
                let moves = self.game.move_list();
                self.say(if moves.is_empty() { "(no moves)" } else { &moves });
            }
            "board" => self.show_position(),
            "clock" => {
                if self.timed {
                    let line = render::clock_line(self.game.clock());
                    self.say(&line);
                } else {
                    self.say("This game is untimed.");
                }
            }
            "hint" => self.request_search(SearchPurpose::Hint).await,
            "save" => self.save(),
            "resume" => self.resume().await,
            "discard" => match session_file::clear_saved_session_in(&self.data_dir) {
                Ok(()) => self.say("Saved game discarded."),
                Err(e) => self.say(&format!("Discard failed: {}", e)),
            },
            _ => self.try_move(line).await,
        }
        Flow::Continue
    }

    /// Next advisor event, `None` once the advisor task has exited.
    pub async fn next_advisor_event(&mut self) -> Option<AdvisorEvent> {
        self.advisor.recv_event().await
    }

    pub async fn handle_advisor_event(&mut self, event: AdvisorEvent) {
        match event {
            AdvisorEvent::BestMove { request_id, mv } => {
                let Some((expected, purpose)) = self.search else {
                    return;
                };
                if expected != request_id {
                    tracing::debug!(request_id, "Ignoring stale advisor result");
                    return;
                }
                self.search = None;

                let Some(mv) = mv else {
                    self.say("The advisor found no legal move.");
                    return;
                };
                match purpose {
                    SearchPurpose::Hint => self.say(&format!("Hint: {}", mv.san())),
                    SearchPurpose::ComputerMove => {
                        if self.computer != Some(self.game.position().side_to_move()) {
                            return;
                        }
                        match self.game.make_move(mv.request()) {
                            Ok(played) => {
                                self.say(&format!("Computer plays {}", played.san()));
                                self.show_position();
                            }
                            Err(e) => {
                                tracing::error!("Advisor move rejected: {}", e);
                                self.say(&format!("Computer move failed: {}", e));
                            }
                        }
                    }
                }
            }
            AdvisorEvent::Error(message) => {
                self.search = None;
                self.say(&format!("Advisor error: {}", message));
            }
        }
    }

    /// Charge the time since the last tick to the side to move.
    ///
    /// An empty clock stays at 0:00; a local game is never lost on time.
    pub fn tick(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_tick);
        self.last_tick = now;
        if !self.timed {
            return;
        }

        let active = self.game.clock().active();
        let had_time = !self.game.clock().is_flag_fallen(active);
        self.game.tick(elapsed);
        if had_time && self.game.clock().is_running() && self.game.clock().is_flag_fallen(active) {
            tracing::debug!(side = %active, "Clock reached zero");
            self.say(&format!("{}'s clock shows 0:00.", capitalize(active.as_str())));
        }
    }

    pub async fn shutdown(self) {
        self.advisor.shutdown().await;
    }

    async fn try_move(&mut self, text: &str) {
        if self.game_over_message() {
            return;
        }
        if self.computer == Some(self.game.position().side_to_move()) {
            self.say("Waiting for the computer to move.");
            return;
        }

        let request = match text.parse::<MoveRequest>() {
            Ok(request) => request,
            Err(_) => match parse_san(self.game.position(), text) {
                Ok(request) => request,
                Err(e) => {
                    self.say(&format!("Unknown command or move: {} ({})", text, e));
                    return;
                }
            },
        };
        self.play(request).await;
    }

    async fn play(&mut self, request: MoveRequest) {
        match self.game.make_move(request) {
            Ok(mv) => {
                tracing::debug!(mv = %mv, "Move played");
                self.show_position();
                self.maybe_request_computer_move().await;
            }
            Err(GameError::PromotionRequired(request)) => {
                self.pending_promotion = Some(request);
                self.say("Promote to (q/r/b/n)?");
            }
            Err(e) => self.say(&e.to_string()),
        }
    }

    async fn complete_promotion(&mut self, request: MoveRequest, answer: &str) {
        let piece = answer
            .chars()
            .next()
            .and_then(PieceKind::from_char)
            .filter(|k| PieceKind::PROMOTIONS.contains(k));
        match piece {
            Some(piece) if answer.len() == 1 => self.play(request.with_promotion(piece)).await,
            _ => self.say("Promotion cancelled."),
        }
    }

    fn list_moves(&mut self, square: &str) {
        let moves = if square.is_empty() {
            self.game.legal_moves()
        } else {
            match chess_common::parse_square(square) {
                Some(sq) => self.game.legal_moves_from(sq),
                None => {
                    self.say(&format!("Not a square: {}", square));
                    return;
                }
            }
        };
        if moves.is_empty() {
            self.say("No legal moves.");
            return;
        }
        let sans: Vec<&str> = moves.iter().map(|m| m.san()).collect();
        let line = sans.join(" ");
        self.say(&line);
    }

    async fn undo(&mut self) {
        self.cancel_search().await;
        if !self.game.undo() {
            self.say("Nothing to undo.");
            return;
        }
        // Against the computer, step back to the human's turn.
        if self.computer == Some(self.game.position().side_to_move()) {
            self.game.undo();
        }
        self.show_position();
        self.maybe_request_computer_move().await;
    }

    async fn redo(&mut self) {
        self.cancel_search().await;
        if !self.game.redo() {
            self.say("Nothing to redo.");
            return;
        }
        if self.computer == Some(self.game.position().side_to_move()) {
            self.game.redo();
        }
        self.show_position();
        self.maybe_request_computer_move().await;
    }

    async fn load(&mut self, fen: &str) {
        if fen.is_empty() {
            self.say("Usage: load <fen>");
            return;
        }
        match self.game.load_fen(fen) {
            Ok(()) => {
                self.cancel_search().await;
                self.show_position();
                self.maybe_request_computer_move().await;
            }
            Err(e) => self.say(&e.to_string()),
        }
    }

    fn save(&mut self) {
        let session =
            session_file::build_saved_session(&self.game, self.timed, self.computer, self.depth);
        match session_file::save_session_to(&session, &self.data_dir) {
            Ok(path) => self.say(&format!("Saved to {}", path.display())),
            Err(e) => self.say(&format!("Save failed: {}", e)),
        }
    }

    async fn resume(&mut self) {
        let session = match session_file::load_session_from(&self.data_dir) {
            Ok(Some(session)) => session,
            Ok(None) => {
                self.say("No saved game.");
                return;
            }
            Err(e) => {
                self.say(&format!("Could not read saved game: {}", e));
                return;
            }
        };
        match session_file::restore_game(&session) {
            Ok(game) => {
                self.cancel_search().await;
                self.game = game;
                self.timed = session.initial_ms.is_some();
                self.computer = session.computer.as_deref().and_then(PieceColor::from_str_loose);
                self.depth = session.depth;
                self.last_tick = Instant::now();
                self.say("Resumed saved game.");
                self.show_position();
                self.maybe_request_computer_move().await;
            }
            Err(e) => self.say(&format!("Could not restore saved game: {}", e)),
        }
    }

    async fn maybe_request_computer_move(&mut self) {
        if self.is_over() || self.computer != Some(self.game.position().side_to_move()) {
            return;
        }
        self.request_search(SearchPurpose::ComputerMove).await;
    }

    async fn request_search(&mut self, purpose: SearchPurpose) {
        if purpose == SearchPurpose::Hint && self.game_over_message() {
            return;
        }
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        match self
            .advisor
            .go(request_id, self.game.position().clone(), self.depth)
            .await
        {
            Ok(()) => {
                self.search = Some((request_id, purpose));
                if purpose == SearchPurpose::ComputerMove {
                    self.say("Computer is thinking...");
                }
            }
            Err(e) => self.say(&format!("Advisor unavailable: {}", e)),
        }
    }

    async fn cancel_search(&mut self) {
        if self.search.take().is_some() {
            let _ = self.advisor.stop().await;
        }
    }

    fn is_over(&self) -> bool {
        self.game.status().is_terminal()
    }

    /// Say why no move can be made, if the game is over.
    fn game_over_message(&mut self) -> bool {
        let status = self.game.status();
        if status.is_terminal() {
            self.say(&format!("Game over: {}.", status));
            return true;
        }
        false
    }

    fn show_position(&mut self) {
        let perspective = match self.computer {
            Some(PieceColor::White) => PieceColor::Black,
            _ => PieceColor::White,
        };
        let board = render::board(self.game.position(), perspective);
        self.say(&board);
        if self.timed {
            let clock = render::clock_line(self.game.clock());
            self.say(&clock);
        }
        if let Some(mv) = self.game.last_move() {
            let line = format!("Last move: {}", mv.san());
            self.say(&line);
        }
        let status = self.game.status();
        let side = self.game.position().side_to_move();
        let line = match status {
            GameStatus::Playing { in_check } => format!(
                "{} to move{}",
                capitalize(side.as_str()),
                if in_check { ", check" } else { "" }
            ),
            other => format!("Game over: {}", other),
        };
        self.say(&line);
    }

    fn say(&mut self, text: &str) {
        let _ = writeln!(self.out, "{}", text);
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Run the local REPL on stdin/stdout until `quit` or end of input.
pub async fn run(options: LocalOptions) -> anyhow::Result<()> {
    let mut session = LocalSession::new(options)?;
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut clock_interval = time::interval(TICK_INTERVAL);
    clock_interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

    println!("ChessTTY local game. Type 'help' for commands.");
    session.start().await;
    flush_output(&mut session);

    loop {
        tokio::select! {
            biased;

            line = stdin.next_line() => {
                let Some(line) = line? else { break };
                let flow = session.handle_line(&line).await;
                flush_output(&mut session);
                if flow == Flow::Quit {
                    break;
                }
            }

            Some(event) = session.next_advisor_event() => {
                session.handle_advisor_event(event).await;
                flush_output(&mut session);
            }

            _ = clock_interval.tick() => {
                session.tick();
                flush_output(&mut session);
            }
        }
    }

    session.shutdown().await;
    Ok(())
}

fn flush_output(session: &mut LocalSession) {
    let out = session.take_output();
    if !out.is_empty() {
        print!("{}", out);
        use std::io::Write;
        let _ = std::io::stdout().flush();
    }
}
