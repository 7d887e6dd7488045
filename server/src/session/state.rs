use std::collections::HashMap;
use std::time::Instant;

use chess::{ClockState, Game, GameError as SessionError, GameStatus, Position};
use chess_proto::{
    Color, ColorPreference, CreateGame, Participant, Players, RemoteGameState, Role, SeatInfo,
};
use rand::Rng;
use uuid::Uuid;

use super::commands::{GameError, JoinRequest, MoveCommand};
use crate::service::converters;

#[derive(Debug, Clone)]
pub(crate) struct Seat {
    pub player_id: String,
    pub name: Option<String>,
    pub connected: bool,
}

/// Internal mutable state, owned entirely by the game actor. No locks.
pub(crate) struct GameState {
    pub game_id: String,
    pub game: Game,
    /// Whether the game was created with a time control.
    pub timed: bool,
    pub white: Option<Seat>,
    pub black: Option<Seat>,
    /// Spectator ids mapped to their display names.
    pub spectators: HashMap<String, Option<String>>,
    /// Set once a flag falls; the winner is the other side.
    pub timeout_winner: Option<Color>,
    /// Whether both seats have ever been filled.
    pub matched: bool,
    pub last_tick: Instant,
}

impl GameState {
    /// Build a game from a create request and seat the creator.
    pub fn create(game_id: String, request: &CreateGame) -> Result<(Self, Participant), GameError> {
        let position = match &request.initial_position {
            Some(fen) => Position::from_fen(fen).map_err(|e| GameError::InvalidFen(e.to_string()))?,
            None => Position::initial(),
        };

        let (clock, timed) = match request.time_control {
            Some(tc) if tc.initial_ms == 0 => {
                return Err(GameError::InvalidTimeControl(
                    "initial time must be positive".into(),
                ))
            }
            Some(tc) => (ClockState::with_increment(tc.initial_ms, tc.increment_ms), true),
            None => (ClockState::default(), false),
        };

        let mut state = Self {
            game_id,
            game: Game::with_clock(position, clock),
            timed,
            white: None,
            black: None,
            spectators: HashMap::new(),
            timeout_winner: None,
            matched: false,
            last_tick: Instant::now(),
        };

        let color = match request.creator_color.unwrap_or_default() {
            ColorPreference::White => Color::White,
            ColorPreference::Black => Color::Black,
            ColorPreference::Random => random_color(),
        };
        let participant = state.take_seat(color, request.creator_name.clone());
        Ok((state, participant))
    }

    /// Seat a joiner. A known id reclaims its seat; anyone else gets the
    /// requested colour if free, then any free seat, then a spectator slot.
    pub fn join(&mut self, request: JoinRequest) -> Participant {
        if let Some(player_id) = &request.player_id {
            if let Some(color) = self.seat_color_of(player_id) {
                if let Some(seat) = self.seat_mut(color) {
                    seat.connected = true;
                    if request.name.is_some() {
                        seat.name = request.name;
                    }
                }
                tracing::info!(color = color_str(color), "Player reclaimed seat");
                return Participant {
                    player_id: player_id.clone(),
                    role: Role::Player,
                    color: Some(color),
                };
            }
            if self.spectators.contains_key(player_id) {
                return Participant {
                    player_id: player_id.clone(),
                    role: Role::Spectator,
                    color: None,
                };
            }
            tracing::debug!("Unknown player id, seating as a new participant");
        }

        let free: Vec<Color> = [Color::White, Color::Black]
            .into_iter()
            .filter(|&c| self.seat(c).is_none())
            .collect();
        let requested = request
            .requested_color
            .and_then(ColorPreference::as_color)
            .filter(|c| free.contains(c));
        let color = match (requested, free.as_slice()) {
            (Some(color), _) => Some(color),
            (None, []) => None,
            (None, [only]) => Some(*only),
            (None, _) => Some(random_color()),
        };

        match color {
            Some(color) => self.take_seat(color, request.name),
            None => {
                let player_id = new_player_id();
                self.spectators.insert(player_id.clone(), request.name);
                tracing::info!(spectators = self.spectators.len(), "Spectator joined");
                Participant {
                    player_id,
                    role: Role::Spectator,
                    color: None,
                }
            }
        }
    }

    /// Explicit leave: the seat is kept (so the token can rejoin) but shown as
    /// disconnected. Spectators are removed.
    pub fn leave(&mut self, player_id: &str) -> Result<(), GameError> {
        if let Some(color) = self.seat_color_of(player_id) {
            if let Some(seat) = self.seat_mut(color) {
                seat.connected = false;
            }
            return Ok(());
        }
        if self.spectators.remove(player_id).is_some() {
            return Ok(());
        }
        Err(GameError::NotAParticipant)
    }

    pub fn apply_move(&mut self, command: &MoveCommand) -> Result<(), GameError> {
        let color = match self.seat_color_of(&command.player_id) {
            Some(color) => color,
            None if self.spectators.contains_key(&command.player_id) => {
                return Err(GameError::SpectatorMove)
            }
            None => return Err(GameError::NotAParticipant),
        };
        // The clock must not run against an empty seat.
        if self.timed && (self.white.is_none() || self.black.is_none()) {
            return Err(GameError::WaitingForOpponent);
        }

        // Charge time up to now to the side that was thinking.
        self.tick_clock();
        if self.is_over() {
            return Err(GameError::GameOver);
        }
        if converters::color_to_proto(self.game.position().side_to_move()) != color {
            return Err(GameError::NotYourTurn);
        }

        let request = converters::parse_move_request(
            &command.from,
            &command.to,
            command.promotion.as_deref(),
        )?;
        let mv = self.game.make_move(request).map_err(|e| match e {
            SessionError::PromotionRequired(r) => GameError::PromotionRequired(r.to_string()),
            SessionError::IllegalMove(r) => GameError::IllegalMove(r.to_string()),
            SessionError::GameOver => GameError::GameOver,
            other => GameError::Internal(other.to_string()),
        })?;
        tracing::info!(mv = %mv, status = %self.game.status(), "Move applied");
        Ok(())
    }

    /// Advance the running clock by the time since the last tick. Returns true
    /// if this tick made a flag fall.
    pub fn tick_clock(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_tick);
        self.last_tick = now;

        if !self.timed || self.timeout_winner.is_some() {
            return false;
        }
        self.game.tick(elapsed);

        let active = self.game.clock().active();
        if self.game.clock().is_running() && self.game.clock().is_flag_fallen(active) {
            let loser = converters::color_to_proto(active);
            self.timeout_winner = Some(loser.opposite());
            self.game.clock_mut().pause();
            tracing::info!(loser = color_str(loser), "Flag fell");
            return true;
        }
        false
    }

    pub fn clock_running(&self) -> bool {
        self.timed && self.timeout_winner.is_none() && self.game.clock().is_running()
    }

    pub fn is_over(&self) -> bool {
        self.timeout_winner.is_some() || self.game.status().is_terminal()
    }

    /// Finished and nobody is left to look at it.
    pub fn is_abandoned(&self) -> bool {
        let seated = [&self.white, &self.black]
            .into_iter()
            .flatten()
            .any(|seat| seat.connected);
        self.is_over() && !seated && self.spectators.is_empty()
    }

    pub fn status(&self) -> GameStatus {
        self.game.status()
    }

    /// Both seats taken, and this is the first time.
    pub fn take_match_found(&mut self) -> bool {
        if self.matched || self.white.is_none() || self.black.is_none() {
            return false;
        }
        self.matched = true;
        true
    }

    pub fn snapshot(&self) -> RemoteGameState {
        let seat_info = |seat: &Option<Seat>| {
            seat.as_ref().map(|s| SeatInfo {
                name: s.name.clone(),
                connected: s.connected,
            })
        };

        RemoteGameState {
            game_id: self.game_id.clone(),
            fen: self.game.to_fen(),
            side_to_move: converters::color_to_proto(self.game.position().side_to_move()),
            history: self
                .game
                .history()
                .iter()
                .map(|entry| converters::move_to_record(&entry.mv))
                .collect(),
            status: converters::status_to_proto(self.game.status(), self.timeout_winner),
            clock: self
                .timed
                .then(|| converters::clock_to_proto(self.game.clock())),
            players: Players {
                white: seat_info(&self.white),
                black: seat_info(&self.black),
            },
            spectators: self.spectators.len() as u32,
        }
    }

    fn take_seat(&mut self, color: Color, name: Option<String>) -> Participant {
        let player_id = new_player_id();
        *self.seat_slot(color) = Some(Seat {
            player_id: player_id.clone(),
            name,
            connected: true,
        });
        tracing::info!(color = color_str(color), "Player seated");
        Participant {
            player_id,
            role: Role::Player,
            color: Some(color),
        }
    }

    fn seat(&self, color: Color) -> Option<&Seat> {
        match color {
            Color::White => self.white.as_ref(),
            Color::Black => self.black.as_ref(),
        }
    }

    fn seat_mut(&mut self, color: Color) -> Option<&mut Seat> {
        self.seat_slot(color).as_mut()
    }

    fn seat_slot(&mut self, color: Color) -> &mut Option<Seat> {
        match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }

    fn seat_color_of(&self, player_id: &str) -> Option<Color> {
        [Color::White, Color::Black]
            .into_iter()
            .find(|&c| self.seat(c).is_some_and(|s| s.player_id == player_id))
    }
}

fn new_player_id() -> String {
    Uuid::new_v4().to_string()
}

fn random_color() -> Color {
    if rand::thread_rng().gen_bool(0.5) {
        Color::White
    } else {
        Color::Black
    }
}

fn color_str(color: Color) -> &'static str {
    match color {
        Color::White => "white",
        Color::Black => "black",
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use chess_proto::{RemoteStatus, TimeControl};

    fn create(color: ColorPreference) -> (GameState, Participant) {
        let request = CreateGame {
            creator_name: Some("alice".into()),
            creator_color: Some(color),
            ..Default::default()
        };
        GameState::create("g1".into(), &request).unwrap()
    }

    fn mv(player_id: &str, from: &str, to: &str) -> MoveCommand {
        MoveCommand {
            player_id: player_id.into(),
            from: from.into(),
            to: to.into(),
            promotion: None,
        }
    }

    #[test]
    fn test_creator_gets_preferred_color() {
        let (state, creator) = create(ColorPreference::Black);
        assert_eq!(creator.color, Some(Color::Black));
        assert_eq!(creator.role, Role::Player);
        assert!(state.white.is_none());
        assert_eq!(state.black.as_ref().unwrap().player_id, creator.player_id);
    }

    #[test]
    fn test_random_creator_color_is_a_seat() {
        let (state, creator) = create(ColorPreference::Random);
        let color = creator.color.unwrap();
        assert!(state.seat(color).is_some());
        assert!(state.seat(color.opposite()).is_none());
    }

    #[test]
    fn test_invalid_fen_rejected() {
        let request = CreateGame {
            initial_position: Some("bogus".into()),
            ..Default::default()
        };
        assert!(matches!(
            GameState::create("g1".into(), &request),
            Err(GameError::InvalidFen(_))
        ));
    }

    #[test]
    fn test_join_fills_free_seat_then_spectates() {
        let (mut state, _) = create(ColorPreference::White);
        let second = state.join(JoinRequest {
            requested_color: Some(ColorPreference::White),
            ..Default::default()
        });
        assert_eq!(second.color, Some(Color::Black));
        assert!(state.take_match_found());
        assert!(!state.take_match_found());

        let third = state.join(JoinRequest::default());
        assert_eq!(third.role, Role::Spectator);
        assert_eq!(state.snapshot().spectators, 1);
    }

    #[test]
    fn test_known_token_reclaims_seat() {
        let (mut state, creator) = create(ColorPreference::White);
        state.leave(&creator.player_id).unwrap();
        assert!(!state.white.as_ref().unwrap().connected);

        let back = state.join(JoinRequest {
            player_id: Some(creator.player_id.clone()),
            ..Default::default()
        });
        assert_eq!(back, creator);
        assert!(state.white.as_ref().unwrap().connected);
    }

    #[test]
    fn test_unknown_token_is_fresh_participant() {
        let (mut state, _) = create(ColorPreference::White);
        let p = state.join(JoinRequest {
            player_id: Some("stale".into()),
            ..Default::default()
        });
        assert_ne!(p.player_id, "stale");
        assert_eq!(p.color, Some(Color::Black));
    }

    #[test]
    fn test_move_checks() {
        let (mut state, white) = create(ColorPreference::White);
        let black = state.join(JoinRequest::default());
        let spectator = state.join(JoinRequest::default());

        assert_eq!(
            state.apply_move(&mv("nobody", "e2", "e4")),
            Err(GameError::NotAParticipant)
        );
        assert_eq!(
            state.apply_move(&mv(&spectator.player_id, "e2", "e4")),
            Err(GameError::SpectatorMove)
        );
        assert_eq!(
            state.apply_move(&mv(&black.player_id, "e7", "e5")),
            Err(GameError::NotYourTurn)
        );
        assert!(matches!(
            state.apply_move(&mv(&white.player_id, "e2", "e5")),
            Err(GameError::IllegalMove(_))
        ));
        assert!(matches!(
            state.apply_move(&mv(&white.player_id, "z9", "e4")),
            Err(GameError::InvalidMove(_))
        ));

        state.apply_move(&mv(&white.player_id, "e2", "e4")).unwrap();
        let snap = state.snapshot();
        assert_eq!(snap.side_to_move, Color::Black);
        assert_eq!(snap.history.len(), 1);
        assert_eq!(snap.history[0].san, "e4");
    }

    #[test]
    fn test_promotion_required_reported() {
        let request = CreateGame {
            creator_color: Some(ColorPreference::White),
            initial_position: Some("7k/P7/8/8/8/8/8/K7 w - - 0 1".into()),
            ..Default::default()
        };
        let (mut state, white) = GameState::create("g1".into(), &request).unwrap();
        state.join(JoinRequest::default());

        assert_eq!(
            state.apply_move(&mv(&white.player_id, "a7", "a8")),
            Err(GameError::PromotionRequired("a7a8".into()))
        );
        let mut promote = mv(&white.player_id, "a7", "a8");
        promote.promotion = Some("q".into());
        state.apply_move(&promote).unwrap();
        assert_eq!(state.snapshot().history[0].promotion.as_deref(), Some("q"));
    }

    #[test]
    fn test_flag_fall_is_timeout() {
        let request = CreateGame {
            creator_color: Some(ColorPreference::White),
            time_control: Some(TimeControl {
                initial_ms: 50,
                increment_ms: 0,
            }),
            ..Default::default()
        };
        let (mut state, white) = GameState::create("g1".into(), &request).unwrap();
        let black = state.join(JoinRequest::default());
        assert!(!state.clock_running());

        state.apply_move(&mv(&white.player_id, "e2", "e4")).unwrap();
        assert!(state.clock_running());

        std::thread::sleep(Duration::from_millis(80));
        assert!(state.tick_clock());
        assert_eq!(
            state.snapshot().status,
            RemoteStatus::Timeout {
                winner: Color::White
            }
        );
        assert!(!state.clock_running());
        assert_eq!(
            state.apply_move(&mv(&black.player_id, "e7", "e5")),
            Err(GameError::GameOver)
        );
    }

    #[test]
    fn test_timed_game_waits_for_opponent() {
        let request = CreateGame {
            creator_color: Some(ColorPreference::White),
            time_control: Some(TimeControl {
                initial_ms: 60_000,
                increment_ms: 0,
            }),
            ..Default::default()
        };
        let (mut state, white) = GameState::create("g1".into(), &request).unwrap();
        assert_eq!(
            state.apply_move(&mv(&white.player_id, "e2", "e4")),
            Err(GameError::WaitingForOpponent)
        );
        assert!(!state.clock_running());
        assert!(state.snapshot().history.is_empty());

        state.join(JoinRequest::default());
        state.apply_move(&mv(&white.player_id, "e2", "e4")).unwrap();
        assert!(state.clock_running());
    }

    #[test]
    fn test_abandoned_only_when_over_and_empty() {
        let (mut state, white) = create(ColorPreference::White);
        let black = state.join(JoinRequest::default());
        for (player, from, to) in [
            (&white, "f2", "f3"),
            (&black, "e7", "e5"),
            (&white, "g2", "g4"),
            (&black, "d8", "h4"),
        ] {
            state.apply_move(&mv(&player.player_id, from, to)).unwrap();
        }
        assert!(state.is_over());
        assert!(!state.is_abandoned());

        state.leave(&white.player_id).unwrap();
        assert!(!state.is_abandoned());
        state.leave(&black.player_id).unwrap();
        assert!(state.is_abandoned());
    }

    #[test]
    fn test_empty_unfinished_game_is_kept() {
        let (mut state, white) = create(ColorPreference::White);
        state.leave(&white.player_id).unwrap();
        assert!(!state.is_abandoned());
    }

    #[test]
    fn test_untimed_game_has_no_clock() {
        let (state, _) = create(ColorPreference::White);
        assert!(state.snapshot().clock.is_none());
        assert!(!state.clock_running());
    }
}
