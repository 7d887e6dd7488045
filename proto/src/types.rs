use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opposite(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorPreference {
    White,
    Black,
    #[default]
    Random,
}

impl ColorPreference {
    pub fn as_color(self) -> Option<Color> {
        match self {
            Self::White => Some(Color::White),
            Self::Black => Some(Color::Black),
            Self::Random => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeControl {
    pub initial_ms: u64,
    #[serde(default)]
    pub increment_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Player,
    Spectator,
}

/// The caller's identity in one game. `player_id` is a bearer token and is
/// only ever sent to the participant it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub player_id: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

impl Participant {
    pub fn is_player(&self) -> bool {
        self.role == Role::Player
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<String>,
    pub san: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DrawReason {
    FiftyMoveRule,
    InsufficientMaterial,
    ThreefoldRepetition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RemoteStatus {
    Playing { in_check: bool },
    Checkmate { winner: Color },
    Stalemate,
    Draw { reason: DrawReason },
    Timeout { winner: Color },
}

impl RemoteStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Playing { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockSnapshot {
    pub white_ms: u64,
    pub black_ms: u64,
    pub active: Color,
    pub running: bool,
    pub initial_ms: u64,
    pub increment_ms: u64,
}

/// Public view of a seat. Never carries the player id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub connected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Players {
    pub white: Option<SeatInfo>,
    pub black: Option<SeatInfo>,
}

/// Full authoritative snapshot of one game, always sent whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteGameState {
    pub game_id: String,
    pub fen: String,
    pub side_to_move: Color,
    pub history: Vec<MoveRecord>,
    pub status: RemoteStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock: Option<ClockSnapshot>,
    pub players: Players,
    pub spectators: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_wire_shape() {
        let status = RemoteStatus::Draw {
            reason: DrawReason::ThreefoldRepetition,
        };
        assert_eq!(
            serde_json::to_value(status).unwrap(),
            json!({"kind": "draw", "reason": "threefold-repetition"})
        );
        let timeout: RemoteStatus =
            serde_json::from_value(json!({"kind": "timeout", "winner": "black"})).unwrap();
        assert_eq!(
            timeout,
            RemoteStatus::Timeout {
                winner: Color::Black
            }
        );
        assert!(timeout.is_terminal());
    }

    #[test]
    fn test_spectator_has_no_color_field() {
        let spectator = Participant {
            player_id: "p1".into(),
            role: Role::Spectator,
            color: None,
        };
        assert_eq!(
            serde_json::to_value(&spectator).unwrap(),
            json!({"player_id": "p1", "role": "spectator"})
        );
    }

    #[test]
    fn test_time_control_increment_defaults_to_zero() {
        let tc: TimeControl = serde_json::from_value(json!({"initial_ms": 300000})).unwrap();
        assert_eq!(tc.increment_ms, 0);
    }

    #[test]
    fn test_color_preference() {
        assert_eq!(ColorPreference::default(), ColorPreference::Random);
        assert_eq!(ColorPreference::Black.as_color(), Some(Color::Black));
        assert_eq!(ColorPreference::Random.as_color(), None);
        assert_eq!(Color::White.opposite(), Color::Black);
    }
}
