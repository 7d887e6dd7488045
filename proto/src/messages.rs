use serde::{Deserialize, Serialize};

use crate::types::{ColorPreference, Participant, RemoteGameState, TimeControl};

/// Client to server frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRequest {
    pub id: u64,
    pub request: Request,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "kebab-case")]
pub enum Request {
    CreateGame(CreateGame),
    JoinGame(JoinGame),
    LeaveGame(LeaveGame),
    MakeMove(MakeMove),
    FetchGame(FetchGame),
}

impl Request {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateGame(_) => "create-game",
            Self::JoinGame(_) => "join-game",
            Self::LeaveGame(_) => "leave-game",
            Self::MakeMove(_) => "make-move",
            Self::FetchGame(_) => "fetch-game",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_color: Option<ColorPreference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_control: Option<TimeControl>,
    /// FEN to start from instead of the standard position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_position: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinGame {
    pub game_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Token from an earlier join or create, to reclaim the same seat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_color: Option<ColorPreference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveGame {
    pub game_id: String,
    pub player_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MakeMove {
    pub game_id: String,
    pub player_id: String,
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchGame {
    pub game_id: String,
}

/// Server to client frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    Ack(Ack),
    Push(Push),
}

/// Reply to exactly one [`ClientRequest`], matched by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub id: u64,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<Participant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<RemoteGameState>,
}

impl Ack {
    pub fn ok(id: u64) -> Self {
        Self {
            id,
            ok: true,
            message: None,
            game_id: None,
            participant: None,
            state: None,
        }
    }

    pub fn error(id: u64, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: Some(message.into()),
            ..Self::ok(id)
        }
    }

    pub fn with_state(mut self, state: RemoteGameState) -> Self {
        self.game_id = Some(state.game_id.clone());
        self.state = Some(state);
        self
    }

    pub fn with_participant(mut self, participant: Participant) -> Self {
        self.participant = Some(participant);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum Push {
    ConnectionEstablished,
    MatchFound {
        game_id: String,
        participant: Participant,
        state: RemoteGameState,
    },
    GameState {
        state: RemoteGameState,
    },
    GameError {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Color, Players, RemoteStatus, Role};
    use serde_json::json;

    fn sample_state() -> RemoteGameState {
        RemoteGameState {
            game_id: "g1".into(),
            fen: "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1".into(),
            side_to_move: Color::White,
            history: vec![],
            status: RemoteStatus::Playing { in_check: false },
            clock: None,
            players: Players::default(),
            spectators: 0,
        }
    }

    #[test]
    fn test_request_wire_shape() {
        let req = ClientRequest {
            id: 4,
            request: Request::MakeMove(MakeMove {
                game_id: "g1".into(),
                player_id: "p1".into(),
                from: "e7".into(),
                to: "e8".into(),
                promotion: Some("q".into()),
            }),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "id": 4,
                "request": {
                    "kind": "make-move",
                    "payload": {"game_id": "g1", "player_id": "p1", "from": "e7", "to": "e8", "promotion": "q"}
                }
            })
        );
        assert_eq!(req.request.kind(), "make-move");
    }

    #[test]
    fn test_create_game_accepts_empty_payload() {
        let req: ClientRequest =
            serde_json::from_value(json!({"id": 1, "request": {"kind": "create-game", "payload": {}}}))
                .unwrap();
        assert_eq!(req.request, Request::CreateGame(CreateGame::default()));
    }

    #[test]
    fn test_error_ack_shape() {
        let msg = ServerMessage::Ack(Ack::error(7, "Not your turn"));
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "ack", "id": 7, "ok": false, "message": "Not your turn"})
        );
    }

    #[test]
    fn test_ack_with_state_sets_game_id() {
        let ack = Ack::ok(2).with_state(sample_state()).with_participant(Participant {
            player_id: "p1".into(),
            role: Role::Player,
            color: Some(Color::White),
        });
        assert_eq!(ack.game_id.as_deref(), Some("g1"));
        assert!(ack.ok);
    }

    #[test]
    fn test_push_wire_shape() {
        let push = ServerMessage::Push(Push::ConnectionEstablished);
        assert_eq!(
            serde_json::to_value(&push).unwrap(),
            json!({"type": "push", "event": "connection-established"})
        );

        let value = json!({"type": "push", "event": "game-error", "message": "Game not found"});
        let parsed: ServerMessage = serde_json::from_value(value).unwrap();
        assert_eq!(
            parsed,
            ServerMessage::Push(Push::GameError {
                message: "Game not found".into()
            })
        );
    }

    #[test]
    fn test_game_state_push_parses() {
        let value = json!({
            "type": "push",
            "event": "game-state",
            "state": serde_json::to_value(sample_state()).unwrap(),
        });
        let parsed: ServerMessage = serde_json::from_value(value).unwrap();
        assert_eq!(
            parsed,
            ServerMessage::Push(Push::GameState {
                state: sample_state()
            })
        );
    }
}
