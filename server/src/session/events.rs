use chess_proto::RemoteGameState;

/// Events broadcast from the game actor to all subscribed connections.
#[derive(Debug, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum GameEvent {
    /// Full state after any change.
    StateChanged(RemoteGameState),
    /// Both seats were filled for the first time.
    MatchFound(RemoteGameState),
}

impl GameEvent {
    pub fn state(&self) -> &RemoteGameState {
        match self {
            Self::StateChanged(state) | Self::MatchFound(state) => state,
        }
    }
}
