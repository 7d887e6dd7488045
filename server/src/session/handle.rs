use chess_proto::RemoteGameState;
use tokio::sync::{broadcast, mpsc, oneshot};

use super::commands::*;
use super::events::GameEvent;

/// Cheap, cloneable handle to a game actor.
#[derive(Clone)]
pub struct GameHandle {
    id: String,
    cmd_tx: mpsc::Sender<GameCommand>,
}

impl GameHandle {
    pub(crate) fn new(id: String, cmd_tx: mpsc::Sender<GameCommand>) -> Self {
        Self { id, cmd_tx }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn join(&self, request: JoinRequest) -> Result<Joined, GameError> {
        let (tx, rx) = oneshot::channel();
        self.send(GameCommand::Join { request, reply: tx }).await?;
        rx.await
            .map_err(|_| GameError::Internal("Reply dropped".into()))?
    }

    pub async fn leave(&self, player_id: String) -> Result<RemoteGameState, GameError> {
        let (tx, rx) = oneshot::channel();
        self.send(GameCommand::Leave {
            player_id,
            reply: tx,
        })
        .await?;
        rx.await
            .map_err(|_| GameError::Internal("Reply dropped".into()))?
    }

    /// Fire-and-forget: the participant's connection is gone.
    pub async fn disconnect(&self, player_id: String) {
        let _ = self.cmd_tx.send(GameCommand::Disconnect { player_id }).await;
    }

    pub async fn make_move(&self, command: MoveCommand) -> Result<RemoteGameState, GameError> {
        let (tx, rx) = oneshot::channel();
        self.send(GameCommand::MakeMove { command, reply: tx })
            .await?;
        rx.await
            .map_err(|_| GameError::Internal("Reply dropped".into()))?
    }

    pub async fn get_snapshot(&self) -> Result<RemoteGameState, GameError> {
        let (tx, rx) = oneshot::channel();
        self.send(GameCommand::GetSnapshot { reply: tx }).await?;
        rx.await
            .map_err(|_| GameError::Internal("Reply dropped".into()))
    }

    pub async fn subscribe(
        &self,
    ) -> Result<(RemoteGameState, broadcast::Receiver<GameEvent>), GameError> {
        let (tx, rx) = oneshot::channel();
        self.send(GameCommand::Subscribe { reply: tx }).await?;
        rx.await
            .map_err(|_| GameError::Internal("Reply dropped".into()))
    }

    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(GameCommand::Shutdown).await;
    }

    async fn send(&self, cmd: GameCommand) -> Result<(), GameError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| GameError::Internal("Game actor closed".into()))
    }
}
