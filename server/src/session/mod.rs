pub mod actor;
pub mod commands;
pub mod events;
pub mod handle;
pub(crate) mod state;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chess_proto::{CreateGame, Participant, RemoteGameState};
use tokio::sync::{broadcast, mpsc, RwLock};
use uuid::Uuid;

use actor::run_game_actor;
pub use commands::{GameError, JoinRequest, Joined, MoveCommand};
pub use events::GameEvent;
pub use handle::GameHandle;
use state::GameState;

/// A freshly created game, with the creator's seat and a subscription taken
/// before anyone else could change the state.
#[derive(Debug)]
pub struct Created {
    pub participant: Participant,
    pub state: RemoteGameState,
    pub events: broadcast::Receiver<GameEvent>,
}

/// Manages all live games. Spawns an actor task per game and forgets the
/// game once its actor exits.
pub struct GameManager {
    games: Arc<RwLock<HashMap<String, GameHandle>>>,
    clock_resolution: Duration,
}

impl GameManager {
    pub fn new(clock_resolution: Duration) -> Self {
        Self {
            games: Arc::new(RwLock::new(HashMap::new())),
            clock_resolution,
        }
    }

    pub async fn create_game(&self, request: CreateGame) -> Result<Created, GameError> {
        let game_id = Uuid::new_v4().to_string();
        let (state, participant) = GameState::create(game_id.clone(), &request)?;

        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (event_tx, events) = broadcast::channel(100);
        let snapshot = state.snapshot();

        let handle = GameHandle::new(game_id.clone(), cmd_tx);
        self.games.write().await.insert(game_id.clone(), handle);
        tracing::info!(game_id = %game_id, "Game created");

        let resolution = self.clock_resolution;
        let games = Arc::clone(&self.games);
        let id = game_id.clone();
        tokio::spawn(async move {
            run_game_actor(state, cmd_rx, event_tx, resolution).await;
            if games.write().await.remove(&id).is_some() {
                tracing::info!(game_id = %id, "Game removed");
            }
        });

        Ok(Created {
            participant,
            state: snapshot,
            events,
        })
    }

    pub async fn get_handle(&self, game_id: &str) -> Result<GameHandle, GameError> {
        self.games
            .read()
            .await
            .get(game_id)
            .cloned()
            .ok_or_else(|| GameError::NotFound(game_id.to_string()))
    }

    pub async fn game_count(&self) -> usize {
        self.games.read().await.len()
    }

    /// Stop every game actor.
    pub async fn shutdown(&self) {
        let handles: Vec<GameHandle> = self.games.write().await.drain().map(|(_, h)| h).collect();
        for handle in handles {
            handle.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_proto::{Color, ColorPreference, Role};

    fn manager() -> GameManager {
        GameManager::new(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_create_then_join() {
        let manager = manager();
        let created = manager
            .create_game(CreateGame {
                creator_color: Some(ColorPreference::Black),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(created.participant.color, Some(Color::Black));
        assert_eq!(manager.game_count().await, 1);

        let handle = manager.get_handle(&created.state.game_id).await.unwrap();
        let joined = handle.join(JoinRequest::default()).await.unwrap();
        assert_eq!(joined.participant.role, Role::Player);
        assert_eq!(joined.participant.color, Some(Color::White));
    }

    #[tokio::test]
    async fn test_unknown_game() {
        let manager = manager();
        assert_eq!(
            manager.get_handle("missing").await.err(),
            Some(GameError::NotFound("missing".into()))
        );
    }

    #[tokio::test]
    async fn test_invalid_fen_creates_nothing() {
        let manager = manager();
        let result = manager
            .create_game(CreateGame {
                initial_position: Some("8/8/8 w".into()),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(GameError::InvalidFen(_))));
        assert_eq!(manager.game_count().await, 0);
    }

    #[tokio::test]
    async fn test_finished_game_is_removed_once_left() {
        let manager = manager();
        let created = manager
            .create_game(CreateGame {
                creator_color: Some(ColorPreference::White),
                ..Default::default()
            })
            .await
            .unwrap();
        let white = created.participant.player_id;
        let handle = manager.get_handle(&created.state.game_id).await.unwrap();
        let black = handle
            .join(JoinRequest::default())
            .await
            .unwrap()
            .participant
            .player_id;

        for (player, from, to) in [
            (&white, "f2", "f3"),
            (&black, "e7", "e5"),
            (&white, "g2", "g4"),
            (&black, "d8", "h4"),
        ] {
            handle
                .make_move(MoveCommand {
                    player_id: player.clone(),
                    from: from.into(),
                    to: to.into(),
                    promotion: None,
                })
                .await
                .unwrap();
        }
        handle.leave(white).await.unwrap();
        assert_eq!(manager.game_count().await, 1);

        handle.disconnect(black).await;
        let mut removed = false;
        for _ in 0..50 {
            if manager.game_count().await == 0 {
                removed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(removed);
        assert!(manager.get_handle(&created.state.game_id).await.is_err());
    }

    #[tokio::test]
    async fn test_unfinished_game_survives_everyone_leaving() {
        let manager = manager();
        let created = manager.create_game(CreateGame::default()).await.unwrap();
        let handle = manager.get_handle(&created.state.game_id).await.unwrap();
        handle.leave(created.participant.player_id).await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(manager.game_count().await, 1);
        assert!(handle.get_snapshot().await.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_closes_actors() {
        let manager = manager();
        let created = manager.create_game(CreateGame::default()).await.unwrap();
        let handle = manager.get_handle(&created.state.game_id).await.unwrap();
        manager.shutdown().await;

        assert_eq!(manager.game_count().await, 0);
        // The actor may take a moment to drain; eventually sends fail.
        let mut closed = false;
        for _ in 0..50 {
            if handle.get_snapshot().await.is_err() {
                closed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(closed);
    }
}
