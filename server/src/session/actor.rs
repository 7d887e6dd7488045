use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time;
use tracing::Instrument;

use super::commands::*;
use super::events::GameEvent;
use super::state::GameState;

/// The main game actor loop.
/// Owns all mutable game state. Commands and clock ticks are processed sequentially.
pub(crate) async fn run_game_actor(
    state: GameState,
    cmd_rx: mpsc::Receiver<GameCommand>,
    event_tx: broadcast::Sender<GameEvent>,
    clock_resolution: Duration,
) {
    let game_id = state.game_id.clone();
    run_game_actor_inner(state, cmd_rx, event_tx, clock_resolution)
        .instrument(tracing::info_span!("game", id = %game_id))
        .await;
}

async fn run_game_actor_inner(
    mut state: GameState,
    mut cmd_rx: mpsc::Receiver<GameCommand>,
    event_tx: broadcast::Sender<GameEvent>,
    clock_resolution: Duration,
) {
    tracing::info!("Game actor started");

    let mut clock_interval = time::interval(clock_resolution);
    clock_interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(GameCommand::Shutdown) | None => {
                        tracing::info!("Game actor shutting down");
                        break;
                    }
                    Some(cmd) => handle_command(&mut state, cmd, &event_tx),
                }
            }

            _ = clock_interval.tick(), if state.clock_running() => {
                if state.tick_clock() {
                    // Flag fell
                    broadcast_state(&state, &event_tx);
                }
            }
        }

        if state.is_abandoned() {
            tracing::info!("Finished game has no participants left");
            break;
        }
    }

    tracing::info!("Game actor exited");
}

fn handle_command(
    state: &mut GameState,
    cmd: GameCommand,
    event_tx: &broadcast::Sender<GameEvent>,
) {
    match cmd {
        GameCommand::Join { request, reply } => {
            // Subscribe before the change so the joiner sees every later event.
            let events = event_tx.subscribe();
            let participant = state.join(request);
            let snapshot = state.snapshot();
            if state.take_match_found() {
                tracing::info!("Both seats filled");
                let _ = event_tx.send(GameEvent::MatchFound(snapshot.clone()));
            } else {
                let _ = event_tx.send(GameEvent::StateChanged(snapshot.clone()));
            }
            let _ = reply.send(Ok(Joined {
                participant,
                state: snapshot,
                events,
            }));
        }
        GameCommand::Leave { player_id, reply } => {
            let result = state.leave(&player_id).map(|()| state.snapshot());
            if let Ok(ref snap) = result {
                let _ = event_tx.send(GameEvent::StateChanged(snap.clone()));
            }
            let _ = reply.send(result);
        }
        GameCommand::Disconnect { player_id } => {
            if state.leave(&player_id).is_ok() {
                tracing::debug!("Participant connection dropped");
                broadcast_state(state, event_tx);
            }
        }
        GameCommand::MakeMove { command, reply } => {
            let result = state.apply_move(&command).map(|()| state.snapshot());
            match result {
                Ok(ref snap) => {
                    let _ = event_tx.send(GameEvent::StateChanged(snap.clone()));
                }
                Err(ref e) => {
                    tracing::debug!("Move rejected: {}", e);
                    // A rejection can still be the tick that made a flag fall.
                    if matches!(e, GameError::GameOver) {
                        broadcast_state(state, event_tx);
                    }
                }
            }
            let _ = reply.send(result);
        }
        GameCommand::GetSnapshot { reply } => {
            let _ = reply.send(state.snapshot());
        }
        GameCommand::Subscribe { reply } => {
            let _ = reply.send((state.snapshot(), event_tx.subscribe()));
        }
        GameCommand::Shutdown => unreachable!(),
    }
}

fn broadcast_state(state: &GameState, event_tx: &broadcast::Sender<GameEvent>) {
    // No receivers is fine.
    let _ = event_tx.send(GameEvent::StateChanged(state.snapshot()));
}
