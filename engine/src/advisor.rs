//! Async wrapper that runs searches off the runtime threads.
//!
//! The actor owns no position of its own: each `Go` carries an owned copy that
//! is moved into a blocking task. Only the result of the latest `Go` is ever
//! reported; a `Stop` or a newer `Go` turns any in-flight search into a stale
//! one whose result is dropped.

use chess::{Move, Position};
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::search;

#[derive(Debug, Clone)]
pub enum AdvisorCommand {
    Go {
        request_id: u64,
        position: Position,
        depth: u32,
    },
    Stop,
    Quit,
}

#[derive(Debug, Clone)]
pub enum AdvisorEvent {
    /// `mv` is `None` when the searched position had no legal moves.
    BestMove { request_id: u64, mv: Option<Move> },
    Error(String),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AdvisorError {
    #[error("Advisor task closed")]
    Closed,
}

/// Handle owning the command and event channels of one advisor task.
pub struct Advisor {
    command_tx: mpsc::Sender<AdvisorCommand>,
    event_rx: mpsc::Receiver<AdvisorEvent>,
}

impl Advisor {
    pub fn spawn() -> Self {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (event_tx, event_rx) = mpsc::channel(32);

        tokio::spawn(
            run_advisor(command_rx, event_tx).instrument(tracing::info_span!("advisor")),
        );

        Self {
            command_tx,
            event_rx,
        }
    }

    pub async fn send_command(&self, cmd: AdvisorCommand) -> Result<(), AdvisorError> {
        self.command_tx
            .send(cmd)
            .await
            .map_err(|_| AdvisorError::Closed)
    }

    pub async fn go(&self, request_id: u64, position: Position, depth: u32) -> Result<(), AdvisorError> {
        self.send_command(AdvisorCommand::Go {
            request_id,
            position,
            depth,
        })
        .await
    }

    pub async fn stop(&self) -> Result<(), AdvisorError> {
        self.send_command(AdvisorCommand::Stop).await
    }

    /// Next event, or `None` once the task has exited.
    pub async fn recv_event(&mut self) -> Option<AdvisorEvent> {
        self.event_rx.recv().await
    }

    pub async fn shutdown(self) {
        let _ = self.command_tx.send(AdvisorCommand::Quit).await;
    }
}

type SearchResult = (u64, Result<Option<Move>, String>);

async fn run_advisor(
    mut command_rx: mpsc::Receiver<AdvisorCommand>,
    event_tx: mpsc::Sender<AdvisorEvent>,
) {
    tracing::debug!("Advisor started");

    let (result_tx, mut result_rx) = mpsc::channel::<SearchResult>(8);
    let mut current: Option<u64> = None;

    loop {
        tokio::select! {
            biased;

            cmd = command_rx.recv() => {
                match cmd {
                    Some(AdvisorCommand::Go { request_id, position, depth }) => {
                        tracing::debug!(request_id, depth, fen = %position, "Starting search");
                        current = Some(request_id);
                        let tx = result_tx.clone();
                        tokio::spawn(async move {
                            let result = tokio::task::spawn_blocking(move || {
                                search::best_move(&position, depth)
                            })
                            .await
                            .map_err(|e| e.to_string());
                            let _ = tx.send((request_id, result)).await;
                        });
                    }
                    Some(AdvisorCommand::Stop) => {
                        if let Some(request_id) = current.take() {
                            tracing::debug!(request_id, "Search cancelled");
                        }
                    }
                    Some(AdvisorCommand::Quit) | None => break,
                }
            }

            Some((request_id, result)) = result_rx.recv() => {
                if current != Some(request_id) {
                    tracing::trace!(request_id, "Discarding stale search result");
                    continue;
                }
                current = None;
                let event = match result {
                    Ok(mv) => AdvisorEvent::BestMove { request_id, mv },
                    Err(e) => {
                        tracing::error!(request_id, "Search task failed: {}", e);
                        AdvisorEvent::Error(e)
                    }
                };
                if event_tx.send(event).await.is_err() {
                    break;
                }
            }
        }
    }

    tracing::debug!("Advisor exited");
}
