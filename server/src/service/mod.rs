//! TCP front of the game server.
//!
//! One task per connection reads newline-delimited [`ClientRequest`]s and
//! answers each with exactly one [`Ack`]. Game events reach the connection
//! through one forwarder task per joined game, feeding the same outbound
//! queue as the acks so a single writer task owns the socket.

pub mod converters;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use chess_proto::{
    decode_line, encode_line, read_frame, Ack, ClientRequest, Participant, ProtocolError, Push,
    Request, ServerMessage,
};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::session::{GameError, GameEvent, GameManager, JoinRequest, MoveCommand};

const OUTBOUND_CAPACITY: usize = 64;

/// Accept connections forever.
pub async fn serve(listener: TcpListener, manager: Arc<GameManager>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!("Accept failed: {}", e);
                continue;
            }
        };
        let manager = manager.clone();
        tokio::spawn(
            handle_connection(stream, peer, manager)
                .instrument(tracing::info_span!("connection", %peer)),
        );
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, manager: Arc<GameManager>) {
    tracing::info!("Client connected");
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!("Could not set TCP_NODELAY: {}", e);
    }

    let (read, write) = stream.into_split();
    let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
    let writer = tokio::spawn(run_writer(write, outbound_rx).in_current_span());

    let mut conn = ClientConnection {
        manager,
        outbound,
        memberships: HashMap::new(),
    };
    conn.send(ServerMessage::Push(Push::ConnectionEstablished))
        .await;

    let mut reader = BufReader::new(read);
    loop {
        let line = match read_frame(&mut reader).await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(ProtocolError::NotUtf8) => {
                conn.send(ServerMessage::Push(Push::GameError {
                    message: ProtocolError::NotUtf8.to_string(),
                }))
                .await;
                continue;
            }
            Err(ProtocolError::TooLong) => {
                tracing::warn!("Oversized request, closing connection");
                conn.send(ServerMessage::Push(Push::GameError {
                    message: ProtocolError::TooLong.to_string(),
                }))
                .await;
                break;
            }
            Err(e) => {
                tracing::debug!("Read failed: {}", e);
                break;
            }
        };

        match decode_line::<ClientRequest>(&line) {
            Ok(request) => conn.handle_request(request).await,
            Err(ProtocolError::Empty) => {}
            Err(e) => {
                tracing::warn!("Malformed request: {}", e);
                conn.send(ServerMessage::Push(Push::GameError {
                    message: e.to_string(),
                }))
                .await;
            }
        }
    }

    conn.disconnect_all().await;
    drop(conn);
    let _ = writer.await;
    tracing::info!(%peer, "Client disconnected");
}

async fn run_writer(mut write: OwnedWriteHalf, mut outbound_rx: mpsc::Receiver<ServerMessage>) {
    while let Some(msg) = outbound_rx.recv().await {
        let line = match encode_line(&msg) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Failed to encode server message: {}", e);
                continue;
            }
        };
        if let Err(e) = write.write_all(line.as_bytes()).await {
            tracing::debug!("Write failed: {}", e);
            break;
        }
    }
}

/// This connection's seat (or spectator slot) in one game.
struct Membership {
    player_id: String,
    forwarder: JoinHandle<()>,
}

struct ClientConnection {
    manager: Arc<GameManager>,
    outbound: mpsc::Sender<ServerMessage>,
    memberships: HashMap<String, Membership>,
}

impl ClientConnection {
    async fn send(&self, msg: ServerMessage) {
        // The writer only stops once the socket is gone.
        let _ = self.outbound.send(msg).await;
    }

    async fn handle_request(&mut self, request: ClientRequest) {
        let id = request.id;
        let kind = request.request.kind();
        tracing::debug!(id, kind, "Request");

        if let Err(e) = self.dispatch(id, request.request).await {
            tracing::debug!(id, kind, "Request rejected: {}", e);
            self.send(ServerMessage::Ack(Ack::error(id, e.to_string())))
                .await;
        }
    }

    /// Sends the success ack itself; errors are acked by the caller.
    async fn dispatch(&mut self, id: u64, request: Request) -> Result<(), GameError> {
        match request {
            Request::CreateGame(create) => {
                let created = self.manager.create_game(create).await?;
                let game_id = created.state.game_id.clone();
                self.send(ServerMessage::Ack(
                    Ack::ok(id)
                        .with_state(created.state)
                        .with_participant(created.participant.clone()),
                ))
                .await;
                self.track(game_id, created.participant, created.events);
            }
            Request::JoinGame(join) => {
                let handle = self.manager.get_handle(&join.game_id).await?;
                let joined = handle
                    .join(JoinRequest {
                        name: join.name,
                        player_id: join.player_id,
                        requested_color: join.requested_color,
                    })
                    .await?;
                self.send(ServerMessage::Ack(
                    Ack::ok(id)
                        .with_state(joined.state)
                        .with_participant(joined.participant.clone()),
                ))
                .await;
                self.track(join.game_id, joined.participant, joined.events);
            }
            Request::LeaveGame(leave) => {
                let handle = self.manager.get_handle(&leave.game_id).await?;
                let state = handle.leave(leave.player_id.clone()).await?;
                if let Some(membership) = self.memberships.remove(&leave.game_id) {
                    membership.forwarder.abort();
                }
                self.send(ServerMessage::Ack(Ack::ok(id).with_state(state)))
                    .await;
            }
            Request::MakeMove(mv) => {
                let handle = self.manager.get_handle(&mv.game_id).await?;
                let state = handle
                    .make_move(MoveCommand {
                        player_id: mv.player_id,
                        from: mv.from,
                        to: mv.to,
                        promotion: mv.promotion,
                    })
                    .await?;
                self.send(ServerMessage::Ack(Ack::ok(id).with_state(state)))
                    .await;
            }
            Request::FetchGame(fetch) => {
                let handle = self.manager.get_handle(&fetch.game_id).await?;
                let state = handle.get_snapshot().await?;
                self.send(ServerMessage::Ack(Ack::ok(id).with_state(state)))
                    .await;
            }
        }
        Ok(())
    }

    /// Start forwarding a game's events, replacing any earlier membership
    /// of this connection in the same game.
    fn track(
        &mut self,
        game_id: String,
        participant: Participant,
        events: broadcast::Receiver<GameEvent>,
    ) {
        let player_id = participant.player_id.clone();
        let forwarder = tokio::spawn(
            forward_events(game_id.clone(), participant, events, self.outbound.clone())
                .in_current_span(),
        );
        if let Some(previous) = self.memberships.insert(
            game_id,
            Membership {
                player_id,
                forwarder,
            },
        ) {
            previous.forwarder.abort();
        }
    }

    async fn disconnect_all(&mut self) {
        for (game_id, membership) in self.memberships.drain() {
            membership.forwarder.abort();
            if let Ok(handle) = self.manager.get_handle(&game_id).await {
                handle.disconnect(membership.player_id).await;
            }
        }
    }
}

async fn forward_events(
    game_id: String,
    participant: Participant,
    mut events: broadcast::Receiver<GameEvent>,
    outbound: mpsc::Sender<ServerMessage>,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                // Every event carries the full state, so the next one catches up.
                tracing::warn!(%game_id, skipped = n, "Connection lagging behind game events");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let push = match event {
            GameEvent::MatchFound(state) if participant.is_player() => Push::MatchFound {
                game_id: game_id.clone(),
                participant: participant.clone(),
                state,
            },
            GameEvent::MatchFound(state) | GameEvent::StateChanged(state) => {
                Push::GameState { state }
            }
        };
        if outbound.send(ServerMessage::Push(push)).await.is_err() {
            break;
        }
    }
}
