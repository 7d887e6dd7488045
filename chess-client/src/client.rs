//! Sync client actor and its cloneable handle.
//!
//! The actor owns the [`SyncState`], the live connection and the table of
//! requests awaiting acknowledgment. Commands and server messages are applied
//! one at a time in the order they arrive, so a push can never interleave with
//! the handling of an acknowledgment.

use std::collections::HashMap;
use std::sync::Arc;

use chess_proto::{
    Ack, ClientRequest, ColorPreference, CreateGame, FetchGame, JoinGame, LeaveGame, MakeMove,
    Participant, Push, RemoteGameState, Request, ServerMessage,
};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{self, Instant};
use tracing::Instrument;

use crate::config::ReconnectPolicy;
use crate::error::{ClientError, ClientResult};
use crate::state::{ConnectionState, Membership, SyncState};
use crate::store::TokenStore;
use crate::transport::{Connection, Connector};

/// Events broadcast to every subscriber.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    Connection(ConnectionState),
    Membership(Membership),
    /// The mirror was replaced with this snapshot.
    State(RemoteGameState),
    /// The mirror was dropped because it no longer belongs to this client.
    DisplayReset,
    ServerError(String),
}

/// Successful create or join.
#[derive(Debug, Clone)]
pub struct GameJoined {
    pub game_id: String,
    pub participant: Participant,
    pub state: RemoteGameState,
}

/// Options for joining an existing game.
#[derive(Debug, Clone, Default)]
pub struct JoinOptions {
    pub name: Option<String>,
    pub color: Option<ColorPreference>,
}

enum ClientCommand {
    Connect {
        reply: oneshot::Sender<ClientResult<()>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    CreateGame {
        options: CreateGame,
        reply: oneshot::Sender<ClientResult<GameJoined>>,
    },
    JoinGame {
        game_id: String,
        options: JoinOptions,
        reply: oneshot::Sender<ClientResult<GameJoined>>,
    },
    LeaveGame {
        reply: oneshot::Sender<ClientResult<()>>,
    },
    SendMove {
        from: String,
        to: String,
        promotion: Option<String>,
        reply: oneshot::Sender<ClientResult<()>>,
    },
    FetchGame {
        game_id: String,
        reply: oneshot::Sender<ClientResult<RemoteGameState>>,
    },
    GetState {
        reply: oneshot::Sender<SyncState>,
    },
    Subscribe {
        reply: oneshot::Sender<(SyncState, broadcast::Receiver<ClientEvent>)>,
    },
    Shutdown,
}

/// Cheap, cloneable handle to a client actor.
#[derive(Clone)]
pub struct SyncClient {
    cmd_tx: mpsc::Sender<ClientCommand>,
}

impl SyncClient {
    /// Spawn the actor. No connection is attempted until [`SyncClient::connect`].
    pub fn spawn(
        connector: Box<dyn Connector>,
        store: Arc<dyn TokenStore>,
        policy: ReconnectPolicy,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (event_tx, _) = broadcast::channel(100);

        let actor = ClientActor {
            connector,
            store,
            policy,
            state: SyncState::new(),
            conn: None,
            pending: HashMap::new(),
            next_id: 1,
            reconnect: None,
            connect_waiters: Vec::new(),
            display_name: None,
            event_tx,
        };
        tokio::spawn(actor.run(cmd_rx).instrument(tracing::info_span!("sync_client")));

        Self { cmd_tx }
    }

    /// Establish the transport, retrying per the reconnect policy.
    pub async fn connect(&self) -> ClientResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(ClientCommand::Connect { reply: tx }).await?;
        rx.await.map_err(|_| ClientError::Closed)?
    }

    /// Drop the transport and stop reconnecting. Membership is kept, so a
    /// later [`SyncClient::connect`] rejoins the game.
    pub async fn disconnect(&self) -> ClientResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(ClientCommand::Disconnect { reply: tx }).await?;
        rx.await.map_err(|_| ClientError::Closed)
    }

    pub async fn create_game(&self, options: CreateGame) -> ClientResult<GameJoined> {
        let (tx, rx) = oneshot::channel();
        self.send(ClientCommand::CreateGame { options, reply: tx })
            .await?;
        rx.await.map_err(|_| ClientError::Closed)?
    }

    /// Join `game_id`, presenting any stored token for it.
    pub async fn join_game(&self, game_id: &str, options: JoinOptions) -> ClientResult<GameJoined> {
        let (tx, rx) = oneshot::channel();
        self.send(ClientCommand::JoinGame {
            game_id: game_id.to_string(),
            options,
            reply: tx,
        })
        .await?;
        rx.await.map_err(|_| ClientError::Closed)?
    }

    /// Leave the current game. Membership is dropped locally straight away,
    /// even if the server cannot be told.
    pub async fn leave_game(&self) -> ClientResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(ClientCommand::LeaveGame { reply: tx }).await?;
        rx.await.map_err(|_| ClientError::Closed)?
    }

    /// Submit a move. The mirror only changes once the server confirms.
    ///
    /// Callers must not have two moves in flight at once: acknowledgments
    /// are not ordered relative to each other.
    pub async fn send_move(&self, from: &str, to: &str, promotion: Option<&str>) -> ClientResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(ClientCommand::SendMove {
            from: from.to_string(),
            to: to.to_string(),
            promotion: promotion.map(str::to_string),
            reply: tx,
        })
        .await?;
        rx.await.map_err(|_| ClientError::Closed)?
    }

    pub async fn fetch_game(&self, game_id: &str) -> ClientResult<RemoteGameState> {
        let (tx, rx) = oneshot::channel();
        self.send(ClientCommand::FetchGame {
            game_id: game_id.to_string(),
            reply: tx,
        })
        .await?;
        rx.await.map_err(|_| ClientError::Closed)?
    }

    pub async fn state(&self) -> ClientResult<SyncState> {
        let (tx, rx) = oneshot::channel();
        self.send(ClientCommand::GetState { reply: tx }).await?;
        rx.await.map_err(|_| ClientError::Closed)
    }

    /// Current state plus a receiver for every event after it.
    pub async fn subscribe(&self) -> ClientResult<(SyncState, broadcast::Receiver<ClientEvent>)> {
        let (tx, rx) = oneshot::channel();
        self.send(ClientCommand::Subscribe { reply: tx }).await?;
        rx.await.map_err(|_| ClientError::Closed)
    }

    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(ClientCommand::Shutdown).await;
    }

    async fn send(&self, cmd: ClientCommand) -> ClientResult<()> {
        self.cmd_tx.send(cmd).await.map_err(|_| ClientError::Closed)
    }
}

/// A request awaiting its acknowledgment.
enum Pending {
    Joined {
        /// Token presented with a join, to detect being given a new identity.
        presented_token: Option<String>,
        reply: oneshot::Sender<ClientResult<GameJoined>>,
    },
    Left {
        reply: oneshot::Sender<ClientResult<()>>,
    },
    Moved {
        reply: oneshot::Sender<ClientResult<()>>,
    },
    Fetched {
        reply: oneshot::Sender<ClientResult<RemoteGameState>>,
    },
    /// Automatic join after a reconnect.
    Rejoin {
        game_id: String,
        previous_player_id: String,
    },
}

impl Pending {
    fn fail(self, err: ClientError) {
        match self {
            Self::Joined { reply, .. } => {
                let _ = reply.send(Err(err));
            }
            Self::Left { reply } | Self::Moved { reply } => {
                let _ = reply.send(Err(err));
            }
            Self::Fetched { reply } => {
                let _ = reply.send(Err(err));
            }
            Self::Rejoin { .. } => {}
        }
    }
}

struct Reconnect {
    attempt: u32,
    at: Instant,
    /// Rejoin the current game once connected.
    rejoin: bool,
}

struct ClientActor {
    connector: Box<dyn Connector>,
    store: Arc<dyn TokenStore>,
    policy: ReconnectPolicy,
    state: SyncState,
    conn: Option<Box<dyn Connection>>,
    pending: HashMap<u64, Pending>,
    next_id: u64,
    reconnect: Option<Reconnect>,
    connect_waiters: Vec<oneshot::Sender<ClientResult<()>>>,
    display_name: Option<String>,
    event_tx: broadcast::Sender<ClientEvent>,
}

impl ClientActor {
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<ClientCommand>) {
        tracing::debug!("Client actor started");

        loop {
            let deadline = self.reconnect.as_ref().map(|r| r.at);

            tokio::select! {
                biased;

                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(ClientCommand::Shutdown) | None => break,
                        Some(cmd) => self.handle_command(cmd).await,
                    }
                }

                msg = next_message(&mut self.conn) => {
                    match msg {
                        Ok(Some(msg)) => self.handle_message(msg),
                        Ok(None) => self.connection_lost("server closed the connection"),
                        Err(e) => self.connection_lost(&e.to_string()),
                    }
                }

                _ = sleep_until(deadline) => {
                    self.try_connect().await;
                }
            }
        }

        self.fail_pending(ClientError::Closed);
        tracing::debug!("Client actor exited");
    }

    async fn handle_command(&mut self, cmd: ClientCommand) {
        match cmd {
            ClientCommand::Connect { reply } => {
                if self.conn.is_some() {
                    let _ = reply.send(Ok(()));
                    return;
                }
                self.connect_waiters.push(reply);
                if self.reconnect.is_none() {
                    self.set_connection(ConnectionState::Connecting);
                    self.reconnect = Some(Reconnect {
                        attempt: 0,
                        at: Instant::now(),
                        rejoin: self.state.game_id().is_some(),
                    });
                }
            }
            ClientCommand::Disconnect { reply } => {
                tracing::info!("Disconnecting");
                self.conn = None;
                self.reconnect = None;
                let err = ClientError::Connection("disconnected".into());
                for waiter in self.connect_waiters.drain(..) {
                    let _ = waiter.send(Err(err.clone()));
                }
                self.fail_pending(err);
                self.set_connection(ConnectionState::Idle);
                let _ = reply.send(());
            }
            ClientCommand::CreateGame { options, reply } => {
                self.display_name = options.creator_name.clone();
                self.send_request(
                    Request::CreateGame(options),
                    Pending::Joined {
                        presented_token: None,
                        reply,
                    },
                )
                .await;
            }
            ClientCommand::JoinGame {
                game_id,
                options,
                reply,
            } => {
                let token = self.stored_token(&game_id);
                self.display_name = options.name.clone();
                let request = Request::JoinGame(JoinGame {
                    game_id,
                    name: options.name,
                    player_id: token.clone(),
                    requested_color: options.color,
                });
                self.send_request(
                    request,
                    Pending::Joined {
                        presented_token: token,
                        reply,
                    },
                )
                .await;
            }
            ClientCommand::LeaveGame { reply } => {
                let Membership::InGame {
                    game_id,
                    participant,
                } = self.state.membership().clone()
                else {
                    let _ = reply.send(Err(ClientError::NotInGame));
                    return;
                };
                self.state.leave_game();
                self.emit(ClientEvent::Membership(Membership::NotInGame));
                let request = Request::LeaveGame(LeaveGame {
                    game_id,
                    player_id: participant.player_id,
                });
                self.send_request(request, Pending::Left { reply }).await;
            }
            ClientCommand::SendMove {
                from,
                to,
                promotion,
                reply,
            } => {
                let (game_id, player_id) = match self.state.check_can_move() {
                    Ok((g, p)) => (g.to_string(), p.to_string()),
                    Err(e) => {
                        let _ = reply.send(Err(e));
                        return;
                    }
                };
                let request = Request::MakeMove(MakeMove {
                    game_id,
                    player_id,
                    from,
                    to,
                    promotion,
                });
                self.send_request(request, Pending::Moved { reply }).await;
            }
            ClientCommand::FetchGame { game_id, reply } => {
                self.send_request(
                    Request::FetchGame(FetchGame { game_id }),
                    Pending::Fetched { reply },
                )
                .await;
            }
            ClientCommand::GetState { reply } => {
                let _ = reply.send(self.state.clone());
            }
            ClientCommand::Subscribe { reply } => {
                let _ = reply.send((self.state.clone(), self.event_tx.subscribe()));
            }
            ClientCommand::Shutdown => unreachable!(),
        }
    }

    async fn send_request(&mut self, request: Request, pending: Pending) {
        let Some(conn) = self.conn.as_mut() else {
            pending.fail(ClientError::Connection("not connected".into()));
            return;
        };

        let id = self.next_id;
        self.next_id += 1;
        tracing::debug!(id, kind = request.kind(), "Sending request");

        match conn.send(&ClientRequest { id, request }).await {
            Ok(()) => {
                self.pending.insert(id, pending);
            }
            Err(e) => {
                pending.fail(e.clone());
                self.connection_lost(&e.to_string());
            }
        }
    }

    fn handle_message(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::Ack(ack) => self.handle_ack(ack),
            ServerMessage::Push(push) => self.handle_push(push),
        }
    }

    fn handle_ack(&mut self, ack: Ack) {
        let Some(pending) = self.pending.remove(&ack.id) else {
            tracing::warn!(id = ack.id, "Acknowledgment for unknown request");
            return;
        };
        let rejection = || ClientError::ServerRejected(ack.message.clone().unwrap_or_default());

        match pending {
            Pending::Joined {
                presented_token,
                reply,
            } => {
                if !ack.ok {
                    let _ = reply.send(Err(rejection()));
                    return;
                }
                let result = joined_from_ack(ack).map(|joined| {
                    self.apply_joined(&joined, presented_token.as_deref());
                    joined
                });
                let _ = reply.send(result);
            }
            Pending::Left { reply } => {
                let _ = reply.send(if ack.ok { Ok(()) } else { Err(rejection()) });
            }
            Pending::Moved { reply } => {
                if !ack.ok {
                    let _ = reply.send(Err(rejection()));
                    return;
                }
                if let Some(state) = ack.state {
                    self.replace_mirror(state);
                }
                let _ = reply.send(Ok(()));
            }
            Pending::Fetched { reply } => {
                if !ack.ok {
                    let _ = reply.send(Err(rejection()));
                    return;
                }
                let result = match ack.state {
                    Some(state) => {
                        if self.state.game_id() == Some(state.game_id.as_str()) {
                            self.replace_mirror(state.clone());
                        }
                        Ok(state)
                    }
                    None => Err(ClientError::InvalidResponse("fetch ack without state".into())),
                };
                let _ = reply.send(result);
            }
            Pending::Rejoin {
                game_id,
                previous_player_id,
            } => {
                if !ack.ok {
                    let message = ack.message.unwrap_or_default();
                    tracing::warn!(%game_id, "Rejoin rejected: {}", message);
                    self.state.leave_game();
                    self.emit(ClientEvent::DisplayReset);
                    self.emit(ClientEvent::Membership(Membership::NotInGame));
                    self.server_error(message);
                    return;
                }
                match joined_from_ack(ack) {
                    Ok(joined) => self.apply_joined(&joined, Some(&previous_player_id)),
                    Err(e) => tracing::error!(%game_id, "Bad rejoin acknowledgment: {}", e),
                }
            }
        }
    }

    fn handle_push(&mut self, push: Push) {
        match push {
            Push::ConnectionEstablished => {
                tracing::debug!("Server greeted connection");
            }
            Push::MatchFound {
                game_id,
                participant,
                state,
            } => {
                let joined = GameJoined {
                    game_id,
                    participant,
                    state,
                };
                self.apply_joined(&joined, None);
            }
            Push::GameState { state } => {
                if self.state.game_id() == Some(state.game_id.as_str()) {
                    self.replace_mirror(state);
                } else {
                    tracing::debug!(game_id = %state.game_id, "Ignoring state for a game we are not in");
                }
            }
            Push::GameError { message } => self.server_error(message),
        }
    }

    /// Adopt a (possibly new) identity in a game and mirror its state.
    fn apply_joined(&mut self, joined: &GameJoined, expected_player_id: Option<&str>) {
        if let Some(expected) = expected_player_id {
            if expected != joined.participant.player_id {
                tracing::info!(game_id = %joined.game_id, "Server issued a new identity, resetting display");
                self.state.replace_mirror(None);
                self.emit(ClientEvent::DisplayReset);
            }
        }

        if let Err(e) = self
            .store
            .set(&joined.game_id, &joined.participant.player_id)
        {
            tracing::warn!("Could not persist reconnection token: {}", e);
        }

        self.state
            .enter_game(joined.game_id.clone(), joined.participant.clone());
        self.emit(ClientEvent::Membership(self.state.membership().clone()));
        self.replace_mirror(joined.state.clone());
    }

    fn replace_mirror(&mut self, state: RemoteGameState) {
        self.state.replace_mirror(Some(state.clone()));
        self.emit(ClientEvent::State(state));
    }

    fn server_error(&mut self, message: String) {
        self.state.record_error(message.clone());
        self.emit(ClientEvent::ServerError(message));
    }

    fn stored_token(&self, game_id: &str) -> Option<String> {
        match self.store.get(game_id) {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(%game_id, "Token store unavailable, joining fresh: {}", e);
                None
            }
        }
    }

    /// Reconnect only when there is a membership to restore.
    fn connection_lost(&mut self, reason: &str) {
        tracing::warn!("Connection lost: {}", reason);
        self.conn = None;
        self.fail_pending(ClientError::Connection(reason.to_string()));
        if self.state.game_id().is_none() {
            self.reconnect = None;
            self.set_connection(ConnectionState::Idle);
            return;
        }
        self.set_connection(ConnectionState::Connecting);
        self.reconnect = Some(Reconnect {
            attempt: 0,
            at: Instant::now() + self.policy.backoff,
            rejoin: true,
        });
    }

    async fn try_connect(&mut self) {
        let Some(mut reconnect) = self.reconnect.take() else {
            return;
        };
        reconnect.attempt += 1;
        tracing::debug!(attempt = reconnect.attempt, "Connecting");

        let result = match time::timeout(self.policy.connect_timeout, self.connector.connect()).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Connection("connect timed out".into())),
        };

        match result {
            Ok(conn) => {
                self.conn = Some(conn);
                self.set_connection(ConnectionState::Connected);
                for waiter in self.connect_waiters.drain(..) {
                    let _ = waiter.send(Ok(()));
                }
                if reconnect.rejoin {
                    self.rejoin().await;
                }
            }
            Err(e) if reconnect.attempt >= self.policy.max_attempts => {
                tracing::error!(attempts = reconnect.attempt, "Giving up on connection: {}", e);
                self.set_connection(ConnectionState::Error(e.to_string()));
                for waiter in self.connect_waiters.drain(..) {
                    let _ = waiter.send(Err(e.clone()));
                }
            }
            Err(e) => {
                tracing::debug!(attempt = reconnect.attempt, "Connect failed: {}", e);
                reconnect.at = Instant::now() + self.policy.backoff;
                self.reconnect = Some(reconnect);
            }
        }
    }

    async fn rejoin(&mut self) {
        let Membership::InGame {
            game_id,
            participant,
        } = self.state.membership().clone()
        else {
            return;
        };

        let token = self.stored_token(&game_id);
        tracing::info!(%game_id, has_token = token.is_some(), "Rejoining after reconnect");
        let request = Request::JoinGame(JoinGame {
            game_id: game_id.clone(),
            name: self.display_name.clone(),
            player_id: token,
            requested_color: participant.color.map(|c| match c {
                chess_proto::Color::White => ColorPreference::White,
                chess_proto::Color::Black => ColorPreference::Black,
            }),
        });
        self.send_request(
            request,
            Pending::Rejoin {
                game_id,
                previous_player_id: participant.player_id,
            },
        )
        .await;
    }

    fn fail_pending(&mut self, err: ClientError) {
        for (_, pending) in self.pending.drain() {
            pending.fail(err.clone());
        }
    }

    fn set_connection(&mut self, connection: ConnectionState) {
        if self.state.set_connection(connection.clone()) {
            self.emit(ClientEvent::Connection(connection));
        }
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.event_tx.send(event);
    }
}

fn joined_from_ack(ack: Ack) -> ClientResult<GameJoined> {
    let state = ack
        .state
        .ok_or_else(|| ClientError::InvalidResponse("acknowledgment without state".into()))?;
    let participant = ack
        .participant
        .ok_or_else(|| ClientError::InvalidResponse("acknowledgment without participant".into()))?;
    Ok(GameJoined {
        game_id: ack.game_id.unwrap_or_else(|| state.game_id.clone()),
        participant,
        state,
    })
}

async fn next_message(conn: &mut Option<Box<dyn Connection>>) -> ClientResult<Option<ServerMessage>> {
    match conn {
        Some(conn) => conn.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::mock::{MockConnector, MockServer, MockServerConnection};
    use crate::store::MemoryTokenStore;
    use chess_proto::{Color, Players, RemoteStatus, Role};

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
    const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";

    fn fast_policy() -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(10),
            connect_timeout: Duration::from_millis(200),
        }
    }

    fn remote(fen: &str, side_to_move: Color) -> RemoteGameState {
        RemoteGameState {
            game_id: "g1".into(),
            fen: fen.into(),
            side_to_move,
            history: vec![],
            status: RemoteStatus::Playing { in_check: false },
            clock: None,
            players: Players::default(),
            spectators: 0,
        }
    }

    fn participant(id: &str, role: Role, color: Option<Color>) -> Participant {
        Participant {
            player_id: id.into(),
            role,
            color,
        }
    }

    async fn connected() -> (SyncClient, MockServer, MockServerConnection, Arc<MemoryTokenStore>) {
        let (connector, mut server) = MockConnector::new();
        let store = Arc::new(MemoryTokenStore::new());
        let client = SyncClient::spawn(Box::new(connector), store.clone(), fast_policy());
        client.connect().await.unwrap();
        let conn = server.accept().await.unwrap();
        (client, server, conn, store)
    }

    /// Create a game as White through the mock server.
    async fn create_as_white(client: &SyncClient, conn: &mut MockServerConnection) -> GameJoined {
        let create = {
            let client = client.clone();
            tokio::spawn(async move { client.create_game(CreateGame::default()).await })
        };
        let req = conn.next_request().await.unwrap();
        assert!(matches!(req.request, Request::CreateGame(_)));
        conn.ack(
            Ack::ok(req.id)
                .with_state(remote(START, Color::White))
                .with_participant(participant("p1", Role::Player, Some(Color::White))),
        );
        create.await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_connect_reports_connected() {
        let (client, _server, _conn, _store) = connected().await;
        let state = client.state().await.unwrap();
        assert_eq!(state.connection(), &ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_create_game_persists_token_and_mirrors() {
        let (client, _server, mut conn, store) = connected().await;
        let joined = create_as_white(&client, &mut conn).await;
        assert_eq!(joined.game_id, "g1");
        assert_eq!(store.get("g1").unwrap().as_deref(), Some("p1"));

        let state = client.state().await.unwrap();
        assert_eq!(state.game_id(), Some("g1"));
        assert_eq!(state.mirror().map(|m| m.fen.as_str()), Some(START));
    }

    #[tokio::test]
    async fn test_rejected_move_leaves_mirror_untouched() {
        let (client, _server, mut conn, _store) = connected().await;
        create_as_white(&client, &mut conn).await;
        let before = client.state().await.unwrap().mirror().cloned();

        let mv = {
            let client = client.clone();
            tokio::spawn(async move { client.send_move("e2", "e5", None).await })
        };
        let req = conn.next_request().await.unwrap();
        let Request::MakeMove(payload) = &req.request else {
            panic!("expected make-move, got {:?}", req.request);
        };
        assert_eq!(payload.player_id, "p1");
        // A misbehaving server attaching state to a rejection must not leak through.
        let mut ack = Ack::error(req.id, "Illegal move: e2e5");
        ack.state = Some(remote(AFTER_E4, Color::Black));
        conn.ack(ack);

        assert_eq!(
            mv.await.unwrap(),
            Err(ClientError::ServerRejected("Illegal move: e2e5".into()))
        );
        assert_eq!(client.state().await.unwrap().mirror().cloned(), before);
    }

    #[tokio::test]
    async fn test_accepted_move_replaces_mirror() {
        let (client, _server, mut conn, _store) = connected().await;
        create_as_white(&client, &mut conn).await;

        let mv = {
            let client = client.clone();
            tokio::spawn(async move { client.send_move("e2", "e4", None).await })
        };
        let req = conn.next_request().await.unwrap();
        conn.ack(Ack::ok(req.id).with_state(remote(AFTER_E4, Color::Black)));
        mv.await.unwrap().unwrap();

        let state = client.state().await.unwrap();
        assert_eq!(state.mirror().map(|m| m.fen.as_str()), Some(AFTER_E4));
        // Black to move now, so a second move fails locally.
        assert_eq!(
            client.send_move("d2", "d4", None).await,
            Err(ClientError::NotYourTurn)
        );
    }

    #[tokio::test]
    async fn test_push_replaces_mirror_wholesale() {
        let (client, _server, mut conn, _store) = connected().await;
        create_as_white(&client, &mut conn).await;
        let (_, mut events) = client.subscribe().await.unwrap();

        let mut pushed = remote(AFTER_E4, Color::Black);
        pushed.spectators = 2;
        conn.push(Push::GameState {
            state: pushed.clone(),
        });

        match events.recv().await.unwrap() {
            ClientEvent::State(state) => assert_eq!(state, pushed),
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(client.state().await.unwrap().mirror(), Some(&pushed));
    }

    #[tokio::test]
    async fn test_local_checks_skip_round_trip() {
        let (client, _server, mut conn, _store) = connected().await;
        assert_eq!(
            client.send_move("e2", "e4", None).await,
            Err(ClientError::NotInGame)
        );

        let join = {
            let client = client.clone();
            tokio::spawn(async move { client.join_game("g1", JoinOptions::default()).await })
        };
        let req = conn.next_request().await.unwrap();
        conn.ack(
            Ack::ok(req.id)
                .with_state(remote(START, Color::White))
                .with_participant(participant("s1", Role::Spectator, None)),
        );
        join.await.unwrap().unwrap();

        assert!(matches!(
            client.send_move("e2", "e4", None).await,
            Err(ClientError::NotAParticipant(_))
        ));

        // Neither rejected move reached the server.
        assert!(tokio::time::timeout(Duration::from_millis(50), conn.next_request())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_join_presents_stored_token() {
        let (client, _server, mut conn, store) = connected().await;
        store.set("g1", "p-old").unwrap();

        let join = {
            let client = client.clone();
            tokio::spawn(async move { client.join_game("g1", JoinOptions::default()).await })
        };
        let req = conn.next_request().await.unwrap();
        let Request::JoinGame(payload) = &req.request else {
            panic!("expected join-game");
        };
        assert_eq!(payload.player_id.as_deref(), Some("p-old"));
        conn.ack(
            Ack::ok(req.id)
                .with_state(remote(START, Color::White))
                .with_participant(participant("p-old", Role::Player, Some(Color::Black))),
        );
        let joined = join.await.unwrap().unwrap();
        assert_eq!(joined.participant.color, Some(Color::Black));
    }

    #[tokio::test]
    async fn test_leave_keeps_token() {
        let (client, _server, mut conn, store) = connected().await;
        create_as_white(&client, &mut conn).await;

        let leave = {
            let client = client.clone();
            tokio::spawn(async move { client.leave_game().await })
        };
        let req = conn.next_request().await.unwrap();
        assert!(matches!(req.request, Request::LeaveGame(_)));
        conn.ack(Ack::ok(req.id));
        leave.await.unwrap().unwrap();

        let state = client.state().await.unwrap();
        assert_eq!(state.membership(), &Membership::NotInGame);
        assert!(state.mirror().is_none());
        assert_eq!(store.get("g1").unwrap().as_deref(), Some("p1"));
    }

    #[tokio::test]
    async fn test_reconnect_rejoins_and_resets_on_new_identity() {
        let (client, mut server, mut conn, _store) = connected().await;
        create_as_white(&client, &mut conn).await;
        let (_, mut events) = client.subscribe().await.unwrap();

        // In-flight move when the transport drops.
        let mv = {
            let client = client.clone();
            tokio::spawn(async move { client.send_move("e2", "e4", None).await })
        };
        let _ = conn.next_request().await.unwrap();
        drop(conn);
        assert!(matches!(mv.await.unwrap(), Err(ClientError::Connection(_))));

        let mut conn = server.accept().await.unwrap();
        let req = conn.next_request().await.unwrap();
        let Request::JoinGame(payload) = &req.request else {
            panic!("expected rejoin, got {:?}", req.request);
        };
        assert_eq!(payload.player_id.as_deref(), Some("p1"));

        // Server forgot us and seats us as a spectator instead.
        conn.ack(
            Ack::ok(req.id)
                .with_state(remote(AFTER_E4, Color::Black))
                .with_participant(participant("s9", Role::Spectator, None)),
        );

        let mut saw_reset = false;
        loop {
            match events.recv().await.unwrap() {
                ClientEvent::DisplayReset => saw_reset = true,
                ClientEvent::State(state) => {
                    assert!(saw_reset, "state arrived before display reset");
                    assert_eq!(state.fen, AFTER_E4);
                    break;
                }
                _ => {}
            }
        }

        let state = client.state().await.unwrap();
        assert_eq!(state.connection(), &ConnectionState::Connected);
        assert_eq!(state.participant().map(|p| p.role), Some(Role::Spectator));
    }

    #[tokio::test]
    async fn test_disconnect_goes_idle_without_reconnecting() {
        let (client, mut server, mut conn, _store) = connected().await;
        create_as_white(&client, &mut conn).await;
        let (_, mut events) = client.subscribe().await.unwrap();

        client.disconnect().await.unwrap();
        match events.recv().await.unwrap() {
            ClientEvent::Connection(state) => assert_eq!(state, ConnectionState::Idle),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(conn.next_request().await.is_none());
        assert!(tokio::time::timeout(Duration::from_millis(50), server.accept())
            .await
            .is_err());

        let state = client.state().await.unwrap();
        assert_eq!(state.connection(), &ConnectionState::Idle);
        assert_eq!(state.game_id(), Some("g1"));

        // Connecting again restores the game.
        client.connect().await.unwrap();
        let mut conn = server.accept().await.unwrap();
        let req = conn.next_request().await.unwrap();
        assert!(matches!(req.request, Request::JoinGame(_)));
    }

    #[tokio::test]
    async fn test_lost_connection_outside_game_goes_idle() {
        let (client, mut server, conn, _store) = connected().await;
        let (_, mut events) = client.subscribe().await.unwrap();

        drop(conn);
        loop {
            if let ClientEvent::Connection(state) = events.recv().await.unwrap() {
                assert_eq!(state, ConnectionState::Idle);
                break;
            }
        }
        assert!(tokio::time::timeout(Duration::from_millis(50), server.accept())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_leave_while_disconnected_drops_membership() {
        let (client, _server, mut conn, store) = connected().await;
        create_as_white(&client, &mut conn).await;
        client.disconnect().await.unwrap();

        assert!(matches!(
            client.leave_game().await,
            Err(ClientError::Connection(_))
        ));
        let state = client.state().await.unwrap();
        assert_eq!(state.membership(), &Membership::NotInGame);
        assert!(state.mirror().is_none());
        assert_eq!(store.get("g1").unwrap().as_deref(), Some("p1"));
    }

    #[tokio::test]
    async fn test_push_for_other_game_is_ignored() {
        let (client, _server, mut conn, _store) = connected().await;
        create_as_white(&client, &mut conn).await;
        let (_, mut events) = client.subscribe().await.unwrap();

        let mut stray = remote(AFTER_E4, Color::Black);
        stray.game_id = "g2".into();
        conn.push(Push::GameState { state: stray });
        let mut pushed = remote(AFTER_E4, Color::Black);
        pushed.spectators = 1;
        conn.push(Push::GameState {
            state: pushed.clone(),
        });

        // The first state event is the push for our own game.
        loop {
            if let ClientEvent::State(state) = events.recv().await.unwrap() {
                assert_eq!(state, pushed);
                break;
            }
        }
        assert_eq!(client.state().await.unwrap().mirror(), Some(&pushed));
    }

    #[tokio::test]
    async fn test_retries_exhausted_enter_error() {
        let (connector, server) = MockConnector::new();
        server.refuse_next(10);
        let client = SyncClient::spawn(
            Box::new(connector),
            Arc::new(MemoryTokenStore::new()),
            fast_policy(),
        );

        assert!(matches!(
            client.connect().await,
            Err(ClientError::Connection(_))
        ));
        let state = client.state().await.unwrap();
        assert!(matches!(state.connection(), ConnectionState::Error(_)));
    }

    #[tokio::test]
    async fn test_connect_retries_until_success() {
        let (connector, mut server) = MockConnector::new();
        server.refuse_next(2);
        let client = SyncClient::spawn(
            Box::new(connector),
            Arc::new(MemoryTokenStore::new()),
            fast_policy(),
        );
        client.connect().await.unwrap();
        assert!(server.accept().await.is_some());
    }
}
