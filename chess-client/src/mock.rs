//! In-memory transport for tests - only compiled in test mode or with the
//! `mock` feature.
//!
//! A [`MockConnector`] hands each successful connect to the paired
//! [`MockServer`], which plays the server side by hand.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chess_proto::{Ack, ClientRequest, Push, ServerMessage};
use tokio::sync::mpsc;

use crate::error::{ClientError, ClientResult};
use crate::transport::{Connection, Connector};

pub struct MockConnector {
    accept_tx: mpsc::UnboundedSender<MockServerConnection>,
    refuse: Arc<AtomicUsize>,
}

pub struct MockServer {
    accept_rx: mpsc::UnboundedReceiver<MockServerConnection>,
    refuse: Arc<AtomicUsize>,
}

/// Server end of one mock connection. Dropping it closes the connection.
pub struct MockServerConnection {
    requests: mpsc::UnboundedReceiver<ClientRequest>,
    messages: mpsc::UnboundedSender<ServerMessage>,
}

impl MockConnector {
    pub fn new() -> (Self, MockServer) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        let refuse = Arc::new(AtomicUsize::new(0));
        (
            Self {
                accept_tx,
                refuse: refuse.clone(),
            },
            MockServer { accept_rx, refuse },
        )
    }
}

impl MockServer {
    /// Wait for the client's next successful connect.
    pub async fn accept(&mut self) -> Option<MockServerConnection> {
        self.accept_rx.recv().await
    }

    /// Make the next `n` connect attempts fail.
    pub fn refuse_next(&self, n: usize) {
        self.refuse.store(n, Ordering::SeqCst);
    }
}

impl MockServerConnection {
    /// Next request from the client, `None` once it has dropped the connection.
    pub async fn next_request(&mut self) -> Option<ClientRequest> {
        self.requests.recv().await
    }

    pub fn send(&self, msg: ServerMessage) {
        let _ = self.messages.send(msg);
    }

    pub fn ack(&self, ack: Ack) {
        self.send(ServerMessage::Ack(ack));
    }

    pub fn push(&self, push: Push) {
        self.send(ServerMessage::Push(push));
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> ClientResult<Box<dyn Connection>> {
        let refused = self
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(ClientError::Connection("connection refused".into()));
        }

        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        self.accept_tx
            .send(MockServerConnection {
                requests: request_rx,
                messages: message_tx,
            })
            .map_err(|_| ClientError::Connection("mock server gone".into()))?;

        Ok(Box::new(MockConnection {
            requests: request_tx,
            messages: message_rx,
        }))
    }
}

struct MockConnection {
    requests: mpsc::UnboundedSender<ClientRequest>,
    messages: mpsc::UnboundedReceiver<ServerMessage>,
}

#[async_trait]
impl Connection for MockConnection {
    async fn send(&mut self, request: &ClientRequest) -> ClientResult<()> {
        self.requests
            .send(request.clone())
            .map_err(|_| ClientError::Connection("connection closed".into()))
    }

    async fn recv(&mut self) -> ClientResult<Option<ServerMessage>> {
        Ok(self.messages.recv().await)
    }
}
