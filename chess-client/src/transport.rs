//! Transport abstraction plus the TCP implementation.

use async_trait::async_trait;
use chess_proto::{decode_line, encode_line, read_frame, ClientRequest, ProtocolError, ServerMessage};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::error::{ClientError, ClientResult};

/// Opens fresh connections. Called once per (re)connect attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> ClientResult<Box<dyn Connection>>;
}

/// One live, ordered, bidirectional message stream.
#[async_trait]
pub trait Connection: Send {
    async fn send(&mut self, request: &ClientRequest) -> ClientResult<()>;

    /// Next server message, `Ok(None)` once the peer has closed.
    async fn recv(&mut self) -> ClientResult<Option<ServerMessage>>;
}

#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
}

impl TcpConnector {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> ClientResult<Box<dyn Connection>> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| ClientError::Connection(format!("{}: {}", self.addr, e)))?;
        stream
            .set_nodelay(true)
            .map_err(|e| ClientError::Connection(e.to_string()))?;
        tracing::info!(addr = %self.addr, "Connected");

        let (read, write) = stream.into_split();
        Ok(Box::new(TcpConnection {
            reader: BufReader::new(read),
            writer: write,
        }))
    }
}

struct TcpConnection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

#[async_trait]
impl Connection for TcpConnection {
    async fn send(&mut self, request: &ClientRequest) -> ClientResult<()> {
        let line = encode_line(request).map_err(|e| ClientError::Connection(e.to_string()))?;
        tracing::trace!(">> {}", line.trim_end());
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))
    }

    async fn recv(&mut self) -> ClientResult<Option<ServerMessage>> {
        loop {
            let line = match read_frame(&mut self.reader).await {
                Ok(Some(line)) => line,
                Ok(None) => return Ok(None),
                Err(ProtocolError::NotUtf8) => {
                    tracing::warn!("Skipping server frame that is not UTF-8");
                    continue;
                }
                Err(e) => return Err(ClientError::Connection(e.to_string())),
            };
            tracing::trace!("<< {}", line.trim_end());

            match decode_line(&line) {
                Ok(msg) => return Ok(Some(msg)),
                Err(e) => tracing::warn!("Skipping malformed server frame: {}", e),
            }
        }
    }
}
