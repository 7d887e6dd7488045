//! Newline-delimited JSON framing.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Longest line a peer will accept, in bytes.
pub const MAX_FRAME_LEN: usize = 256 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Empty frame")]
    Empty,
    #[error("Frame exceeds {MAX_FRAME_LEN} bytes")]
    TooLong,
    #[error("Frame is not valid UTF-8")]
    NotUtf8,
    #[error("Read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Serialize `msg` as one `\n`-terminated line.
pub fn encode_line<T: Serialize>(msg: &T) -> Result<String, ProtocolError> {
    let mut line = serde_json::to_string(msg)?;
    line.push('\n');
    Ok(line)
}

/// Read one line from `reader`, buffering at most `MAX_FRAME_LEN` bytes plus
/// the terminator. `Ok(None)` at end of stream.
///
/// After `TooLong` the rest of the oversized line is still unread, so the
/// stream can no longer be framed and should be dropped.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<String>, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let limit = MAX_FRAME_LEN as u64 + 1;
    let n = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    if buf.last() != Some(&b'\n') && buf.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::TooLong);
    }
    String::from_utf8(buf)
        .map(Some)
        .map_err(|_| ProtocolError::NotUtf8)
}

/// Parse one line, with or without its terminator.
pub fn decode_line<T: DeserializeOwned>(line: &str) -> Result<T, ProtocolError> {
    if line.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::TooLong);
    }
    let line = line.trim();
    if line.is_empty() {
        return Err(ProtocolError::Empty);
    }
    Ok(serde_json::from_str(line)?)
}
