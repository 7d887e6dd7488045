use std::time::Duration;

/// Address used when neither a flag nor `CHESSTTY_SERVER_ADDR` picks one.
pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:7878";

/// Bounded retry policy for (re)establishing the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Attempts per outage before giving up and entering the error state.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
    pub connect_timeout: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_millis(1000),
            connect_timeout: Duration::from_millis(5000),
        }
    }
}

/// Server address from `CHESSTTY_SERVER_ADDR`, or the default.
pub fn server_addr_from_env() -> String {
    std::env::var("CHESSTTY_SERVER_ADDR").unwrap_or_else(|_| DEFAULT_SERVER_ADDR.to_string())
}
