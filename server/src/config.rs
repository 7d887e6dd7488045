//! Configuration for ChessTTY server
//!
//! Every tunable comes from an environment variable with a built-in default.

use std::time::Duration;

const DEFAULT_ADDR: &str = "127.0.0.1:7878";
const DEFAULT_CLOCK_RESOLUTION_MS: u64 = 100;

/// Address to listen on.
///
/// Priority:
/// 1. CHESSTTY_SERVER_ADDR env variable if set
/// 2. 127.0.0.1:7878
pub fn get_listen_addr() -> String {
    std::env::var("CHESSTTY_SERVER_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string())
}

/// How often running game clocks are advanced.
///
/// CHESSTTY_CLOCK_RESOLUTION_MS if set to a positive integer, else 100 ms.
pub fn get_clock_resolution() -> Duration {
    let ms = std::env::var("CHESSTTY_CLOCK_RESOLUTION_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|&ms| ms > 0)
        .unwrap_or(DEFAULT_CLOCK_RESOLUTION_MS);
    Duration::from_millis(ms)
}
