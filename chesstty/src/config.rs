//! Configuration for the ChessTTY command-line front end.
//!
//! Every tunable has a compile-time default and can be overridden at runtime
//! via a dedicated environment variable. Command-line flags take precedence
//! over both; that merging happens in `main`.

use std::path::PathBuf;

/// Default search depth for the computer opponent and hints.
const DEFAULT_ADVISOR_DEPTH: u32 = engine::DEFAULT_DEPTH;

/// Name of the log file inside the data directory.
const LOG_FILE_NAME: &str = "chesstty.log";

/// Get the directory holding saved sessions, reconnection tokens and logs.
///
/// Priority:
/// 1. `CHESSTTY_DATA_DIR` env variable if set
/// 2. `$HOME/.chesstty`
/// 3. `./.chesstty` when no home directory is known
pub fn get_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var("CHESSTTY_DATA_DIR") {
        return PathBuf::from(path);
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".chesstty")
}

/// Get the file that receives tracing output.
///
/// Priority:
/// 1. `CHESSTTY_LOG_PATH` env variable if set
/// 2. `<data dir>/chesstty.log`
pub fn get_log_path() -> PathBuf {
    if let Ok(path) = std::env::var("CHESSTTY_LOG_PATH") {
        return PathBuf::from(path);
    }

    get_data_dir().join(LOG_FILE_NAME)
}

/// Get the advisor search depth.
///
/// Priority:
/// 1. `CHESSTTY_ADVISOR_DEPTH` env variable if set (falls back to default if
///    the value cannot be parsed as a `u32`)
/// 2. `3`
pub fn get_advisor_depth() -> u32 {
    if let Ok(depth) = std::env::var("CHESSTTY_ADVISOR_DEPTH") {
        return depth.parse().unwrap_or(DEFAULT_ADVISOR_DEPTH);
    }

    DEFAULT_ADVISOR_DEPTH
}

/// Get the multiplayer server address.
///
/// Priority:
/// 1. `CHESSTTY_SERVER_ADDR` env variable if set
/// 2. `127.0.0.1:7878`
pub fn get_server_addr() -> String {
    chess_client::config::server_addr_from_env()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_data_dir() {
        let dir = get_data_dir();
        match std::env::var("CHESSTTY_DATA_DIR") {
            Ok(val) => assert_eq!(dir, PathBuf::from(val)),
            Err(_) => assert!(dir.ends_with(".chesstty")),
        }
    }

    #[test]
    fn test_get_log_path() {
        let path = get_log_path();
        match std::env::var("CHESSTTY_LOG_PATH") {
            Ok(val) => assert_eq!(path, PathBuf::from(val)),
            Err(_) => assert_eq!(path, get_data_dir().join(LOG_FILE_NAME)),
        }
    }

    #[test]
    fn test_get_advisor_depth_default() {
        if std::env::var("CHESSTTY_ADVISOR_DEPTH").is_err() {
            assert_eq!(get_advisor_depth(), DEFAULT_ADVISOR_DEPTH);
        }
    }

    #[test]
    fn test_get_server_addr_is_never_empty() {
        assert!(!get_server_addr().is_empty());
    }
}
