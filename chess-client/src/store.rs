//! Reconnection tokens, keyed by game id.
//!
//! Storage is a collaborator, not part of the state machine: callers log
//! failures and carry on without reconnection support.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Token store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Token store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

pub trait TokenStore: Send + Sync {
    fn get(&self, game_id: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, game_id: &str, token: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<BTreeMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, game_id: &str) -> Result<Option<String>, StoreError> {
        let tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        Ok(tokens.get(game_id).cloned())
    }

    fn set(&self, game_id: &str, token: &str) -> Result<(), StoreError> {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        tokens.insert(game_id.to_string(), token.to_string());
        Ok(())
    }
}

/// JSON object of `game_id -> token` in a single file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    const FILE_NAME: &'static str = "tokens.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store living in `dir/tokens.json`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(Self::FILE_NAME))
    }

    /// `$HOME/.chesstty/tokens.json`, or the working directory without a home.
    pub fn default_location() -> Self {
        let dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".chesstty");
        Self::in_dir(&dir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, game_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.load()?.remove(game_id))
    }

    fn set(&self, game_id: &str, token: &str) -> Result<(), StoreError> {
        // A corrupt file is replaced rather than blocking new tokens.
        let mut tokens = match self.load() {
            Ok(tokens) => tokens,
            Err(StoreError::Corrupt(e)) => {
                tracing::warn!(path = %self.path.display(), "Replacing corrupt token store: {}", e);
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        tokens.insert(game_id.to_string(), token.to_string());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&tokens)?)?;
        Ok(())
    }
}
