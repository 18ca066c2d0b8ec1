//! Session and user identity.
//!
//! The session identifier is generated once per process and never persisted.
//! The user identifier is read from a key-value store when one is available and
//! falls back to a session-only value when it is not.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use uuid::Uuid;

/// Storage key for the durable user identifier.
pub const USER_ID_KEY: &str = "vakaru_user_id";

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Nine random base36 characters.
pub(crate) fn random_token() -> String {
    let mut bits = Uuid::new_v4().as_u128();
    let mut token = String::with_capacity(9);
    for _ in 0..9 {
        token.push(ALPHABET[(bits % 36) as usize] as char);
        bits /= 36;
    }
    token
}

/// Generate a fresh session identifier (`sess_<random>_<unix millis>`).
pub fn session_id() -> String {
    format!("sess_{}_{}", random_token(), Utc::now().timestamp_millis())
}

/// Resolve the user identifier against a persistence collaborator.
///
/// A candidate is generated first; a non-empty stored value replaces it. When
/// nothing is stored the candidate is written back. Store failures are logged and
/// leave the candidate as a session-only identity.
pub fn user_id(store: &dyn IdentityStore) -> String {
    let candidate = format!("user_{}", random_token());

    match store.get(USER_ID_KEY) {
        Ok(Some(stored)) if !stored.is_empty() => stored,
        Ok(_) => {
            if let Err(e) = store.set(USER_ID_KEY, &candidate) {
                tracing::info!(error = %e, "Using session-only user ID (persistence not available)");
            }
            candidate
        }
        Err(e) => {
            tracing::info!(error = %e, "Using session-only user ID (persistence not available)");
            candidate
        }
    }
}

/// Identifiers scoping every event produced during one process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: String,
    pub user_id: String,
}

impl SessionContext {
    /// Generate the session id and resolve the user id.
    pub fn initialize(store: &dyn IdentityStore) -> Self {
        Self {
            session_id: session_id(),
            user_id: user_id(store),
        }
    }

    /// Leading characters of the session id, for log lines.
    pub fn short_session_id(&self, len: usize) -> String {
        let prefix: String = self.session_id.chars().take(len).collect();
        format!("{prefix}...")
    }
}

/// Key-value persistence used for the durable user identifier.
pub trait IdentityStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Identity store errors.
#[derive(Debug)]
pub enum StoreError {
    /// The store refused access (e.g. storage disabled by the host)
    Unavailable(String),
    IoError(String),
    ParseError(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(e) => write!(f, "Store unavailable: {e}"),
            StoreError::IoError(e) => write!(f, "IO error: {e}"),
            StoreError::ParseError(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// JSON file store, one flat string map per file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn read_all(&self) -> Result<HashMap<String, String>, StoreError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content =
            std::fs::read_to_string(&self.path).map_err(|e| StoreError::IoError(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| StoreError::ParseError(e.to_string()))
    }

    /// Delete a key, returning whether it was present.
    pub fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let mut entries = self.read_all()?;
        let removed = entries.remove(key).is_some();
        if removed {
            self.write_all(&entries)?;
        }
        Ok(removed)
    }

    fn write_all(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::IoError(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| StoreError::ParseError(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| StoreError::IoError(e.to_string()))
    }
}

impl IdentityStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_all()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }
}

/// In-process store. Identity survives only as long as the store does.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// A store that always refuses access.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableStore;

impl IdentityStore for UnavailableStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable("persistence denied".to_string()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("persistence denied".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_format() {
        let id = session_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "sess");
        assert_eq!(parts[1].len(), 9);
        assert!(parts[2].parse::<i64>().is_ok());
    }

    #[test]
    fn test_session_ids_differ() {
        assert_ne!(session_id(), session_id());
    }

    #[test]
    fn test_user_id_persisted_value_wins() {
        let store = MemoryStore::new();
        store.set(USER_ID_KEY, "user_existing").unwrap();
        assert_eq!(user_id(&store), "user_existing");
    }

    #[test]
    fn test_user_id_stable_with_persistence() {
        let store = MemoryStore::new();
        let first = user_id(&store);
        let second = user_id(&store);
        assert!(first.starts_with("user_"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_user_id_without_persistence() {
        let first = user_id(&UnavailableStore);
        let second = user_id(&UnavailableStore);
        assert!(!first.is_empty());
        assert!(!second.is_empty());
    }

    #[test]
    fn test_empty_stored_value_is_replaced() {
        let store = MemoryStore::new();
        store.set(USER_ID_KEY, "").unwrap();
        let id = user_id(&store);
        assert!(id.starts_with("user_"));
        assert_eq!(store.get(USER_ID_KEY).unwrap(), Some(id));
    }

    #[test]
    fn test_file_store_round_trip() {
        let path = std::env::temp_dir()
            .join(format!("vakaru-identity-{}", Uuid::new_v4()))
            .join("identity.json");
        let store = FileStore::new(path.clone());

        let first = user_id(&store);
        let reopened = FileStore::new(path.clone());
        assert_eq!(user_id(&reopened), first);

        assert!(reopened.remove(USER_ID_KEY).unwrap());
        assert_eq!(reopened.get(USER_ID_KEY).unwrap(), None);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_short_session_id() {
        let ctx = SessionContext {
            session_id: "sess_abcdefghi_1700000000000".to_string(),
            user_id: "user_x".to_string(),
        };
        assert_eq!(ctx.short_session_id(15), "sess_abcdefghi_...");
    }
}
