//! Persisted session record.
//!
//! The session layer writes the current session here when AUTH succeeds and
//! clears it on logout or when the server rejects the token, so a restarted
//! process can resume without logging in again.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use consultoria_proto::{SessionId, payloads::auth::Role};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::SessionError;

/// Identity of the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    /// User id
    pub user_id: u64,
    /// Display name
    pub name: String,
    /// Marketplace role
    pub role: Role,
    /// Account email, if the server reported it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// The current session: token plus who it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    /// Token attached to every authenticated request
    pub session_id: SessionId,
    /// Authenticated user
    pub user: UserIdentity,
    /// Seconds since the Unix epoch when the session was established
    pub authenticated_at: u64,
}

/// Session store failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Reading or writing the backing medium failed.
    #[error("session store I/O failed: {0}")]
    Io(String),

    /// The stored record could not be parsed.
    #[error("stored session is corrupt: {0}")]
    Corrupt(String),
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        Self::Store(err.to_string())
    }
}

/// Process-wide "current session" record.
pub trait SessionStore: Send + Sync {
    /// Load the stored session, if any.
    fn load(&self) -> Result<Option<AuthSession>, StoreError>;

    /// Replace the stored session.
    fn save(&self, session: &AuthSession) -> Result<(), StoreError>;

    /// Remove the stored session. Idempotent.
    fn clear(&self) -> Result<(), StoreError>;
}

/// In-memory store. Sessions do not survive the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<AuthSession>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `session`.
    #[must_use]
    pub fn with_session(session: AuthSession) -> Self {
        Self { session: Mutex::new(Some(session)) }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<AuthSession>, StoreError> {
        Ok(self.session.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, session: &AuthSession) -> Result<(), StoreError> {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// JSON file store.
///
/// Writes go to a sibling temporary file that is then renamed over the
/// record, so a crash mid-write never leaves a torn file behind.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Store backed by the file at `path`. The file need not exist yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the record.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(ToOwned::to_owned).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<AuthSession>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&bytes).map(Some).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    fn save(&self, session: &AuthSession) -> Result<(), StoreError> {
        let bytes =
            serde_json::to_vec_pretty(session).map_err(|e| StoreError::Corrupt(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let temp = self.temp_path();
        fs::write(&temp, bytes)?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
