//! Session tokens issued at login and registration.

use std::{
    collections::HashMap,
    fmt::Write as _,
    sync::{Mutex, MutexGuard, PoisonError},
};

use consultoria_proto::SessionId;

use crate::error::ServerError;

/// Token bytes before hex encoding.
const TOKEN_BYTES: usize = 16;

/// Maps live session tokens to the account they authenticate.
///
/// Tokens are random and only valid until removed; the table does not survive
/// a restart.
#[derive(Default)]
pub struct SessionManager {
    sessions: Mutex<HashMap<SessionId, u64>>,
}

impl SessionManager {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, u64>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issue a token for `user_id`.
    ///
    /// # Errors
    ///
    /// [`ServerError::Internal`] if the system RNG fails.
    pub fn create(&self, user_id: u64) -> Result<SessionId, ServerError> {
        let mut bytes = [0u8; TOKEN_BYTES];
        getrandom::fill(&mut bytes)
            .map_err(|e| ServerError::Internal(format!("session token generation failed: {e}")))?;

        let token = bytes.iter().fold(String::with_capacity(TOKEN_BYTES * 2), |mut hex, b| {
            let _ = write!(hex, "{b:02x}");
            hex
        });
        let session_id = SessionId::new(token);
        self.lock().insert(session_id.clone(), user_id);

        tracing::debug!(user_id, session = session_id.short(), "session created");
        Ok(session_id)
    }

    /// Account authenticated by `session_id`, if the token is live.
    pub fn validate(&self, session_id: &SessionId) -> Option<u64> {
        self.lock().get(session_id).copied()
    }

    /// Revoke a token. Returns whether it was live.
    pub fn remove(&self, session_id: &SessionId) -> bool {
        let removed = self.lock().remove(session_id);
        if let Some(user_id) = removed {
            tracing::debug!(user_id, session = session_id.short(), "session removed");
        }
        removed.is_some()
    }

    /// Number of live tokens.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no token is live.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
