//! Authentication service.

use std::sync::Arc;

use consultoria_proto::{
    AuthAction,
    payloads::auth::{AuthData, Role},
};
use tracing::{debug, info, warn};

use crate::{
    env::Environment,
    error::SessionError,
    session::SessionLayer,
    store::{AuthSession, UserIdentity},
    transport::Transport,
};

/// LOGIN, REGISTER and LOGOUT.
///
/// A successful login or registration becomes the layer's current session and
/// is persisted. A refused one clears whatever session was there.
pub struct AuthService<T: Transport, E: Environment> {
    layer: Arc<SessionLayer<T, E>>,
}

impl<T: Transport, E: Environment> AuthService<T, E> {
    /// Service over `layer`.
    pub fn new(layer: Arc<SessionLayer<T, E>>) -> Self {
        Self { layer }
    }

    /// Authenticate with existing credentials.
    ///
    /// # Errors
    ///
    /// [`SessionError::Authentication`] with the server's message if the
    /// credentials are refused; transport errors pass through.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, SessionError> {
        info!(email, "logging in");
        self.authenticate(AuthAction::Login {
            email: email.to_string(),
            password: password.to_string(),
        })
        .await
    }

    /// Create an account and authenticate as it.
    ///
    /// # Errors
    ///
    /// [`SessionError::Authentication`] with the server's message if the
    /// registration is refused (e.g. duplicate email).
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<AuthSession, SessionError> {
        info!(email, role = role.as_str(), "registering");
        self.authenticate(AuthAction::Register {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role,
        })
        .await
    }

    async fn authenticate(&self, action: AuthAction) -> Result<AuthSession, SessionError> {
        let operation = action.operation();
        let response = self.layer.send(action.into()).await?;

        if !response.success {
            let message = response.message_or_default().to_string();
            warn!(operation, message = %message, "authentication refused");
            if let Err(e) = self.layer.discard_session() {
                warn!(error = %e, "failed to clear stored session");
            }
            return Err(SessionError::Authentication { message });
        }

        let data: AuthData = response.data_as("AuthData")?;
        let user = UserIdentity {
            user_id: data.user_id,
            name: data.name,
            role: data.role,
            email: data.email,
        };
        self.layer.establish_session(data.session_id, user)
    }

    /// End the session.
    ///
    /// The remote LOGOUT is best-effort: its failure is logged and never keeps
    /// the local session alive. The connection is closed afterwards.
    ///
    /// # Errors
    ///
    /// Only [`SessionError::Store`], if the persisted record could not be
    /// removed. The in-memory session is gone regardless.
    pub async fn logout(&self) -> Result<(), SessionError> {
        if self.layer.session_id().is_some() {
            match self.layer.send(AuthAction::Logout.into()).await {
                Ok(response) if response.success => debug!("remote logout acknowledged"),
                Ok(response) => {
                    warn!(message = response.message_or_default(), "remote logout refused");
                },
                Err(e) => warn!(error = %e, "remote logout failed"),
            }
        }

        let cleared = self.layer.discard_session();
        self.layer.disconnect().await;
        info!("logged out");
        cleared
    }

    /// Whether a session is present.
    pub fn is_authenticated(&self) -> bool {
        self.layer.session_id().is_some()
    }

    /// Identity of the authenticated user.
    pub fn current_user(&self) -> Option<UserIdentity> {
        self.layer.current_session().map(|session| session.user)
    }
}
