//! AUTH: login, registration, logout.

use consultoria_proto::{
    AuthAction, ErrorCode, RequestId, Response, SessionId,
    payloads::auth::AuthData,
};
use tracing::info;

use super::{Dispatcher, Failure, Outcome, reply};
use crate::directory::{NewUser, User};

/// Shortest accepted password.
pub(crate) const MIN_PASSWORD_LEN: usize = 6;

pub(super) fn handle(
    dispatcher: &Dispatcher,
    request_id: &RequestId,
    session_id: Option<&SessionId>,
    action: AuthAction,
) -> Outcome {
    match action {
        AuthAction::Login { email, password } => {
            if email.trim().is_empty() || password.is_empty() {
                return Err(Failure::invalid("email and password are required"));
            }
            let user = dispatcher
                .directory()
                .authenticate(email.trim(), &password)
                .ok_or_else(|| Failure::new(ErrorCode::Forbidden, "invalid email or password"))?;

            info!(user_id = user.id, "user logged in");
            open_session(dispatcher, request_id, &user, "login successful")
        },
        AuthAction::Register { name, email, password, role } => {
            let name = name.trim();
            let email = email.trim();
            if name.is_empty() {
                return Err(Failure::invalid("name is required"));
            }
            if !is_plausible_email(email) {
                return Err(Failure::invalid("invalid email address"));
            }
            if password.chars().count() < MIN_PASSWORD_LEN {
                return Err(Failure::invalid(format!(
                    "password must have at least {MIN_PASSWORD_LEN} characters"
                )));
            }

            let user = dispatcher.directory().register(NewUser {
                name: name.to_string(),
                email: email.to_string(),
                password,
                role,
            })?;

            info!(user_id = user.id, role = role.as_str(), "user registered");
            open_session(dispatcher, request_id, &user, "registration successful")
        },
        AuthAction::Logout => {
            if let Some(session_id) = session_id {
                if dispatcher.sessions().remove(session_id) {
                    info!(session = session_id.short(), "user logged out");
                }
            }
            Ok(Response::ok(request_id.clone(), "logged out"))
        },
    }
}

fn open_session(
    dispatcher: &Dispatcher,
    request_id: &RequestId,
    user: &User,
    message: &str,
) -> Outcome {
    let session_id = dispatcher.sessions().create(user.id)?;
    let data = AuthData {
        session_id,
        user_id: user.id,
        name: user.name.clone(),
        role: user.role,
        email: Some(user.email.clone()),
    };
    reply(request_id, message, &data)
}

pub(crate) fn is_plausible_email(email: &str) -> bool {
    email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'))
}
