//! `AUTH` family: login, registration, logout.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::envelope::SessionId;

/// Marketplace role of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Offers consulting services.
    Consultant,
    /// Hires consultants for projects.
    Company,
}

impl Role {
    /// Wire name of the role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Consultant => "CONSULTANT",
            Self::Company => "COMPANY",
        }
    }
}

/// Operations of the `AUTH` family.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum AuthAction {
    /// Authenticate with existing credentials.
    Login {
        /// Account email
        email: String,
        /// Plain-text password
        password: String,
    },
    /// Create an account and authenticate as it.
    Register {
        /// Display name
        name: String,
        /// Account email, unique
        email: String,
        /// Plain-text password
        password: String,
        /// Marketplace role
        role: Role,
    },
    /// End the session attached to the request.
    Logout,
}

impl AuthAction {
    /// Wire name of the operation.
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Login { .. } => "LOGIN",
            Self::Register { .. } => "REGISTER",
            Self::Logout => "LOGOUT",
        }
    }
}

// Passwords never reach a log line.
impl fmt::Debug for AuthAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login { email, .. } => {
                f.debug_struct("Login").field("email", email).finish_non_exhaustive()
            },
            Self::Register { name, email, role, .. } => f
                .debug_struct("Register")
                .field("name", name)
                .field("email", email)
                .field("role", role)
                .finish_non_exhaustive(),
            Self::Logout => f.write_str("Logout"),
        }
    }
}

/// `data` of a successful LOGIN or REGISTER.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthData {
    /// Freshly issued session token
    pub session_id: SessionId,
    /// Authenticated user's id
    pub user_id: u64,
    /// Display name
    pub name: String,
    /// Marketplace role
    pub role: Role,
    /// Account email, when the server includes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}
