//! Typed action payloads.
//!
//! One variant per (action family, operation) pair. On the wire the family is
//! the request's `type` and the operation is `data.action`:
//!
//! ```json
//! {"type":"AUTH","data":{"action":"LOGIN","email":"ana@x.com","password":"..."}}
//! ```
//!
//! Response payload shapes for each operation live next to the operation
//! enum of their family.

pub mod auth;
pub mod chat;
pub mod profile;

use std::fmt;

use serde::{Deserialize, Serialize};

use self::{auth::AuthAction, chat::ChatAction, profile::ProfileAction};

/// Top-level action category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionFamily {
    /// Login, registration and logout.
    Auth,
    /// Profile reads and updates.
    Profile,
    /// Project chat.
    Chat,
}

impl ActionFamily {
    /// Wire name of the family.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "AUTH",
            Self::Profile => "PROFILE",
            Self::Chat => "CHAT",
        }
    }

    /// Whether requests of this family must carry a session token.
    #[must_use]
    pub fn requires_session(self) -> bool {
        !matches!(self, Self::Auth)
    }
}

impl fmt::Display for ActionFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete action: family plus operation plus payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "UPPERCASE")]
pub enum Action {
    /// `AUTH` family.
    Auth(AuthAction),
    /// `PROFILE` family.
    Profile(ProfileAction),
    /// `CHAT` family.
    Chat(ChatAction),
}

impl Action {
    /// Family this action belongs to.
    #[must_use]
    pub fn family(&self) -> ActionFamily {
        match self {
            Self::Auth(_) => ActionFamily::Auth,
            Self::Profile(_) => ActionFamily::Profile,
            Self::Chat(_) => ActionFamily::Chat,
        }
    }

    /// Wire name of the operation within its family.
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Auth(action) => action.operation(),
            Self::Profile(action) => action.operation(),
            Self::Chat(action) => action.operation(),
        }
    }

    /// Whether the current session token travels with this action.
    ///
    /// LOGIN and REGISTER create a session and never carry one.
    #[must_use]
    pub fn attaches_session(&self) -> bool {
        !matches!(self, Self::Auth(AuthAction::Login { .. } | AuthAction::Register { .. }))
    }
}

impl From<AuthAction> for Action {
    fn from(action: AuthAction) -> Self {
        Self::Auth(action)
    }
}

impl From<ProfileAction> for Action {
    fn from(action: ProfileAction) -> Self {
        Self::Profile(action)
    }
}

impl From<ChatAction> for Action {
    fn from(action: ChatAction) -> Self {
        Self::Chat(action)
    }
}
