//! `CHAT` family: project conversations between a company and its consultant.

use serde::{Deserialize, Serialize};

/// Operations of the `CHAT` family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum ChatAction {
    /// Post a message to a project's chat.
    Send {
        /// Target project
        project_id: u64,
        /// Sender
        user_id: u64,
        /// Message text
        content: String,
    },
    /// Read every message of a project's chat, oldest first.
    GetMessages {
        /// Project to read
        project_id: u64,
        /// Reader, must participate in the project
        user_id: u64,
    },
    /// List projects in which the user has an active chat.
    GetProjectsWithChat {
        /// Participant
        user_id: u64,
    },
}

impl ChatAction {
    /// Wire name of the operation.
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Send { .. } => "SEND",
            Self::GetMessages { .. } => "GET_MESSAGES",
            Self::GetProjectsWithChat { .. } => "GET_PROJECTS_WITH_CHAT",
        }
    }
}

/// `data` of a successful SEND.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSent {
    /// Id assigned to the stored message
    pub message_id: u64,
    /// Project the message was posted to
    pub project_id: u64,
    /// Sender's display name
    pub sender_name: String,
    /// Stored text
    pub content: String,
    /// Server-side creation time
    pub timestamp: String,
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Message id
    pub id: u64,
    /// Sender's user id
    pub sender_id: u64,
    /// Sender's display name
    pub sender_name: String,
    /// Text
    pub content: String,
    /// Server-side creation time
    pub timestamp: String,
}

/// `data` of a successful GET_MESSAGES.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessages {
    /// Messages, oldest first
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Number of messages the server reported
    #[serde(default)]
    pub total_messages: usize,
}

/// Project summary returned by GET_PROJECTS_WITH_CHAT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatProject {
    /// Project id
    pub project_id: u64,
    /// Project name
    pub project_name: String,
    /// Project status, e.g. `IN_PROGRESS`
    pub status: String,
    /// Name of the other participant
    pub other_party_name: String,
    /// Id of the other participant
    pub other_party_id: u64,
}

/// `data` of a successful GET_PROJECTS_WITH_CHAT.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectsWithChat {
    /// Projects with an assigned consultant
    #[serde(default)]
    pub projects: Vec<ChatProject>,
    /// Number of projects the server reported
    #[serde(default)]
    pub total_projects: usize,
}
