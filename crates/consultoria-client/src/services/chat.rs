//! Chat service.

use std::{sync::Arc, time::Duration};

use consultoria_proto::{
    ChatAction, Response,
    payloads::chat::{ChatMessage, ChatMessages, MessageSent, ProjectsWithChat},
};
use tracing::{info, warn};

use crate::{
    env::Environment,
    error::SessionError,
    polling::{MessageFeed, PollConfig, PollHandle, start_polling},
    session::SessionLayer,
    transport::Transport,
};

/// Project chat. Every call needs a session and fails with
/// [`SessionError::NotAuthenticated`] before touching the network if there is
/// none.
pub struct ChatService<T: Transport, E: Environment> {
    layer: Arc<SessionLayer<T, E>>,
}

impl<T: Transport, E: Environment> ChatService<T, E> {
    /// Service over `layer`.
    pub fn new(layer: Arc<SessionLayer<T, E>>) -> Self {
        Self { layer }
    }

    fn require_session(&self) -> Result<(), SessionError> {
        match self.layer.session_id() {
            Some(_) => Ok(()),
            None => Err(SessionError::NotAuthenticated),
        }
    }

    /// Post `content` to a project's chat.
    pub async fn send_message(
        &self,
        project_id: u64,
        user_id: u64,
        content: &str,
    ) -> Result<MessageSent, SessionError> {
        self.require_session()?;
        info!(project_id, user_id, "sending chat message");

        let action = ChatAction::Send { project_id, user_id, content: content.to_string() };
        let response = self.layer.send(action.into()).await?;
        let sent: MessageSent = outcome("SEND", response, "MessageSent")?;

        info!(message_id = sent.message_id, project_id, "chat message sent");
        Ok(sent)
    }

    /// Read a project's messages, oldest first.
    pub async fn get_messages(
        &self,
        project_id: u64,
        user_id: u64,
    ) -> Result<ChatMessages, SessionError> {
        self.require_session()?;
        info!(project_id, user_id, "fetching chat messages");

        let action = ChatAction::GetMessages { project_id, user_id };
        let response = self.layer.send(action.into()).await?;
        let messages: ChatMessages = outcome("GET_MESSAGES", response, "ChatMessages")?;

        info!(count = messages.messages.len(), project_id, "chat messages retrieved");
        Ok(messages)
    }

    /// List projects in which `user_id` has an active chat.
    pub async fn get_projects_with_chat(
        &self,
        user_id: u64,
    ) -> Result<ProjectsWithChat, SessionError> {
        self.require_session()?;
        info!(user_id, "fetching projects with chat");

        let action = ChatAction::GetProjectsWithChat { user_id };
        let response = self.layer.send(action.into()).await?;
        let projects: ProjectsWithChat =
            outcome("GET_PROJECTS_WITH_CHAT", response, "ProjectsWithChat")?;

        info!(count = projects.projects.len(), user_id, "projects with chat retrieved");
        Ok(projects)
    }

    /// Poll a project's messages every `interval`, calling `callback` with the
    /// full list whenever the message count changes.
    pub fn start_polling<C>(
        self: Arc<Self>,
        project_id: u64,
        user_id: u64,
        interval: Duration,
        callback: C,
    ) -> PollHandle
    where
        C: FnMut(Vec<ChatMessage>) + Send + 'static,
    {
        start_polling(self, project_id, user_id, PollConfig::new(interval), callback)
    }
}

impl<T: Transport, E: Environment> MessageFeed for ChatService<T, E> {
    async fn fetch_messages(
        &self,
        project_id: u64,
        user_id: u64,
    ) -> Result<Vec<ChatMessage>, SessionError> {
        self.get_messages(project_id, user_id).await.map(|data| data.messages)
    }
}

/// Decode a chat reply, logging the server's message on refusal.
fn outcome<R: serde::de::DeserializeOwned>(
    operation: &'static str,
    response: Response,
    expected: &'static str,
) -> Result<R, SessionError> {
    if !response.success {
        warn!(operation, message = response.message_or_default(), "chat request refused");
    }
    super::decode(response, expected)
}
