//! CHAT: project conversations.
//!
//! Only a project's owner and its assigned consultant may read or write its
//! chat. The `userId` of each request must be the session's own account.

use chrono::Local;
use consultoria_proto::{
    ChatAction, ErrorCode, RequestId,
    payloads::chat::{ChatMessage, ChatMessages, ChatProject, MessageSent, ProjectsWithChat},
};
use tracing::info;

use super::{Dispatcher, Failure, Outcome, reply};

/// Longest accepted message, in characters.
pub(crate) const MAX_MESSAGE_CHARS: usize = 4000;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub(super) fn handle(
    dispatcher: &Dispatcher,
    request_id: &RequestId,
    session_user: u64,
    action: ChatAction,
) -> Outcome {
    match action {
        ChatAction::Send { project_id, user_id, content } => {
            same_user(session_user, user_id)?;
            if content.trim().is_empty() {
                return Err(Failure::invalid("message content is empty"));
            }
            if content.chars().count() > MAX_MESSAGE_CHARS {
                return Err(Failure::invalid("message too long"));
            }

            let directory = dispatcher.directory();
            let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
            let message = directory.post_message(project_id, user_id, content, timestamp)?;

            info!(message_id = message.id, project_id, user_id, "chat message stored");
            let sent = MessageSent {
                message_id: message.id,
                project_id,
                sender_name: sender_name(dispatcher, user_id),
                content: message.content,
                timestamp: message.timestamp,
            };
            reply(request_id, "message sent", &sent)
        },
        ChatAction::GetMessages { project_id, user_id } => {
            same_user(session_user, user_id)?;
            let stored = dispatcher.directory().messages(project_id, user_id)?;

            let messages: Vec<ChatMessage> = stored
                .into_iter()
                .map(|m| ChatMessage {
                    id: m.id,
                    sender_id: m.sender_id,
                    sender_name: sender_name(dispatcher, m.sender_id),
                    content: m.content,
                    timestamp: m.timestamp,
                })
                .collect();
            let total_messages = messages.len();
            reply(request_id, "messages retrieved", &ChatMessages { messages, total_messages })
        },
        ChatAction::GetProjectsWithChat { user_id } => {
            same_user(session_user, user_id)?;
            let projects: Vec<ChatProject> = dispatcher
                .directory()
                .projects_with_chat(user_id)?
                .into_iter()
                .filter_map(|project| {
                    let other_party_id = project.other_party(user_id)?;
                    Some(ChatProject {
                        project_id: project.id,
                        project_name: project.name,
                        status: project.status.as_str().to_string(),
                        other_party_name: sender_name(dispatcher, other_party_id),
                        other_party_id,
                    })
                })
                .collect();
            let total_projects = projects.len();
            reply(request_id, "projects retrieved", &ProjectsWithChat { projects, total_projects })
        },
    }
}

fn same_user(session_user: u64, user_id: u64) -> Result<(), Failure> {
    if session_user == user_id {
        Ok(())
    } else {
        Err(Failure::new(ErrorCode::Forbidden, "user id does not match session"))
    }
}

fn sender_name(dispatcher: &Dispatcher, user_id: u64) -> String {
    dispatcher.directory().user(user_id).map_or_else(|| "Unknown".to_string(), |user| user.name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use consultoria_proto::{Request, Response};

    use super::*;
    use crate::directory::{Directory, NewUser};

    fn call(dispatcher: &Dispatcher, user_id: u64, action: ChatAction) -> Response {
        let token = dispatcher.sessions().create(user_id).unwrap();
        dispatcher.dispatch(Request::new(RequestId::new("c-1"), Some(token), action.into()))
    }

    fn send(project_id: u64, user_id: u64, content: &str) -> ChatAction {
        ChatAction::Send { project_id, user_id, content: content.into() }
    }

    #[test]
    fn participants_exchange_messages_in_order() {
        let dispatcher = Dispatcher::new(Directory::with_demo_data());

        let sent: MessageSent =
            call(&dispatcher, 2, send(1, 2, "oi")).data_as("MessageSent").unwrap();
        assert_eq!(sent.sender_name, "Ana");
        assert_eq!(sent.project_id, 1);
        assert_eq!(sent.timestamp.len(), "2024-05-01T10:00:00".len());

        call(&dispatcher, 1, send(1, 1, "hello"));

        let read: ChatMessages = call(&dispatcher, 1, ChatAction::GetMessages {
            project_id: 1,
            user_id: 1,
        })
        .data_as("ChatMessages")
        .unwrap();
        assert_eq!(read.total_messages, 2);
        assert_eq!(
            read.messages.iter().map(|m| (m.sender_id, m.content.as_str())).collect::<Vec<_>>(),
            [(2, "oi"), (1, "hello")]
        );
    }

    #[test]
    fn unknown_project_and_outsiders_are_refused() {
        let dispatcher = Dispatcher::new(Directory::with_demo_data());
        let eve = dispatcher
            .directory()
            .register(NewUser {
                name: "Eve".into(),
                email: "eve@x.com".into(),
                password: "secret99".into(),
                role: consultoria_proto::payloads::auth::Role::Consultant,
            })
            .unwrap();

        let missing = call(&dispatcher, 2, send(99, 2, "oi"));
        assert_eq!(missing.message.as_deref(), Some("project not found"));
        assert_eq!(missing.error_code, Some(ErrorCode::NotFound));

        let outsider = call(&dispatcher, eve.id, send(1, eve.id, "oi"));
        assert_eq!(outsider.message.as_deref(), Some("you do not have access to this project"));
        assert_eq!(outsider.error_code, Some(ErrorCode::Forbidden));
    }

    #[test]
    fn user_id_must_match_session() {
        let dispatcher = Dispatcher::new(Directory::with_demo_data());

        let spoofed = call(&dispatcher, 2, send(1, 1, "as acme"));
        assert_eq!(spoofed.error_code, Some(ErrorCode::Forbidden));
        assert!(dispatcher.directory().messages(1, 1).unwrap().is_empty());
    }

    #[test]
    fn blank_messages_are_rejected() {
        let dispatcher = Dispatcher::new(Directory::with_demo_data());

        let blank = call(&dispatcher, 2, send(1, 2, "   "));
        assert_eq!(blank.error_code, Some(ErrorCode::InvalidRequest));
    }

    #[test]
    fn chat_list_shows_other_party() {
        let dispatcher = Dispatcher::new(Directory::with_demo_data());

        let list: ProjectsWithChat = call(&dispatcher, 2, ChatAction::GetProjectsWithChat {
            user_id: 2,
        })
        .data_as("ProjectsWithChat")
        .unwrap();

        assert_eq!(list.total_projects, 1);
        let project = &list.projects[0];
        assert_eq!(project.project_name, "Cloud migration");
        assert_eq!(project.status, "IN_PROGRESS");
        assert_eq!(project.other_party_id, 1);
        assert_eq!(project.other_party_name, "Empresa Acme");
    }
}
